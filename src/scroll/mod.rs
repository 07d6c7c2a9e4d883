// chatpane - A terminal chat client for a local completion backend
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Scroll position policy for the conversation view.
//!
//! After the user sends a message the view pins that message near the top
//! and reserves blank space (the spacer) below it, so the streamed reply
//! grows into empty room instead of pushing the view around.
//!
//! Measuring and scrolling happen on different frames: the controller first
//! recomputes the spacer against one frame's layout, then picks the scroll
//! target from the next frame, which already contains the new spacer.

mod geometry;
mod policy;

pub use geometry::{SpacerInput, scroll_target, spacer_height};
pub use policy::{
    DEFAULT_LARGE_MESSAGE_RATIO, DEFAULT_LARGE_MESSAGE_TAIL_RATIO, DEFAULT_NEAR_BOTTOM_THRESHOLD,
    DEFAULT_RESIZE_DEBOUNCE_MS, DEFAULT_RESIZE_THRESHOLD, DEFAULT_STREAMING_EXTRA_RATIO,
    MAX_STREAMING_EXTRA_RATIO, ScrollPolicy,
};

use crate::layout::{HandleRegistry, LayoutSurface, is_near_bottom};
use crate::session::{Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollPhase {
    #[default]
    Idle,
    /// A message was submitted; waiting for it to show up in the list.
    PendingUserScroll,
    /// Recompute the spacer on the next frame.
    MeasurePending { target: usize },
    /// Scroll to `target` on the next frame.
    ScrollPending { target: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollState {
    pub pending_scroll_to_user: bool,
    pub active_interaction: bool,
    pub has_submitted: bool,
    pub spacer_height: f64,
    pub show_scroll_button: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// A scroll the view should perform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollCommand {
    pub top: f64,
    pub behavior: ScrollBehavior,
}

impl ScrollCommand {
    #[must_use]
    pub fn smooth(top: f64) -> Self {
        Self { top, behavior: ScrollBehavior::Smooth }
    }

    #[must_use]
    pub fn instant(top: f64) -> Self {
        Self { top, behavior: ScrollBehavior::Instant }
    }
}

#[derive(Debug, Default)]
pub struct AutoscrollController {
    policy: ScrollPolicy,
    state: ScrollState,
    phase: ScrollPhase,
    streaming: bool,
    chat_id: Option<String>,
    updating_spacer: bool,
    last_len: usize,
    last_tail_len: usize,
}

fn last_user_index(messages: &[Message]) -> Option<usize> {
    messages.iter().rposition(|m| m.role == Role::User)
}

impl AutoscrollController {
    #[must_use]
    pub fn new(policy: ScrollPolicy) -> Self {
        Self { policy, ..Self::default() }
    }

    #[must_use]
    pub fn policy(&self) -> &ScrollPolicy {
        &self.policy
    }

    #[must_use]
    pub fn state(&self) -> ScrollState {
        self.state
    }

    #[must_use]
    pub fn phase(&self) -> ScrollPhase {
        self.phase
    }

    #[must_use]
    pub fn spacer_height(&self) -> f64 {
        self.state.spacer_height
    }

    #[must_use]
    pub fn show_scroll_to_bottom(&self) -> bool {
        self.state.show_scroll_button
    }

    #[must_use]
    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    /// The user just submitted a message.
    pub fn handle_new_user_message(&mut self) {
        tracing::debug!("new user message, scroll pending");
        self.state.pending_scroll_to_user = true;
        self.state.active_interaction = true;
        self.state.has_submitted = true;
        self.phase = ScrollPhase::PendingUserScroll;
    }

    /// Call after a frame whose message list may have changed length.
    pub fn on_messages_changed(
        &mut self,
        messages: &[Message],
        handles: &HandleRegistry,
        surface: Option<&dyn LayoutSurface>,
    ) {
        if messages.len() == self.last_len {
            return;
        }
        self.last_len = messages.len();

        if self.state.pending_scroll_to_user && self.phase == ScrollPhase::PendingUserScroll {
            if let Some(target) = last_user_index(messages) {
                self.phase = ScrollPhase::MeasurePending { target };
            } else {
                self.state.pending_scroll_to_user = false;
                self.state.active_interaction = self.streaming;
                self.phase = ScrollPhase::Idle;
            }
        }

        self.update_spacer_height(messages, handles, surface);
    }

    /// Advance the two-stage deferral. Call once after every rendered frame.
    pub fn on_frame(
        &mut self,
        messages: &[Message],
        handles: &HandleRegistry,
        surface: Option<&dyn LayoutSurface>,
    ) -> Option<ScrollCommand> {
        match self.phase {
            ScrollPhase::MeasurePending { target } => {
                self.update_spacer_height(messages, handles, surface);
                self.phase = ScrollPhase::ScrollPending { target };
                None
            }
            ScrollPhase::ScrollPending { target } => {
                let command = self.scroll_to_message(target, messages, handles, surface);
                self.state.pending_scroll_to_user = false;
                self.phase = ScrollPhase::Idle;
                command
            }
            ScrollPhase::Idle | ScrollPhase::PendingUserScroll => None,
        }
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        if self.streaming == streaming {
            return;
        }
        self.streaming = streaming;
        self.state.active_interaction =
            streaming || self.state.pending_scroll_to_user || self.state.has_submitted;
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Switch to another conversation. Any change resets the scroll state.
    pub fn set_chat_id(&mut self, chat_id: Option<&str>) {
        if self.chat_id.as_deref() == chat_id {
            return;
        }
        tracing::debug!(chat_id = ?chat_id, "chat changed, resetting scroll state");
        self.chat_id = chat_id.map(str::to_owned);
        self.reset();
    }

    /// Forget submissions, pending scrolls and the spacer, keeping the chat id.
    pub fn reset(&mut self) {
        self.state = ScrollState::default();
        self.phase = ScrollPhase::Idle;
        self.last_len = 0;
        self.last_tail_len = 0;
    }

    /// Record the id the backend assigned to the chat being streamed.
    ///
    /// This is the same conversation, so nothing is reset.
    pub fn adopt_chat_id(&mut self, chat_id: &str) {
        self.chat_id = Some(chat_id.to_owned());
    }

    /// Recompute the reserved blank space below the last message.
    ///
    /// Without a bound surface this is a no-op; every other missing piece
    /// yields a spacer of zero.
    pub fn update_spacer_height(
        &mut self,
        messages: &[Message],
        handles: &HandleRegistry,
        surface: Option<&dyn LayoutSurface>,
    ) {
        if self.updating_spacer {
            return;
        }
        let Some(surface) = surface else {
            return;
        };
        self.updating_spacer = true;
        let height = self.measure_spacer(messages, handles, surface);
        if (height - self.state.spacer_height).abs() > f64::EPSILON {
            tracing::trace!(spacer = height, "spacer height changed");
        }
        self.state.spacer_height = height;
        self.updating_spacer = false;
    }

    fn measure_spacer(
        &self,
        messages: &[Message],
        handles: &HandleRegistry,
        surface: &dyn LayoutSurface,
    ) -> f64 {
        let Some(last_user) = last_user_index(messages) else {
            return 0.0;
        };
        if surface.rendered_handles().is_empty() {
            return 0.0;
        }
        let Some(target) = handles.get(&messages[last_user].id).and_then(|h| surface.measure(h))
        else {
            return 0.0;
        };
        if !self.state.active_interaction {
            return 0.0;
        }

        let mut content_after = 0.0;
        let mut total_content = 0.0;
        for (index, message) in messages.iter().enumerate() {
            let Some(element) = handles.get(&message.id).and_then(|h| surface.measure(h)) else {
                continue;
            };
            total_content += element.height;
            if index > last_user {
                content_after += element.height;
            }
        }

        spacer_height(
            SpacerInput {
                viewport_height: surface.viewport_height(),
                target_height: target.height,
                content_after,
                total_content,
                streaming: self.streaming,
            },
            &self.policy,
        )
    }

    /// Scroll command that brings message `index` into its pinned position.
    #[must_use]
    pub fn scroll_to_message(
        &self,
        index: usize,
        messages: &[Message],
        handles: &HandleRegistry,
        surface: Option<&dyn LayoutSurface>,
    ) -> Option<ScrollCommand> {
        let surface = surface?;
        let handle = handles.get(&messages.get(index)?.id)?;
        let Some(element) = surface.measure(handle) else {
            tracing::debug!(index, "scroll target not rendered, skipping");
            return None;
        };
        let top = scroll_target(
            index,
            element,
            surface.list_offset(),
            surface.viewport_height(),
            surface.scroll_height(),
            &self.policy,
        );
        Some(ScrollCommand::smooth(top))
    }

    /// Call after a frame whose last message may have grown.
    pub fn on_content_changed(&mut self, messages: &[Message], surface: Option<&dyn LayoutSurface>) {
        let tail_len = messages.last().map_or(0, |m| m.content.len());
        if tail_len == self.last_tail_len {
            return;
        }
        self.last_tail_len = tail_len;
        if self.streaming {
            self.state.show_scroll_button =
                !is_near_bottom(surface, self.policy.near_bottom_threshold);
        }
    }

    pub fn on_user_scroll(&mut self, surface: Option<&dyn LayoutSurface>) {
        self.state.show_scroll_button = !is_near_bottom(surface, self.policy.near_bottom_threshold);
    }

    #[must_use]
    pub fn scroll_to_bottom(&self, surface: Option<&dyn LayoutSurface>) -> Option<ScrollCommand> {
        surface.map(|s| ScrollCommand::smooth(s.scroll_height()))
    }
}
