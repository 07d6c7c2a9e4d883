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

//! Measurement seam between the scroll logic and whatever draws messages.
//!
//! The renderer publishes a [`LayoutSurface`] each frame; the scroll
//! controller and [`LayoutObserver`] only ever read through it.

mod observer;

pub use observer::{LayoutObserver, Recompute};

use std::collections::HashMap;

/// Opaque identity of one rendered message element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayoutHandle(u64);

/// Position of an element inside the scroll content, in surface units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElementBox {
    pub top: f64,
    pub height: f64,
}

impl ElementBox {
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Read-only view of a scroll container and the message elements in it.
pub trait LayoutSurface {
    fn viewport_height(&self) -> f64;
    fn scroll_top(&self) -> f64;
    /// Total scrollable content height, never less than the viewport.
    fn scroll_height(&self) -> f64;
    /// Offset of the message list inside the scroll content.
    fn list_offset(&self) -> f64;
    /// `None` when the element is not currently rendered.
    fn measure(&self, handle: LayoutHandle) -> Option<ElementBox>;
    fn rendered_handles(&self) -> Vec<LayoutHandle>;
}

/// Distance from the bottom at or below which the view counts as "at the bottom".
///
/// With no container bound there is nothing to scroll, so this is `true`.
pub fn is_near_bottom<S: LayoutSurface + ?Sized>(surface: Option<&S>, threshold: f64) -> bool {
    let Some(surface) = surface else {
        return true;
    };
    surface.scroll_height() - surface.scroll_top() - surface.viewport_height() <= threshold
}

/// Maps message ids to stable layout handles.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    next: u64,
    by_id: HashMap<String, LayoutHandle>,
}

impl HandleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_for(&mut self, message_id: &str) -> LayoutHandle {
        if let Some(handle) = self.by_id.get(message_id) {
            return *handle;
        }
        let handle = LayoutHandle(self.next);
        self.next += 1;
        self.by_id.insert(message_id.to_owned(), handle);
        handle
    }

    #[must_use]
    pub fn get(&self, message_id: &str) -> Option<LayoutHandle> {
        self.by_id.get(message_id).copied()
    }

    /// Drop handles for messages that no longer exist.
    pub fn retain<'a>(&mut self, live_ids: impl IntoIterator<Item = &'a str>) {
        let live: std::collections::HashSet<&str> = live_ids.into_iter().collect();
        self.by_id.retain(|id, _| live.contains(id.as_str()));
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Snapshot of one rendered frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameLayout {
    viewport_height: f64,
    scroll_top: f64,
    scroll_height: f64,
    list_offset: f64,
    elements: Vec<(LayoutHandle, ElementBox)>,
}

impl FrameLayout {
    /// Start a layout whose message list begins `list_offset` units into the content.
    #[must_use]
    pub fn builder(viewport_height: f64, list_offset: f64) -> FrameLayoutBuilder {
        FrameLayoutBuilder {
            layout: Self {
                viewport_height,
                list_offset,
                scroll_height: viewport_height.max(list_offset),
                ..Self::default()
            },
            cursor: list_offset,
        }
    }

    #[must_use]
    pub fn elements(&self) -> &[(LayoutHandle, ElementBox)] {
        &self.elements
    }

    #[must_use]
    pub fn max_scroll(&self) -> f64 {
        (self.scroll_height - self.viewport_height).max(0.0)
    }

    pub fn set_scroll_top(&mut self, scroll_top: f64) {
        self.scroll_top = scroll_top.clamp(0.0, self.max_scroll());
    }
}

impl LayoutSurface for FrameLayout {
    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn scroll_height(&self) -> f64 {
        self.scroll_height
    }

    fn list_offset(&self) -> f64 {
        self.list_offset
    }

    fn measure(&self, handle: LayoutHandle) -> Option<ElementBox> {
        self.elements.iter().find(|(h, _)| *h == handle).map(|(_, b)| *b)
    }

    fn rendered_handles(&self) -> Vec<LayoutHandle> {
        self.elements.iter().map(|(h, _)| *h).collect()
    }
}

/// Stacks message elements top to bottom.
#[derive(Debug)]
pub struct FrameLayoutBuilder {
    layout: FrameLayout,
    cursor: f64,
}

impl FrameLayoutBuilder {
    #[must_use]
    pub fn element(mut self, handle: LayoutHandle, height: f64) -> Self {
        self.layout.elements.push((handle, ElementBox { top: self.cursor, height }));
        self.cursor += height;
        self
    }

    /// Trailing blank space after the last message.
    #[must_use]
    pub fn padding(mut self, height: f64) -> Self {
        self.cursor += height.max(0.0);
        self
    }

    #[must_use]
    pub fn scroll_top(mut self, scroll_top: f64) -> Self {
        self.layout.scroll_top = scroll_top;
        self
    }

    #[must_use]
    pub fn build(mut self) -> FrameLayout {
        self.layout.scroll_height = self.cursor.max(self.layout.viewport_height);
        let top = self.layout.scroll_top;
        self.layout.set_scroll_top(top);
        self.layout
    }
}
