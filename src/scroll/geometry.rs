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

use super::policy::ScrollPolicy;
use crate::layout::ElementBox;

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Where to scroll so message `index` (measured as `element`) sits well in view.
///
/// Large messages keep their tail visible near the top; the first message
/// pins to the very top.
#[must_use]
pub fn scroll_target(
    index: usize,
    element: ElementBox,
    list_offset: f64,
    viewport_height: f64,
    scroll_height: f64,
    policy: &ScrollPolicy,
) -> f64 {
    let relative = finite_or_zero(element.top - list_offset);
    let height = finite_or_zero(element.height);
    let viewport = finite_or_zero(viewport_height);

    let target = if height > viewport * policy.large_message_ratio {
        relative + height - viewport * policy.large_message_tail_ratio
    } else if index == 0 {
        0.0
    } else {
        relative
    };

    let max_scroll = finite_or_zero(scroll_height - viewport).max(0.0);
    target.clamp(0.0, max_scroll)
}

/// Measurements feeding one spacer recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpacerInput {
    pub viewport_height: f64,
    /// Height of the last user message.
    pub target_height: f64,
    /// Summed height of everything rendered after the last user message.
    pub content_after: f64,
    /// Summed height of every rendered message.
    pub total_content: f64,
    pub streaming: bool,
}

/// Blank space to reserve after the last message so the user's message can
/// sit at the top of the viewport.
#[must_use]
pub fn spacer_height(input: SpacerInput, policy: &ScrollPolicy) -> f64 {
    let viewport = finite_or_zero(input.viewport_height).max(0.0);
    let target = finite_or_zero(input.target_height).max(0.0);
    let after = finite_or_zero(input.content_after).max(0.0);
    let total = finite_or_zero(input.total_content).max(0.0);

    let base = if after > 0.0 {
        (viewport - after - target).max(0.0)
    } else {
        (viewport - target).max(0.0)
    };

    if total + base <= viewport {
        return 0.0;
    }

    let extra = if input.streaming {
        viewport * finite_or_zero(policy.streaming_extra_ratio).max(0.0)
    } else {
        0.0
    };
    base + extra
}
