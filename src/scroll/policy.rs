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

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_LARGE_MESSAGE_RATIO: f64 = 0.7;
pub const DEFAULT_LARGE_MESSAGE_TAIL_RATIO: f64 = 0.3;
pub const DEFAULT_STREAMING_EXTRA_RATIO: f64 = 0.4;
pub const MAX_STREAMING_EXTRA_RATIO: f64 = 0.4;
pub const DEFAULT_NEAR_BOTTOM_THRESHOLD: f64 = 150.0;
pub const DEFAULT_RESIZE_THRESHOLD: f64 = 50.0;
pub const DEFAULT_RESIZE_DEBOUNCE_MS: u64 = 100;

pub const TERMINAL_NEAR_BOTTOM_ROWS: f64 = 8.0;
pub const TERMINAL_RESIZE_ROWS: f64 = 3.0;

/// Tunables for the autoscroll controller and layout observer.
///
/// Distances are in layout-surface units: pixels for the defaults, rows for
/// [`ScrollPolicy::terminal`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollPolicy {
    /// A message taller than this share of the viewport is "large".
    pub large_message_ratio: f64,
    /// Share of the viewport left below a large message's tail.
    pub large_message_tail_ratio: f64,
    /// Extra spacer reserved while a reply streams, as a share of the viewport.
    pub streaming_extra_ratio: f64,
    pub near_bottom_threshold: f64,
    pub resize_threshold: f64,
    pub resize_debounce_ms: u64,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            large_message_ratio: DEFAULT_LARGE_MESSAGE_RATIO,
            large_message_tail_ratio: DEFAULT_LARGE_MESSAGE_TAIL_RATIO,
            streaming_extra_ratio: DEFAULT_STREAMING_EXTRA_RATIO,
            near_bottom_threshold: DEFAULT_NEAR_BOTTOM_THRESHOLD,
            resize_threshold: DEFAULT_RESIZE_THRESHOLD,
            resize_debounce_ms: DEFAULT_RESIZE_DEBOUNCE_MS,
        }
    }
}

impl ScrollPolicy {
    /// Same ratios, with distances scaled to terminal rows.
    #[must_use]
    pub fn terminal() -> Self {
        Self {
            near_bottom_threshold: TERMINAL_NEAR_BOTTOM_ROWS,
            resize_threshold: TERMINAL_RESIZE_ROWS,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    /// Pull out-of-range values from a config file back into range.
    #[must_use]
    pub fn clamped(self) -> Self {
        let ratio = |value: f64, fallback: f64| {
            if value.is_finite() { value.clamp(0.0, 1.0) } else { fallback }
        };
        let distance = |value: f64, fallback: f64| {
            if value.is_finite() { value.max(0.0) } else { fallback }
        };
        Self {
            large_message_ratio: ratio(self.large_message_ratio, DEFAULT_LARGE_MESSAGE_RATIO),
            large_message_tail_ratio: ratio(
                self.large_message_tail_ratio,
                DEFAULT_LARGE_MESSAGE_TAIL_RATIO,
            ),
            streaming_extra_ratio: ratio(self.streaming_extra_ratio, DEFAULT_STREAMING_EXTRA_RATIO)
                .min(MAX_STREAMING_EXTRA_RATIO),
            near_bottom_threshold: distance(
                self.near_bottom_threshold,
                DEFAULT_NEAR_BOTTOM_THRESHOLD,
            ),
            resize_threshold: distance(self.resize_threshold, DEFAULT_RESIZE_THRESHOLD),
            resize_debounce_ms: self.resize_debounce_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_policy_keeps_ratios() {
        let policy = ScrollPolicy::terminal();
        assert!((policy.streaming_extra_ratio - 0.4).abs() < f64::EPSILON);
        assert!((policy.near_bottom_threshold - TERMINAL_NEAR_BOTTOM_ROWS).abs() < f64::EPSILON);
        assert_eq!(policy.resize_debounce(), Duration::from_millis(100));
    }

    #[test]
    fn clamped_caps_streaming_extra_and_rejects_nan() {
        let policy = ScrollPolicy {
            streaming_extra_ratio: 0.9,
            large_message_ratio: f64::NAN,
            near_bottom_threshold: -4.0,
            ..ScrollPolicy::default()
        }
        .clamped();
        assert!((policy.streaming_extra_ratio - MAX_STREAMING_EXTRA_RATIO).abs() < f64::EPSILON);
        assert!((policy.large_message_ratio - DEFAULT_LARGE_MESSAGE_RATIO).abs() < f64::EPSILON);
        assert!(policy.near_bottom_threshold.abs() < f64::EPSILON);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let policy: ScrollPolicy =
            serde_json::from_str(r#"{"streaming_extra_ratio": 0.0}"#).expect("decode");
        assert!(policy.streaming_extra_ratio.abs() < f64::EPSILON);
        assert!((policy.large_message_ratio - DEFAULT_LARGE_MESSAGE_RATIO).abs() < f64::EPSILON);
    }
}
