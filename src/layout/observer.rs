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

use super::{LayoutHandle, LayoutSurface};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Attributes whose change means an element was expanded or collapsed.
const TOGGLE_ATTRIBUTES: [&str; 4] = ["class", "style", "open", "data-expanded"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recompute {
    None,
    /// Layout changed enough that the spacer must be recomputed now.
    Immediate,
    /// A small change was seen; [`LayoutObserver::poll`] will report it later.
    Deferred,
}

/// Diffs per-element heights across frames and decides when the spacer needs
/// recomputing.
#[derive(Debug)]
pub struct LayoutObserver {
    resize_threshold: f64,
    debounce: Duration,
    observed: HashMap<LayoutHandle, Option<f64>>,
    last_viewport: Option<f64>,
    deadline: Option<Instant>,
    immediate_next: bool,
}

impl LayoutObserver {
    #[must_use]
    pub fn new(resize_threshold: f64, debounce: Duration) -> Self {
        Self {
            resize_threshold,
            debounce,
            observed: HashMap::new(),
            last_viewport: None,
            deadline: None,
            immediate_next: false,
        }
    }

    /// Observe newly rendered elements and forget unmounted ones.
    pub fn sync_membership(&mut self, handles: &[LayoutHandle]) {
        self.observed.retain(|handle, _| handles.contains(handle));
        for handle in handles {
            self.observed.entry(*handle).or_insert(None);
        }
    }

    #[must_use]
    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    pub fn observe_sizes<S: LayoutSurface + ?Sized>(&mut self, surface: &S, now: Instant) -> Recompute {
        let mut significant = std::mem::take(&mut self.immediate_next);
        let mut changed = false;

        let viewport = surface.viewport_height();
        if let Some(previous) = self.last_viewport.replace(viewport) {
            let delta = (viewport - previous).abs();
            if delta > self.resize_threshold {
                significant = true;
            } else if delta > 0.0 {
                changed = true;
            }
        }

        for (handle, last) in &mut self.observed {
            let Some(current) = surface.measure(*handle).map(|b| b.height) else {
                continue;
            };
            match last.replace(current) {
                // First sighting is the element mounting, which the message
                // list change already covers.
                None => {}
                Some(previous) => {
                    let delta = (current - previous).abs();
                    if delta > self.resize_threshold {
                        significant = true;
                    } else if delta > 0.0 {
                        changed = true;
                    }
                }
            }
        }

        if significant {
            self.deadline = None;
            tracing::trace!("significant layout change, recomputing now");
            Recompute::Immediate
        } else if changed {
            self.deadline = Some(now + self.debounce);
            Recompute::Deferred
        } else {
            Recompute::None
        }
    }

    /// Expand/collapse toggles recompute immediately; anything else is ignored.
    pub fn on_attribute_mutation(&mut self, attribute: &str) -> Recompute {
        if !TOGGLE_ATTRIBUTES.contains(&attribute) {
            return Recompute::None;
        }
        self.deadline = None;
        // The resize that follows the toggle is part of the same change.
        self.immediate_next = true;
        Recompute::Immediate
    }

    /// Fire the debounced recompute once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn disconnect(&mut self) {
        self.observed.clear();
        self.last_viewport = None;
        self.deadline = None;
        self.immediate_next = false;
    }
}
