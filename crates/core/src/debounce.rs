// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Debounced external-event coalescing (C9). A burst of `notify` calls
//! within the debounce window collapses to a single `should_fire` edge.

use std::time::{Duration, Instant};

pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, deadline: None }
    }

    /// Record an event, (re)starting the debounce window from `now`.
    pub fn notify(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// Returns `true` exactly once per window boundary: when a deadline is
    /// pending and `now` has reached it. Consuming the fire clears the
    /// pending deadline (edge-triggered), so a second call without an
    /// intervening `notify` returns `false`.
    pub fn should_fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

#[cfg(test)]
#[path = "debounce_tests.rs"]
mod tests;
