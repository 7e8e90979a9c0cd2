// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! ApplyPolicy (C8, §4.8): retry delays, fatal-vs-retryable classification,
//! virtual-display reset cooldown.

use std::time::{Duration, Instant};

use crate::domain::ApplyStatus;

/// What the dispatcher should do next in response to a
/// `NeedsVirtualDisplayReset` outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualDisplayDecision {
    /// Cycle the virtual display before the next Apply retry.
    ResetVirtualDisplay,
    /// Cooldown hasn't elapsed; retry Apply without cycling.
    Proceed,
}

#[derive(Debug, Clone, Copy)]
pub struct ApplyPolicy {
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub virtual_display_cooldown: Duration,
}

impl Default for ApplyPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(300),
            max_retries: 3,
            virtual_display_cooldown: Duration::from_secs(30),
        }
    }
}

impl ApplyPolicy {
    /// Constant 300ms regardless of attempt number, by design (§4.8: "never
    /// an exponential blow-up").
    pub fn retry_delay(&self, _attempt: u32) -> Duration {
        self.retry_delay
    }

    pub fn should_skip_tier(status: ApplyStatus) -> bool {
        status.is_terminal()
    }

    /// Decide whether to cycle the virtual display. `last_reset` is the
    /// instant of the most recent reset, if any; `now` is the caller's
    /// clock reading (indirected so tests can drive it without real sleeps).
    pub fn maybe_reset_virtual_display(
        &self,
        status: ApplyStatus,
        requested: bool,
        last_reset: Option<Instant>,
        now: Instant,
    ) -> VirtualDisplayDecision {
        if status != ApplyStatus::NeedsVirtualDisplayReset || !requested {
            return VirtualDisplayDecision::Proceed;
        }
        match last_reset {
            Some(last) if now.duration_since(last) < self.virtual_display_cooldown => {
                VirtualDisplayDecision::Proceed
            }
            _ => VirtualDisplayDecision::ResetVirtualDisplay,
        }
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
