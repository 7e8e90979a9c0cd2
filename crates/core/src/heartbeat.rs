// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Helper-liveness heartbeat (C9, §4.13). Edge-triggered timeout check:
//! consuming a fired timeout re-arms the monitor to "not fired".

use std::time::{Duration, Instant};

pub struct HeartbeatMonitor {
    timeout: Duration,
    armed_at: Option<Instant>,
}

impl HeartbeatMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, armed_at: None }
    }

    pub fn with_default_timeout() -> Self {
        Self::new(Duration::from_secs(30))
    }

    /// Arm the monitor, recording `now` as the last-seen heartbeat.
    pub fn arm(&mut self, now: Instant) {
        self.armed_at = Some(now);
    }

    pub fn disarm(&mut self) {
        self.armed_at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    /// Returns `true` iff armed and elapsed since arming is ≥ timeout.
    /// Edge-triggered: a positive result re-arms the "not fired" state by
    /// resetting the arm point to `now`, so a caller polling on an interval
    /// sees the fire exactly once per timeout period.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        match self.armed_at {
            Some(armed_at) if now.duration_since(armed_at) >= self.timeout => {
                self.armed_at = Some(now);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
