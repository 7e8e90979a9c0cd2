// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Disconnect grace window and reconnect controller (C9, §4.12).

use std::time::{Duration, Instant};

/// Starts (or resets) a timer on disconnect; `should_trigger` fires exactly
/// once when the grace period fully elapses without a reconnect.
pub struct DisconnectGrace {
    grace_duration: Duration,
    disconnected_at: Option<Instant>,
    triggered: bool,
}

impl DisconnectGrace {
    pub fn new(grace_duration: Duration) -> Self {
        Self { grace_duration, disconnected_at: None, triggered: false }
    }

    pub fn with_default_grace() -> Self {
        Self::new(Duration::from_secs(30))
    }

    /// Start (or restart) the grace timer from `now`.
    pub fn on_disconnect(&mut self, now: Instant) {
        self.disconnected_at = Some(now);
        self.triggered = false;
    }

    /// Cancel the pending trigger — a reconnect suppresses this episode's
    /// revert, even if checked after the grace window would otherwise have
    /// elapsed (§8 invariant 8, disconnect-grace idempotence).
    pub fn on_reconnect(&mut self) {
        self.disconnected_at = None;
        self.triggered = false;
    }

    /// Returns `true` exactly once per disconnect episode, the first time
    /// it is called after the grace period has fully elapsed.
    pub fn should_trigger(&mut self, now: Instant) -> bool {
        let Some(disconnected_at) = self.disconnected_at else {
            return false;
        };
        if self.triggered {
            return false;
        }
        if now.duration_since(disconnected_at) >= self.grace_duration {
            self.triggered = true;
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.disconnected_at.is_some() && !self.triggered
    }
}

/// Drives [`DisconnectGrace`] from a stream of connection state updates and
/// tracks whether the out-of-process helper's IPC pipe has broken.
pub struct ReconnectController {
    grace: DisconnectGrace,
    connected: bool,
    pipe_broken: bool,
}

impl ReconnectController {
    pub fn new(grace_duration: Duration) -> Self {
        Self { grace: DisconnectGrace::new(grace_duration), connected: true, pipe_broken: false }
    }

    /// Feed a connection-state update. Returns `true` iff a revert should
    /// now run (the grace period elapsed without reconnect).
    pub fn update_connection(&mut self, connected: bool, now: Instant) -> bool {
        if connected {
            if !self.connected {
                self.grace.on_reconnect();
            }
            self.connected = true;
            false
        } else {
            if self.connected {
                self.grace.on_disconnect(now);
            }
            self.connected = false;
            self.grace.should_trigger(now)
        }
    }

    /// Signal that the underlying IPC pipe to the helper broke.
    pub fn on_broken(&mut self) {
        self.pipe_broken = true;
    }

    /// Latches `true` until consumed; resets to `false` on read.
    pub fn should_restart_pipe(&mut self) -> bool {
        std::mem::take(&mut self.pipe_broken)
    }
}

#[cfg(test)]
#[path = "disconnect_grace_tests.rs"]
mod tests;
