// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Session Deferral Manager (C11, §4.11).
//!
//! Holds at most one [`Pending`] apply request, staged until the owning
//! session signals readiness, then released after an initial settle delay.
//! §9 "pointer-to-session" re-expression: [`Pending`] owns an immutable
//! [`SessionSnapshot`] copy rather than referencing the live session.

use std::time::{Duration, Instant};

use crate::domain::{ApplyRequest, SessionSnapshot};

#[derive(Debug, Clone)]
pub struct Pending {
    pub request: ApplyRequest,
    pub session_snapshot: SessionSnapshot,
    pub scheduled_at: Instant,
    pub attempts: u32,
}

/// Outcome of polling [`SessionDeferralManager::take_ready`].
#[derive(Debug)]
pub enum TakeReady {
    /// Nothing pending, or the session isn't ready yet.
    SessionNotReady,
    /// First ready poll: the settle delay has just started.
    DelayStarted,
    /// Settle delay is running but hasn't elapsed yet.
    DelayPending,
    /// Delay elapsed: the pending entry is handed to the caller.
    Ready(Pending),
}

/// Bounded backoff for [`SessionDeferralManager::reschedule`]: 500ms per
/// attempt, capped at 5s — "a small delay; bounded" per §4.11.
fn retry_backoff(attempts: u32) -> Duration {
    Duration::from_millis((attempts as u64).saturating_mul(500).min(5000))
}

pub struct SessionDeferralManager {
    pending: Option<Pending>,
    initial_delay: Duration,
    effective_delay: Duration,
    delay_started_at: Option<Instant>,
}

impl SessionDeferralManager {
    pub fn new(initial_delay: Duration) -> Self {
        Self { pending: None, initial_delay, effective_delay: initial_delay, delay_started_at: None }
    }

    pub fn with_default_delay() -> Self {
        Self::new(Duration::from_millis(1500))
    }

    /// Replace any existing Pending atomically; the replaced entry (if any)
    /// is discarded and the settle delay restarts.
    pub fn set_pending(&mut self, request: ApplyRequest, session_snapshot: SessionSnapshot, now: Instant) {
        self.pending = Some(Pending { request, session_snapshot, scheduled_at: now, attempts: 0 });
        self.effective_delay = self.initial_delay;
        self.delay_started_at = None;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn take_ready(&mut self, session_ready: bool, now: Instant) -> TakeReady {
        if self.pending.is_none() {
            return TakeReady::SessionNotReady;
        }
        if !session_ready {
            return TakeReady::SessionNotReady;
        }

        match self.delay_started_at {
            None => {
                self.delay_started_at = Some(now);
                TakeReady::DelayStarted
            }
            Some(started) if now.duration_since(started) < self.effective_delay => TakeReady::DelayPending,
            Some(_) => {
                self.delay_started_at = None;
                match self.pending.take() {
                    Some(pending) => TakeReady::Ready(pending),
                    None => TakeReady::SessionNotReady,
                }
            }
        }
    }

    /// Called when Apply should be retried later. Drops `pending` if a
    /// newer one has since been staged; otherwise re-stages it with a
    /// bounded retry backoff.
    pub fn reschedule(&mut self, mut pending: Pending, now: Instant) -> bool {
        if self.pending.is_some() {
            return true; // dropped_for_newer
        }
        pending.attempts += 1;
        pending.scheduled_at = now;
        self.effective_delay = retry_backoff(pending.attempts);
        self.delay_started_at = None;
        self.pending = Some(pending);
        false
    }
}

#[cfg(test)]
#[path = "deferral_tests.rs"]
mod tests;
