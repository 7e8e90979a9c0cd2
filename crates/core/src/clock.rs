// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Monotonic time source and generational cancellation (C1).
//!
//! Every async message the dispatcher posts back to the state machine
//! carries the [`Generation`] that originated it. `CancellationSource::cancel`
//! bumps the generation; stragglers from before the bump are dropped on
//! arrival (see [`crate::state_machine`]).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonically increasing counter distinguishing live async work from
/// cancelled stragglers.
pub type Generation = u64;

/// Abstract monotonic clock, mockable for tests that need deterministic
/// time without real sleeps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock backed by [`std::time::Instant`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Shared, thread-safe source of [`CancellationToken`]s.
#[derive(Debug, Clone)]
pub struct CancellationSource {
    generation: Arc<AtomicU64>,
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationSource {
    pub fn new() -> Self {
        Self { generation: Arc::new(AtomicU64::new(0)) }
    }

    /// Issue a token stamped with the current generation.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            generation: self.generation.load(Ordering::Acquire),
            source: self.generation.clone(),
        }
    }

    /// Bump the generation, invalidating every previously issued token.
    /// Returns the new generation.
    pub fn cancel(&self) -> Generation {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn current(&self) -> Generation {
        self.generation.load(Ordering::Acquire)
    }
}

/// A cancellation token stamped with the generation it was issued under.
///
/// `is_cancelled` compares the stamped generation against the source's
/// current generation rather than latching a boolean — this is what lets
/// the state machine drop stale completion messages purely by comparing
/// generation numbers (§5, Generation drop, invariant 4 in spec §8).
#[derive(Debug, Clone)]
pub struct CancellationToken {
    generation: Generation,
    source: Arc<AtomicU64>,
}

impl CancellationToken {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.source.load(Ordering::Acquire) != self.generation
    }
}

/// Async sleep, indirected so tests can substitute a zero-delay or
/// instrumented sleep without waiting on real wall-clock time.
pub trait Sleeper: Send + Sync {
    fn sleep_for(&self, duration: Duration) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;
}

/// Production sleeper backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep_for(&self, duration: Duration) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
