// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Async Dispatcher (C7, §4.9, §5).
//!
//! Operations run on `tokio::spawn`ed workers; workers never call back into
//! the state machine directly (§9 "cyclic dependency" re-expression). They
//! post a [`DispatchCompletion`] onto a channel the state machine owns the
//! receiving half of — the dispatcher is handed only a `post_message`
//! sender, never a reference to the state machine itself.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::clock::{CancellationToken, Generation, Sleeper};
use crate::domain::{ActiveTopology, ApplyOutcome, ApplyRequest};
use crate::operations;
use crate::ports::{DisplayBackend, VirtualDisplayPort};
use crate::snapshot::SnapshotLedger;

/// Completion messages posted back onto the state machine's queue. Carries
/// the generation the originating dispatch was issued under so the state
/// machine can drop stale completions (§5).
#[derive(Debug)]
pub enum DispatchCompletion {
    Apply { generation: Generation, outcome: ApplyOutcome },
    Verification { generation: Generation, result: bool },
    Recovery { generation: Generation, outcome: operations::RecoveryOutcome },
    RecoveryValidation { generation: Generation, outcome: operations::RecoveryValidationOutcome },
}

impl DispatchCompletion {
    pub fn generation(&self) -> Generation {
        match self {
            DispatchCompletion::Apply { generation, .. }
            | DispatchCompletion::Verification { generation, .. }
            | DispatchCompletion::Recovery { generation, .. }
            | DispatchCompletion::RecoveryValidation { generation, .. } => *generation,
        }
    }
}

pub struct AsyncDispatcher {
    backend: Arc<dyn DisplayBackend>,
    virtual_display: Arc<dyn VirtualDisplayPort>,
    sleeper: Arc<dyn Sleeper>,
    post: UnboundedSender<DispatchCompletion>,
    verification_spin_bound: Duration,
    recovery_validation_settle: Duration,
    vd_reset_count: Arc<AtomicU32>,
}

impl AsyncDispatcher {
    pub fn new(
        backend: Arc<dyn DisplayBackend>,
        virtual_display: Arc<dyn VirtualDisplayPort>,
        sleeper: Arc<dyn Sleeper>,
        post: UnboundedSender<DispatchCompletion>,
        verification_spin_bound: Duration,
        recovery_validation_settle: Duration,
    ) -> Self {
        Self {
            backend,
            virtual_display,
            sleeper,
            post,
            verification_spin_bound,
            recovery_validation_settle,
            vd_reset_count: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Number of completed virtual-display reset cycles, for tests/metrics.
    pub fn virtual_display_reset_count(&self) -> u32 {
        self.vd_reset_count.load(Ordering::SeqCst)
    }

    /// Dispatch Apply, fire-and-forget. `pre_delay` spaces out retries
    /// (§4.8); `reset_virtual_display` runs the full cycle sequence first
    /// (§4.9).
    pub fn dispatch_apply(
        &self,
        request: ApplyRequest,
        token: CancellationToken,
        pre_delay: Duration,
        reset_virtual_display: bool,
    ) {
        let backend = self.backend.clone();
        let virtual_display = self.virtual_display.clone();
        let sleeper = self.sleeper.clone();
        let post = self.post.clone();
        let generation = token.generation();
        let vd_reset_count = self.vd_reset_count.clone();

        tokio::spawn(async move {
            if reset_virtual_display {
                sleeper.sleep_for(pre_delay).await;

                if !virtual_display.disable() {
                    debug!("virtual display disable failed, reporting fatal");
                    let _ = post.send(DispatchCompletion::Apply { generation, outcome: ApplyOutcome::fatal() });
                    return;
                }

                sleeper.sleep_for(Duration::from_millis(500)).await;

                if !virtual_display.enable() {
                    debug!("virtual display enable failed, reporting fatal");
                    let _ = post.send(DispatchCompletion::Apply { generation, outcome: ApplyOutcome::fatal() });
                    return;
                }

                sleeper.sleep_for(Duration::from_millis(1000)).await;
                vd_reset_count.fetch_add(1, Ordering::SeqCst);
            } else if !pre_delay.is_zero() {
                sleeper.sleep_for(pre_delay).await;
            }

            if token.is_cancelled() {
                return;
            }

            let outcome = operations::apply(backend.as_ref(), &request, &token);

            if token.is_cancelled() {
                return;
            }

            let _ = post.send(DispatchCompletion::Apply { generation, outcome });
        });
    }

    pub fn dispatch_verify(
        &self,
        request: ApplyRequest,
        expected_topology: Option<ActiveTopology>,
        token: CancellationToken,
    ) {
        let backend = self.backend.clone();
        let sleeper = self.sleeper.clone();
        let post = self.post.clone();
        let generation = token.generation();
        let max_spin = self.verification_spin_bound;

        tokio::spawn(async move {
            if token.is_cancelled() {
                return;
            }

            let result = operations::verify(
                backend.as_ref(),
                &request,
                expected_topology.as_ref(),
                &token,
                sleeper.as_ref(),
                max_spin,
            )
            .await;

            if token.is_cancelled() {
                return;
            }

            let _ = post.send(DispatchCompletion::Verification { generation, result });
        });
    }

    pub fn dispatch_recovery(
        &self,
        ledger: Arc<SnapshotLedger>,
        available_devices: std::collections::HashSet<crate::domain::DeviceId>,
        retry_delay: Duration,
        token: CancellationToken,
    ) {
        let backend = self.backend.clone();
        let sleeper = self.sleeper.clone();
        let post = self.post.clone();
        let generation = token.generation();

        tokio::spawn(async move {
            if token.is_cancelled() {
                return;
            }

            let outcome =
                operations::recover(backend.as_ref(), &ledger, &available_devices, retry_delay, &token, sleeper.as_ref())
                    .await;

            if token.is_cancelled() {
                return;
            }

            let _ = post.send(DispatchCompletion::Recovery { generation, outcome });
        });
    }

    pub fn dispatch_recovery_validate(
        &self,
        winning_snapshot: crate::domain::Snapshot,
        token: CancellationToken,
    ) {
        let backend = self.backend.clone();
        let sleeper = self.sleeper.clone();
        let post = self.post.clone();
        let generation = token.generation();
        let settle = self.recovery_validation_settle;

        tokio::spawn(async move {
            if token.is_cancelled() {
                return;
            }

            let outcome =
                operations::validate_recovery(backend.as_ref(), &winning_snapshot, &token, sleeper.as_ref(), settle)
                    .await;

            if token.is_cancelled() {
                return;
            }

            let _ = post.send(DispatchCompletion::RecoveryValidation { generation, outcome });
        });
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
