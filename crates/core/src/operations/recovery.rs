// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Recovery operation (§4.6): walk the ledger's recovery order, applying
//! and re-verifying tiered snapshots until one sticks.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::clock::{CancellationToken, Sleeper};
use crate::domain::{DeviceId, Snapshot};
use crate::ports::DisplayBackend;
use crate::snapshot::SnapshotLedger;

const MAX_APPLY_ATTEMPTS: u32 = 2;

#[derive(Debug)]
pub struct RecoveryOutcome {
    pub success: bool,
    pub winning_snapshot: Option<Snapshot>,
}

/// Walk `ledger.recovery_order()`, attempting each tier up to
/// [`MAX_APPLY_ATTEMPTS`] times with `retry_delay` between attempts.
#[allow(clippy::too_many_arguments)]
pub async fn recover(
    backend: &dyn DisplayBackend,
    ledger: &SnapshotLedger,
    available_devices: &HashSet<DeviceId>,
    retry_delay: std::time::Duration,
    token: &CancellationToken,
    sleeper: &dyn Sleeper,
) -> RecoveryOutcome {
    for tier in ledger.recovery_order() {
        if token.is_cancelled() {
            debug!("recovery cancelled before tier {:?}", tier);
            return RecoveryOutcome { success: false, winning_snapshot: None };
        }

        let snapshot = match ledger.load(tier, available_devices) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!(?tier, "recovery tier load miss, trying next tier");
                continue;
            }
            Err(err) => {
                warn!(?tier, %err, "recovery tier load error, trying next tier");
                continue;
            }
        };

        if !backend.validate_topology(&snapshot.topology) {
            debug!(?tier, "recovery tier rejected by validate_topology");
            continue;
        }

        let mut matched = false;
        for attempt in 1..=MAX_APPLY_ATTEMPTS {
            if token.is_cancelled() {
                return RecoveryOutcome { success: false, winning_snapshot: None };
            }

            if attempt > 1 {
                sleeper.sleep_for(retry_delay).await;
            }

            if token.is_cancelled() {
                return RecoveryOutcome { success: false, winning_snapshot: None };
            }

            backend.apply_snapshot(&snapshot);

            if token.is_cancelled() {
                return RecoveryOutcome { success: false, winning_snapshot: None };
            }

            if backend.snapshot_matches_current(&snapshot) {
                matched = true;
                break;
            }
        }

        if matched {
            debug!(?tier, "recovery tier succeeded");
            return RecoveryOutcome { success: true, winning_snapshot: Some(snapshot) };
        }
    }

    RecoveryOutcome { success: false, winning_snapshot: None }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
