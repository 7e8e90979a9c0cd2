// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! RecoveryValidation operation (§4.7): re-capture the current snapshot and
//! confirm it still matches the winning snapshot after a brief settle.

use std::time::Duration;

use tracing::debug;

use crate::clock::{CancellationToken, Sleeper};
use crate::domain::Snapshot;
use crate::ports::DisplayBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryValidationOutcome {
    pub success: bool,
}

pub async fn validate_recovery(
    backend: &dyn DisplayBackend,
    winning_snapshot: &Snapshot,
    token: &CancellationToken,
    sleeper: &dyn Sleeper,
    settle: Duration,
) -> RecoveryValidationOutcome {
    sleeper.sleep_for(settle).await;

    if token.is_cancelled() {
        debug!("recovery validation cancelled during settle");
        return RecoveryValidationOutcome { success: false };
    }

    let success = backend.snapshot_matches_current(winning_snapshot);
    RecoveryValidationOutcome { success }
}

#[cfg(test)]
#[path = "recovery_validate_tests.rs"]
mod tests;
