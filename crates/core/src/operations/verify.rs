// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Verification operation (§4.5): confirm the backend's configuration and
//! topology match what Apply expected, riding out transient post-apply
//! churn with a small bounded spin.

use std::time::Duration;

use tracing::debug;

use crate::clock::{CancellationToken, Sleeper};
use crate::domain::{ActiveTopology, ApplyRequest};
use crate::ports::DisplayBackend;

const SPIN_STEP: Duration = Duration::from_millis(50);

/// `max_spin` bounds total time spent riding out transient churn; spec.md
/// §4.5/§5 sets this to "≤ a few hundred milliseconds" (default 200ms).
pub async fn verify(
    backend: &dyn DisplayBackend,
    request: &ApplyRequest,
    expected_topology: Option<&ActiveTopology>,
    token: &CancellationToken,
    sleeper: &dyn Sleeper,
    max_spin: Duration,
) -> bool {
    let mut elapsed = Duration::ZERO;
    loop {
        if token.is_cancelled() {
            debug!(generation = token.generation(), "verification cancelled");
            return false;
        }

        let config_ok = backend.configuration_matches(&request.configuration);
        let topology_ok = match expected_topology {
            Some(expected) => {
                let captured = backend.capture_topology();
                backend.is_topology_same(&captured, expected)
            }
            None => true,
        };

        if config_ok && topology_ok {
            return true;
        }

        if elapsed >= max_spin {
            debug!("verification spin exceeded bound, reporting failure");
            return false;
        }

        sleeper.sleep_for(SPIN_STEP).await;
        elapsed += SPIN_STEP;
    }
}

#[cfg(test)]
#[path = "verify_tests.rs"]
mod tests;
