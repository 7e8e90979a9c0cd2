// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Apply operation (§4.4).

use tracing::debug;

use crate::clock::CancellationToken;
use crate::domain::{ApplyOutcome, ApplyRequest, ApplyStatus};
use crate::ports::DisplayBackend;

/// Run the Apply operation against `backend`. Pure sequencing: no retries,
/// no dispatcher concerns, no policy beyond what §4.4 itself names.
pub fn apply(backend: &dyn DisplayBackend, request: &ApplyRequest, token: &CancellationToken) -> ApplyOutcome {
    if token.is_cancelled() {
        debug!(generation = token.generation(), "apply cancelled before start");
        return ApplyOutcome::fatal();
    }

    let computed = backend.compute_expected_topology(&request.configuration, request.topology_override.as_ref());

    // The override wins for verification whenever both are present (§4.4 step 3).
    let expected_topology = match (&request.topology_override, &computed) {
        (Some(override_topology), Some(_)) => Some(override_topology.clone()),
        (Some(override_topology), None) => Some(override_topology.clone()),
        (None, computed) => computed.clone(),
    };

    if token.is_cancelled() {
        return ApplyOutcome::fatal();
    }

    let status = backend.apply(&request.configuration);
    debug!(?status, "apply backend call completed");

    match status {
        ApplyStatus::Ok => ApplyOutcome::ok(expected_topology),
        ApplyStatus::NeedsVirtualDisplayReset => ApplyOutcome::needs_virtual_display_reset(expected_topology),
        ApplyStatus::Retryable => ApplyOutcome::retryable(),
        ApplyStatus::InvalidRequest => ApplyOutcome::invalid_request(),
        ApplyStatus::Fatal => ApplyOutcome::fatal(),
    }
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod tests;
