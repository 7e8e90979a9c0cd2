// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Operations (C6, §4.4–§4.7): pure sequencing of the backend/ledger ports
//! with policy, independent of the dispatcher or state machine.

mod apply;
mod recovery;
mod recovery_validate;
mod verify;

pub use apply::apply;
pub use recovery::{recover, RecoveryOutcome};
pub use recovery_validate::{validate_recovery, RecoveryValidationOutcome};
pub use verify::verify;
