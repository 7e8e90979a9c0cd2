// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Snapshot service and crash-safe persistence (C5, §4.3).

mod format;
mod ledger;
mod persistence;

pub use format::{SnapshotDocument, CURRENT_VERSION};
pub use ledger::{recovery_order, SnapshotLedger};
pub use persistence::SnapshotStore;
