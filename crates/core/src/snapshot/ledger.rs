// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Snapshot service (C5): wraps [`SnapshotStore`] with the recovery-order
//! policy and blacklist-aware capture used by the operations layer.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::domain::{DeviceId, Snapshot, SnapshotTier};
use crate::error::CoreResult;
use crate::ports::DisplayBackend;

use super::persistence::SnapshotStore;

/// The default ledger order is `[Current, Previous, Golden]`; when
/// `prefer_golden_first` is set, `[Golden, Current, Previous]`.
pub fn recovery_order(prefer_golden_first: bool) -> [SnapshotTier; 3] {
    if prefer_golden_first {
        [SnapshotTier::Golden, SnapshotTier::Current, SnapshotTier::Previous]
    } else {
        [SnapshotTier::Current, SnapshotTier::Previous, SnapshotTier::Golden]
    }
}

pub struct SnapshotLedger {
    store: SnapshotStore,
    pub prefer_golden_first: bool,
}

impl SnapshotLedger {
    pub fn new(dir: impl Into<PathBuf>, prefer_golden_first: bool) -> Self {
        Self { store: SnapshotStore::new(dir), prefer_golden_first }
    }

    pub fn recovery_order(&self) -> [SnapshotTier; 3] {
        recovery_order(self.prefer_golden_first)
    }

    pub fn save(&self, tier: SnapshotTier, snapshot: &Snapshot, blacklist: &HashSet<DeviceId>) -> CoreResult<bool> {
        self.store.save(tier, snapshot, blacklist)
    }

    pub fn load(&self, tier: SnapshotTier, available_devices: &HashSet<DeviceId>) -> CoreResult<Option<Snapshot>> {
        self.store.load(tier, available_devices)
    }

    pub fn rotate_current_to_previous(&self) -> CoreResult<()> {
        self.store.rotate_current_to_previous()
    }

    pub fn is_present(&self, tier: SnapshotTier) -> bool {
        self.store.is_present(tier)
    }

    /// Capture the backend's current snapshot, filter the blacklist, and
    /// save it as Current (rotating the old Current into Previous first).
    pub fn snapshot_current(
        &self,
        backend: &dyn DisplayBackend,
        blacklist: &HashSet<DeviceId>,
    ) -> CoreResult<bool> {
        self.rotate_current_to_previous()?;
        let snapshot = backend.capture_snapshot();
        self.save(SnapshotTier::Current, &snapshot, blacklist)
    }

    /// Capture and save the user-declared Golden baseline.
    pub fn export_golden(&self, backend: &dyn DisplayBackend, blacklist: &HashSet<DeviceId>) -> CoreResult<bool> {
        let snapshot = backend.capture_snapshot();
        self.save(SnapshotTier::Golden, &snapshot, blacklist)
    }

    pub fn missing_devices(&self, snapshot: &Snapshot, available: &HashSet<DeviceId>) -> Vec<DeviceId> {
        snapshot.missing_devices(available)
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
