// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Atomic, file-backed persistence for the three-tier snapshot ledger (C5).
//!
//! Every write serializes to a sibling `.tmp` file, `fsync`s it, then
//! renames it over the target — the rename is atomic on the filesystems
//! this is expected to run on, so a reader never observes a half-written
//! file.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::{DeviceId, Snapshot, SnapshotTier};
use crate::error::CoreResult;

use super::format::SnapshotDocument;

/// Directory-backed store for the three snapshot tiers.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, tier: SnapshotTier) -> PathBuf {
        self.dir.join(tier.file_name())
    }

    fn tmp_path_for(&self, tier: SnapshotTier) -> PathBuf {
        self.dir.join(format!("{}.tmp", tier.file_name()))
    }

    /// Serialize `snapshot` to a temp file, fsync, then rename over `path`.
    fn write_atomic(&self, path: &Path, tmp_path: &Path, snapshot: &Snapshot) -> CoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = SnapshotDocument::from_snapshot(snapshot).to_json()?;
        {
            let mut file = File::create(tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    /// Filters out any device in `blacklist`. If filtering empties the
    /// topology, the save fails (returns `Ok(false)`) and the tier is left
    /// untouched.
    pub fn save(&self, tier: SnapshotTier, snapshot: &Snapshot, blacklist: &HashSet<DeviceId>) -> CoreResult<bool> {
        let filtered = snapshot.filtered(blacklist);
        if filtered.topology.is_empty() {
            return Ok(false);
        }
        let path = self.path_for(tier);
        let tmp_path = self.tmp_path_for(tier);
        self.write_atomic(&path, &tmp_path, &filtered)?;
        Ok(true)
    }

    /// Load a tier, returning `None` if the file is absent, unparsable, an
    /// unknown version, or references a device missing from
    /// `available_devices`.
    pub fn load(&self, tier: SnapshotTier, available_devices: &HashSet<DeviceId>) -> CoreResult<Option<Snapshot>> {
        let path = self.path_for(tier);
        let bytes = match fs::read_to_string(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Ok(doc) = SnapshotDocument::from_json(&bytes) else {
            return Ok(None);
        };
        let Some(snapshot) = doc.into_snapshot() else {
            return Ok(None);
        };
        if !snapshot.missing_devices(available_devices).is_empty() {
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    /// Copy Current's serialized form to Previous, byte-for-byte. A no-op
    /// (success) if Current is absent.
    pub fn rotate_current_to_previous(&self) -> CoreResult<()> {
        let current_path = self.path_for(SnapshotTier::Current);
        let bytes = match fs::read(&current_path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let previous_path = self.path_for(SnapshotTier::Previous);
        let tmp_path = self.tmp_path_for(SnapshotTier::Previous);
        if let Some(parent) = previous_path.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &previous_path)?;
        Ok(())
    }

    pub fn is_present(&self, tier: SnapshotTier) -> bool {
        self.path_for(tier).exists()
    }
}

#[cfg(test)]
#[path = "persistence_tests.rs"]
mod tests;
