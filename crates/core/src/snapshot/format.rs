// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Versioned, structured on-disk document for a single snapshot tier (§6).
//!
//! Concrete representation is UTF-8 JSON, chosen over the source's text
//! format per spec.md §9 open question (a): only "versioned structured"
//! and "atomic writes" are mandated, the representation is an
//! implementer's choice.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ActiveTopology, DeviceId, DisplayMode, HdrState, Snapshot};

/// Bump whenever the on-disk shape changes incompatibly. Unknown versions
/// are a load miss, never an error (§6).
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ModeDoc {
    width: u32,
    height: u32,
    refresh_num: u32,
    refresh_den: u32,
}

impl From<DisplayMode> for ModeDoc {
    fn from(m: DisplayMode) -> Self {
        ModeDoc { width: m.width, height: m.height, refresh_num: m.refresh_num, refresh_den: m.refresh_den }
    }
}

impl From<ModeDoc> for DisplayMode {
    fn from(m: ModeDoc) -> Self {
        DisplayMode::new(m.width, m.height, m.refresh_num, m.refresh_den)
    }
}

fn hdr_to_doc(h: HdrState) -> Option<&'static str> {
    match h {
        HdrState::Unknown => None,
        HdrState::Enabled => Some("enabled"),
        HdrState::Disabled => Some("disabled"),
    }
}

fn hdr_from_doc(s: &Option<String>) -> HdrState {
    match s.as_deref() {
        Some("enabled") => HdrState::Enabled,
        Some("disabled") => HdrState::Disabled,
        _ => HdrState::Unknown,
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotDocument {
    version: u32,
    topology: Vec<Vec<DeviceId>>,
    modes: BTreeMap<DeviceId, ModeDoc>,
    hdr_states: BTreeMap<DeviceId, Option<String>>,
    primary_device: Option<DeviceId>,
}

impl SnapshotDocument {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            version: CURRENT_VERSION,
            topology: snapshot.topology.groups.clone(),
            modes: snapshot.modes.iter().map(|(k, v)| (k.clone(), (*v).into())).collect(),
            hdr_states: snapshot.hdr_states.iter().map(|(k, v)| (k.clone(), hdr_to_doc(*v).map(str::to_string))).collect(),
            primary_device: snapshot.primary_device.clone(),
        }
    }

    /// Returns `None` for unknown versions — a load miss, not an error.
    pub fn into_snapshot(self) -> Option<Snapshot> {
        if self.version != CURRENT_VERSION {
            return None;
        }
        let modes = self.modes.into_iter().map(|(k, v)| (k, v.into())).collect();
        let hdr_states = self.hdr_states.into_iter().map(|(k, v)| (k, hdr_from_doc(&v))).collect();
        Some(Snapshot {
            topology: ActiveTopology::new(self.topology),
            modes,
            hdr_states,
            primary_device: self.primary_device,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
