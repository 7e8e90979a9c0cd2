// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Data model shared by every component (§3): device identifiers, display
//! modes, topology, snapshots, and the request/outcome vocabulary that
//! flows between the state machine, dispatcher, and operations.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Opaque, OS-assigned stable identifier for a display device.
pub type DeviceId = String;

/// Width/height/refresh-rate-millihertz description of a display mode.
/// Refresh rate may be expressed as a rational (`refresh_num`/`refresh_den`)
/// so that e.g. 59.94 Hz round-trips exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub refresh_num: u32,
    pub refresh_den: u32,
}

impl DisplayMode {
    pub fn new(width: u32, height: u32, refresh_num: u32, refresh_den: u32) -> Self {
        Self { width, height, refresh_num, refresh_den }
    }

    /// Convenience constructor for an integer refresh rate (denominator 1).
    pub fn whole_hz(width: u32, height: u32, hz: u32) -> Self {
        Self::new(width, height, hz, 1)
    }
}

/// HDR capability/state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HdrState {
    Unknown,
    Enabled,
    Disabled,
}

/// A duplicate (mirrored) group of device ids, order-preserving.
pub type DeviceGroup = Vec<DeviceId>;

/// The OS-visible arrangement of active outputs: an ordered sequence of
/// groups, layout order across groups, member order within a group.
///
/// Equality is multiset-of-groups (layout order across groups does not
/// matter for equality) but each group's internal member order does —
/// see [`ActiveTopology::topology_eq`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveTopology {
    pub groups: Vec<DeviceGroup>,
}

impl ActiveTopology {
    pub fn new(groups: Vec<DeviceGroup>) -> Self {
        Self { groups }
    }

    pub fn single(id: impl Into<DeviceId>) -> Self {
        Self { groups: vec![vec![id.into()]] }
    }

    /// All device ids referenced anywhere in the topology.
    pub fn device_ids(&self) -> HashSet<DeviceId> {
        self.groups.iter().flatten().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() || self.groups.iter().all(|g| g.is_empty())
    }

    /// Multiset-of-groups equality: each group's member order matters, but
    /// the order in which groups appear does not.
    pub fn topology_eq(&self, other: &ActiveTopology) -> bool {
        if self.groups.len() != other.groups.len() {
            return false;
        }
        let mut remaining: Vec<&DeviceGroup> = other.groups.iter().collect();
        'outer: for group in &self.groups {
            for (idx, candidate) in remaining.iter().enumerate() {
                if *candidate == group {
                    remaining.remove(idx);
                    continue 'outer;
                }
            }
            return false;
        }
        remaining.is_empty()
    }
}

/// Integer display origin in the virtual desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// How a device should be prepared relative to the rest of the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DevicePreparation {
    /// Don't change anything, just verify the current state matches.
    VerifyOnly,
    /// Ensure the device is active, alongside whatever else is active.
    EnsureActive,
    /// Ensure the device is the *only* active display.
    EnsureOnlyDisplay,
    /// Ensure the device is primary (may remain alongside others).
    EnsurePrimary,
}

/// Requested virtual-display arrangement relative to the real displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirtualDisplayLayout {
    Exclusive,
    Extended,
    ExtendedPrimary,
    ExtendedIsolated,
    ExtendedPrimaryIsolated,
}

/// Target intent for a single-display streaming session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleDisplayConfiguration {
    pub primary_device: DeviceId,
    pub desired_mode: Option<DisplayMode>,
    pub desired_hdr: Option<HdrState>,
    pub preparation: DevicePreparation,
    pub virtual_layout: Option<VirtualDisplayLayout>,
}

/// `(topology, modes, hdr_states, primary_device)` — see §3 invariant: every
/// id in `topology` must have entries in both `modes` and `hdr_states`; if
/// `primary_device` is set it must appear in `topology`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub topology: ActiveTopology,
    pub modes: BTreeMap<DeviceId, DisplayMode>,
    pub hdr_states: BTreeMap<DeviceId, HdrState>,
    pub primary_device: Option<DeviceId>,
}

impl Snapshot {
    /// Validate the §3 invariant. Production callers should not persist or
    /// apply a snapshot that fails this check.
    pub fn is_well_formed(&self) -> bool {
        let ids = self.topology.device_ids();
        for id in &ids {
            if !self.modes.contains_key(id) || !self.hdr_states.contains_key(id) {
                return false;
            }
        }
        match &self.primary_device {
            Some(primary) => ids.contains(primary),
            None => true,
        }
    }

    /// Device ids present in the snapshot but absent from `available`.
    pub fn missing_devices(&self, available: &HashSet<DeviceId>) -> Vec<DeviceId> {
        self.topology.device_ids().into_iter().filter(|id| !available.contains(id)).collect()
    }

    /// Return a copy with every device in `blacklist` removed from the
    /// topology, modes, and hdr_states maps.
    pub fn filtered(&self, blacklist: &HashSet<DeviceId>) -> Snapshot {
        let groups: Vec<DeviceGroup> = self
            .topology
            .groups
            .iter()
            .map(|g| g.iter().filter(|id| !blacklist.contains(*id)).cloned().collect::<Vec<_>>())
            .filter(|g: &DeviceGroup| !g.is_empty())
            .collect();
        let topology = ActiveTopology::new(groups);
        let ids = topology.device_ids();
        let modes = self.modes.iter().filter(|(k, _)| ids.contains(*k)).map(|(k, v)| (k.clone(), *v)).collect();
        let hdr_states =
            self.hdr_states.iter().filter(|(k, _)| ids.contains(*k)).map(|(k, v)| (k.clone(), *v)).collect();
        let primary_device = self.primary_device.clone().filter(|p| ids.contains(p));
        Snapshot { topology, modes, hdr_states, primary_device }
    }
}

/// Rolling vs. user-declared baseline snapshot tier (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotTier {
    Current,
    Previous,
    Golden,
}

impl SnapshotTier {
    pub fn file_name(&self) -> &'static str {
        match self {
            SnapshotTier::Current => "current.json",
            SnapshotTier::Previous => "previous.json",
            SnapshotTier::Golden => "golden.json",
        }
    }
}

/// Immutable-after-enqueue request to reshape the display topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub configuration: SingleDisplayConfiguration,
    pub topology_override: Option<ActiveTopology>,
    pub virtual_layout: Option<VirtualDisplayLayout>,
    pub session_fingerprint: String,
}

/// Result vocabulary every operation worker reports through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    Ok,
    Retryable,
    NeedsVirtualDisplayReset,
    InvalidRequest,
    Fatal,
}

impl ApplyStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplyStatus::InvalidRequest | ApplyStatus::Fatal)
    }
}

/// Outcome of an Apply operation (§4.4).
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub status: ApplyStatus,
    pub expected_topology: Option<ActiveTopology>,
    pub virtual_display_requested: bool,
}

impl ApplyOutcome {
    pub fn ok(expected_topology: Option<ActiveTopology>) -> Self {
        Self { status: ApplyStatus::Ok, expected_topology, virtual_display_requested: false }
    }

    pub fn fatal() -> Self {
        Self { status: ApplyStatus::Fatal, expected_topology: None, virtual_display_requested: false }
    }

    pub fn retryable() -> Self {
        Self { status: ApplyStatus::Retryable, expected_topology: None, virtual_display_requested: false }
    }

    pub fn needs_virtual_display_reset(expected_topology: Option<ActiveTopology>) -> Self {
        Self { status: ApplyStatus::NeedsVirtualDisplayReset, expected_topology, virtual_display_requested: true }
    }

    pub fn invalid_request() -> Self {
        Self { status: ApplyStatus::InvalidRequest, expected_topology: None, virtual_display_requested: false }
    }
}

/// Immutable copy of the session-visible fields staged by the deferral
/// manager (§3 Pending, §9 "pointer-to-session" re-expression).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub hdr: bool,
    pub sops: bool,
    pub virtual_display: bool,
    pub virtual_display_device_id: Option<DeviceId>,
    pub framegen_refresh_rate: Option<u32>,
    pub gen1_framegen_fix: bool,
    pub gen2_framegen_fix: bool,
}

/// The state machine's top-level state (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Waiting,
    InProgress,
    Verification,
    Recovery,
    RecoveryValidation,
    EventLoop,
}

#[cfg(test)]
#[path = "domain_tests.rs"]
mod tests;
