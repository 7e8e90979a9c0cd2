// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use crate::domain::{ActiveTopology, ApplyStatus, DeviceId, Point, Snapshot, SingleDisplayConfiguration};

/// How much detail an [`DisplayBackend::enumerate`] call should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    /// Device ids only.
    IdsOnly,
    /// Ids plus supported modes and current HDR capability.
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumeratedDevice {
    pub id: DeviceId,
    pub friendly_name: Option<String>,
}

pub type EnumeratedDeviceList = Vec<EnumeratedDevice>;

/// Abstract interface to OS display configuration (C2, §4.2).
///
/// All methods are synchronous from the caller's point of view (operations
/// call these directly; any blocking happens on the dispatcher's worker
/// thread, never on the state-machine thread — see §5).
pub trait DisplayBackend: Send + Sync {
    fn apply(&self, config: &SingleDisplayConfiguration) -> ApplyStatus;

    fn apply_topology(&self, topology: &ActiveTopology) -> ApplyStatus;

    fn enumerate(&self, detail: DetailLevel) -> EnumeratedDeviceList;

    fn capture_topology(&self) -> ActiveTopology;

    fn validate_topology(&self, topology: &ActiveTopology) -> bool;

    fn capture_snapshot(&self) -> Snapshot;

    fn apply_snapshot(&self, snapshot: &Snapshot) -> bool;

    fn snapshot_matches_current(&self, snapshot: &Snapshot) -> bool;

    fn configuration_matches(&self, config: &SingleDisplayConfiguration) -> bool;

    fn set_display_origin(&self, device_id: &DeviceId, point: Point) -> bool;

    fn compute_expected_topology(
        &self,
        config: &SingleDisplayConfiguration,
        override_topology: Option<&ActiveTopology>,
    ) -> Option<ActiveTopology>;

    fn is_topology_same(&self, a: &ActiveTopology, b: &ActiveTopology) -> bool {
        a.topology_eq(b)
    }
}
