// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Process-level stand-ins for the OS-backed ports (external collaborators,
//! out of scope per the design). Each stub reports benign, side-effect-free
//! outcomes so `core`'s sequencing can run end to end without a real
//! display driver, scheduled-task API, or helper process bound in.

use std::time::Duration;

use tracing::debug;

use display_helper_core::domain::{
    ActiveTopology, ApplyStatus, DeviceId, Point, Snapshot, SingleDisplayConfiguration,
};
use display_helper_core::ports::{
    DetailLevel, DisplayBackend, EnumeratedDeviceList, PlatformWorkaroundsPort, ScheduledTaskPort,
    VirtualDisplayPort,
};
use display_helper_core::watchdog::HelperPort;

#[derive(Debug, Default)]
pub struct StubDisplayBackend;

impl DisplayBackend for StubDisplayBackend {
    fn apply(&self, _config: &SingleDisplayConfiguration) -> ApplyStatus {
        debug!("stub display backend: apply() reporting Ok, no OS adapter wired");
        ApplyStatus::Ok
    }

    fn apply_topology(&self, _topology: &ActiveTopology) -> ApplyStatus {
        ApplyStatus::Ok
    }

    fn enumerate(&self, _detail: DetailLevel) -> EnumeratedDeviceList {
        Vec::new()
    }

    fn capture_topology(&self) -> ActiveTopology {
        ActiveTopology::default()
    }

    fn validate_topology(&self, _topology: &ActiveTopology) -> bool {
        true
    }

    fn capture_snapshot(&self) -> Snapshot {
        Snapshot::default()
    }

    fn apply_snapshot(&self, _snapshot: &Snapshot) -> bool {
        true
    }

    fn snapshot_matches_current(&self, _snapshot: &Snapshot) -> bool {
        true
    }

    fn configuration_matches(&self, _config: &SingleDisplayConfiguration) -> bool {
        true
    }

    fn set_display_origin(&self, _device_id: &DeviceId, _point: Point) -> bool {
        true
    }

    fn compute_expected_topology(
        &self,
        _config: &SingleDisplayConfiguration,
        override_topology: Option<&ActiveTopology>,
    ) -> Option<ActiveTopology> {
        override_topology.cloned()
    }
}

#[derive(Debug, Default)]
pub struct StubVirtualDisplay;

impl VirtualDisplayPort for StubVirtualDisplay {
    fn enable(&self) -> bool {
        true
    }

    fn disable(&self) -> bool {
        true
    }

    fn is_available(&self) -> bool {
        false
    }

    fn device_id(&self) -> Option<DeviceId> {
        None
    }
}

#[derive(Debug, Default)]
pub struct StubWorkarounds;

impl PlatformWorkaroundsPort for StubWorkarounds {
    fn blank_hdr_states(&self, _settle: Duration) {
        debug!("stub workarounds: blank_hdr_states no-op");
    }

    fn refresh_shell(&self) {
        debug!("stub workarounds: refresh_shell no-op");
    }
}

#[derive(Debug, Default)]
pub struct StubScheduledTask;

impl ScheduledTaskPort for StubScheduledTask {
    fn create(&self) -> bool {
        true
    }

    fn delete(&self) -> bool {
        true
    }

    fn is_present(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct StubHelper;

impl HelperPort for StubHelper {
    fn ensure_started(&self) -> bool {
        true
    }

    fn ping(&self) -> bool {
        true
    }

    fn reset_connection(&self) {}
}
