// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! In-memory fakes for the capability ports (§9: "tests substitute
//! in-memory fakes; production binds to OS adapters").
//!
//! Only compiled for tests (`#[cfg(test)]` within this crate) or when the
//! `testing` feature is enabled (used by the `tests/specs` crate).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::clock::{Clock, Sleeper};
use crate::domain::{ActiveTopology, ApplyStatus, DeviceId, Point, Snapshot, SingleDisplayConfiguration};
use crate::ports::{
    DetailLevel, DisplayBackend, EnumeratedDevice, EnumeratedDeviceList, PlatformWorkaroundsPort, ScheduledTaskPort,
    VirtualDisplayPort,
};
use crate::watchdog::HelperPort;

/// Clock whose `now()` is advanced manually by the test, rather than
/// tracking real wall-clock time.
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self { base: Instant::now(), offset: Mutex::new(Duration::ZERO) }
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Sleeper that returns immediately — keeps spin/retry-delay tests fast
/// without weakening the production bound logic they exercise.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSleeper;

impl Sleeper for NoopSleeper {
    fn sleep_for(&self, _duration: Duration) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(std::future::ready(()))
    }
}

/// Scripted, call-counting fake for [`DisplayBackend`].
#[derive(Default)]
pub struct FakeDisplayBackend {
    pub apply_results: Mutex<VecDeque<ApplyStatus>>,
    pub apply_calls: AtomicU32,
    pub apply_snapshot_calls: AtomicU32,
    pub configuration_matches: AtomicBool,
    pub captured_topology: Mutex<ActiveTopology>,
    pub expected_topology: Mutex<Option<ActiveTopology>>,
    pub validate_topology_result: AtomicBool,
    pub validate_topology_calls: AtomicU32,
    /// When non-empty, consumed in call order and takes precedence over
    /// `validate_topology_result` — lets tests script per-tier validation
    /// outcomes (e.g. S4's "Previous is stale").
    pub validate_topology_results: Mutex<VecDeque<bool>>,
    pub apply_snapshot_results: Mutex<VecDeque<bool>>,
    pub snapshot_matches_results: Mutex<VecDeque<bool>>,
    pub snapshot_to_capture: Mutex<Snapshot>,
    /// Device ids `enumerate()` reports present, e.g. so recovery's
    /// availability check (§4.7) sees the devices a scripted snapshot needs.
    pub enumerated_devices: Mutex<Vec<DeviceId>>,
}

impl FakeDisplayBackend {
    pub fn new() -> Self {
        let mut s = Self::default();
        s.validate_topology_result = AtomicBool::new(true);
        s.configuration_matches = AtomicBool::new(true);
        s
    }

    pub fn push_apply_result(&self, status: ApplyStatus) {
        self.apply_results.lock().unwrap_or_else(|e| e.into_inner()).push_back(status);
    }

    pub fn push_validate_topology_result(&self, ok: bool) {
        self.validate_topology_results.lock().unwrap_or_else(|e| e.into_inner()).push_back(ok);
    }

    pub fn push_apply_snapshot_result(&self, ok: bool) {
        self.apply_snapshot_results.lock().unwrap_or_else(|e| e.into_inner()).push_back(ok);
    }

    pub fn push_snapshot_matches_result(&self, ok: bool) {
        self.snapshot_matches_results.lock().unwrap_or_else(|e| e.into_inner()).push_back(ok);
    }

    pub fn set_enumerated_devices(&self, ids: impl IntoIterator<Item = DeviceId>) {
        *self.enumerated_devices.lock().unwrap_or_else(|e| e.into_inner()) = ids.into_iter().collect();
    }
}

impl DisplayBackend for FakeDisplayBackend {
    fn apply(&self, _config: &SingleDisplayConfiguration) -> ApplyStatus {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_results.lock().unwrap_or_else(|e| e.into_inner()).pop_front().unwrap_or(ApplyStatus::Ok)
    }

    fn apply_topology(&self, _topology: &ActiveTopology) -> ApplyStatus {
        ApplyStatus::Ok
    }

    fn enumerate(&self, _detail: DetailLevel) -> EnumeratedDeviceList {
        self.enumerated_devices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|id| EnumeratedDevice { id: id.clone(), friendly_name: None })
            .collect()
    }

    fn capture_topology(&self) -> ActiveTopology {
        self.captured_topology.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn validate_topology(&self, _topology: &ActiveTopology) -> bool {
        self.validate_topology_calls.fetch_add(1, Ordering::SeqCst);
        let mut queued = self.validate_topology_results.lock().unwrap_or_else(|e| e.into_inner());
        queued.pop_front().unwrap_or_else(|| self.validate_topology_result.load(Ordering::SeqCst))
    }

    fn capture_snapshot(&self) -> Snapshot {
        self.snapshot_to_capture.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn apply_snapshot(&self, _snapshot: &Snapshot) -> bool {
        self.apply_snapshot_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_snapshot_results.lock().unwrap_or_else(|e| e.into_inner()).pop_front().unwrap_or(true)
    }

    fn snapshot_matches_current(&self, _snapshot: &Snapshot) -> bool {
        self.snapshot_matches_results.lock().unwrap_or_else(|e| e.into_inner()).pop_front().unwrap_or(true)
    }

    fn configuration_matches(&self, _config: &SingleDisplayConfiguration) -> bool {
        self.configuration_matches.load(Ordering::SeqCst)
    }

    fn set_display_origin(&self, _device_id: &DeviceId, _point: Point) -> bool {
        true
    }

    fn compute_expected_topology(
        &self,
        _config: &SingleDisplayConfiguration,
        override_topology: Option<&ActiveTopology>,
    ) -> Option<ActiveTopology> {
        if let Some(ovr) = override_topology {
            return Some(ovr.clone());
        }
        self.expected_topology.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Call-counting fake for [`VirtualDisplayPort`].
#[derive(Default)]
pub struct FakeVirtualDisplay {
    pub enable_calls: AtomicU32,
    pub disable_calls: AtomicU32,
    pub enable_result: AtomicBool,
    pub disable_result: AtomicBool,
    pub available: AtomicBool,
    pub id: Mutex<Option<DeviceId>>,
}

impl FakeVirtualDisplay {
    pub fn new() -> Self {
        Self {
            enable_calls: AtomicU32::new(0),
            disable_calls: AtomicU32::new(0),
            enable_result: AtomicBool::new(true),
            disable_result: AtomicBool::new(true),
            available: AtomicBool::new(true),
            id: Mutex::new(Some("VIRTUAL".to_string())),
        }
    }
}

impl VirtualDisplayPort for FakeVirtualDisplay {
    fn enable(&self) -> bool {
        self.enable_calls.fetch_add(1, Ordering::SeqCst);
        self.enable_result.load(Ordering::SeqCst)
    }

    fn disable(&self) -> bool {
        self.disable_calls.fetch_add(1, Ordering::SeqCst);
        self.disable_result.load(Ordering::SeqCst)
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn device_id(&self) -> Option<DeviceId> {
        self.id.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Call-counting fake for [`PlatformWorkaroundsPort`].
#[derive(Default)]
pub struct FakeWorkarounds {
    pub blank_calls: AtomicU32,
    pub refresh_calls: AtomicU32,
}

impl PlatformWorkaroundsPort for FakeWorkarounds {
    fn blank_hdr_states(&self, _settle: Duration) {
        self.blank_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn refresh_shell(&self) {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory fake for [`ScheduledTaskPort`].
#[derive(Default)]
pub struct FakeScheduledTask {
    pub present: AtomicBool,
    pub create_calls: AtomicU32,
    pub delete_calls: AtomicU32,
}

impl ScheduledTaskPort for FakeScheduledTask {
    fn create(&self) -> bool {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.present.store(true, Ordering::SeqCst);
        true
    }

    fn delete(&self) -> bool {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.present.store(false, Ordering::SeqCst);
        true
    }

    fn is_present(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }
}

/// Scripted fake for [`HelperPort`].
#[derive(Default)]
pub struct FakeHelper {
    pub ping_results: Mutex<VecDeque<bool>>,
    pub ensure_calls: AtomicU32,
    pub ping_calls: AtomicU32,
    pub reset_calls: AtomicU32,
}

impl FakeHelper {
    pub fn push_ping_result(&self, ok: bool) {
        self.ping_results.lock().unwrap_or_else(|e| e.into_inner()).push_back(ok);
    }
}

impl HelperPort for FakeHelper {
    fn ensure_started(&self) -> bool {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn ping(&self) -> bool {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        self.ping_results.lock().unwrap_or_else(|e| e.into_inner()).pop_front().unwrap_or(true)
    }

    fn reset_connection(&self) {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Lets tests keep an `Arc<FakeHelper>` for inspection while handing the
/// watchdog a `Box<dyn HelperPort>` over the same shared instance.
impl HelperPort for std::sync::Arc<FakeHelper> {
    fn ensure_started(&self) -> bool {
        FakeHelper::ensure_started(self)
    }

    fn ping(&self) -> bool {
        FakeHelper::ping(self)
    }

    fn reset_connection(&self) {
        FakeHelper::reset_connection(self)
    }
}
