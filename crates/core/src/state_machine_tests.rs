// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use super::*;
use crate::clock::TokioSleeper;
use crate::domain::{
    ActiveTopology, DevicePreparation, DisplayMode, HdrState, Snapshot, SnapshotTier,
    SingleDisplayConfiguration,
};
use crate::policy::ApplyPolicy;
use crate::testing::{FakeDisplayBackend, FakeScheduledTask, FakeVirtualDisplay, FakeWorkarounds, ManualClock};

fn sample_request() -> ApplyRequest {
    ApplyRequest {
        configuration: SingleDisplayConfiguration {
            primary_device: "A".to_string(),
            desired_mode: None,
            desired_hdr: None,
            preparation: DevicePreparation::EnsureOnlyDisplay,
            virtual_layout: None,
        },
        topology_override: None,
        virtual_layout: None,
        session_fingerprint: "sess-1".to_string(),
    }
}

fn snapshot_for(id: &str) -> Snapshot {
    let mut modes = BTreeMap::new();
    modes.insert(id.to_string(), DisplayMode::whole_hz(1920, 1080, 60));
    let mut hdr_states = BTreeMap::new();
    hdr_states.insert(id.to_string(), HdrState::Disabled);
    Snapshot { topology: ActiveTopology::single(id), modes, hdr_states, primary_device: Some(id.to_string()) }
}

struct Harness {
    backend: Arc<FakeDisplayBackend>,
    vd: Arc<FakeVirtualDisplay>,
    workarounds: Arc<FakeWorkarounds>,
    scheduled_task: Arc<FakeScheduledTask>,
    ledger: Arc<SnapshotLedger>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempdir().expect("tempdir");
        Self {
            backend: Arc::new(FakeDisplayBackend::new()),
            vd: Arc::new(FakeVirtualDisplay::new()),
            workarounds: Arc::new(FakeWorkarounds::default()),
            scheduled_task: Arc::new(FakeScheduledTask::default()),
            ledger: Arc::new(SnapshotLedger::new(dir.path(), false)),
            _dir: dir,
        }
    }

    fn build(&self) -> (StateMachineHandle, tokio::sync::mpsc::UnboundedReceiver<Signal>, StateMachine) {
        let deps = StateMachineDeps {
            backend: self.backend.clone(),
            scheduled_task: self.scheduled_task.clone(),
            workarounds: self.workarounds.clone(),
            ledger: self.ledger.clone(),
            clock: Arc::new(ManualClock::new()),
            policy: ApplyPolicy::default(),
            blacklist: HashSet::new(),
            hdr_blank_delay: Duration::from_millis(1000),
        };
        let backend: Arc<dyn DisplayBackend> = self.backend.clone();
        let vd: Arc<dyn crate::ports::VirtualDisplayPort> = self.vd.clone();
        StateMachine::new(deps, move |completion_tx| {
            AsyncDispatcher::new(backend, vd, Arc::new(TokioSleeper), completion_tx, Duration::from_millis(500), Duration::from_millis(200))
        })
    }
}

#[tokio::test(start_paused = true)]
async fn s1_apply_ok_verify_true_arms_recovery() {
    let harness = Harness::new();
    harness.backend.push_apply_result(ApplyStatus::Ok);
    let (handle, mut signals, mut machine) = harness.build();
    let run = tokio::spawn(async move { machine.run().await });

    let gen = handle.current_generation();
    handle.send(CommandMessage::ApplyCommand(sample_request(), gen)).await.expect("send apply");

    match signals.recv().await {
        Some(Signal::ApplyResult(ApplyStatus::Ok)) => {}
        other => panic!("expected ApplyResult(Ok), got {other:?}"),
    }

    assert_eq!(harness.scheduled_task.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.workarounds.refresh_calls.load(Ordering::SeqCst), 1);

    // blank_hdr_states runs on a delayed fire-and-forget task.
    tokio::time::advance(Duration::from_millis(1100)).await;
    tokio::task::yield_now().await;
    assert_eq!(harness.workarounds.blank_calls.load(Ordering::SeqCst), 1);

    assert!(harness.ledger.is_present(SnapshotTier::Current));

    run.abort();
}

#[tokio::test(start_paused = true)]
async fn s2_retryable_three_times_ends_waiting_not_armed() {
    let harness = Harness::new();
    for _ in 0..3 {
        harness.backend.push_apply_result(ApplyStatus::Retryable);
    }
    let (handle, mut signals, mut machine) = harness.build();
    let run = tokio::spawn(async move { machine.run().await });

    let gen = handle.current_generation();
    handle.send(CommandMessage::ApplyCommand(sample_request(), gen)).await.expect("send apply");

    match signals.recv().await {
        Some(Signal::ApplyResult(ApplyStatus::Retryable)) => {}
        other => panic!("expected ApplyResult(Retryable), got {other:?}"),
    }

    assert_eq!(harness.backend.apply_calls.load(Ordering::SeqCst), 3);
    run.abort();
}

#[tokio::test(start_paused = true)]
async fn s3_vd_reset_sequence_then_ok() {
    let harness = Harness::new();
    harness.backend.push_apply_result(ApplyStatus::NeedsVirtualDisplayReset);
    harness.backend.push_apply_result(ApplyStatus::Ok);
    let (handle, mut signals, mut machine) = harness.build();
    let run = tokio::spawn(async move { machine.run().await });

    let gen = handle.current_generation();
    handle.send(CommandMessage::ApplyCommand(sample_request(), gen)).await.expect("send apply");

    match signals.recv().await {
        Some(Signal::ApplyResult(ApplyStatus::Ok)) => {}
        other => panic!("expected ApplyResult(Ok), got {other:?}"),
    }

    assert_eq!(harness.vd.disable_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.vd.enable_calls.load(Ordering::SeqCst), 1);
    run.abort();
}

#[tokio::test(start_paused = true)]
async fn s4_revert_recovery_succeeds_then_exits() {
    let harness = Harness::new();
    harness.backend.set_enumerated_devices(["current".to_string(), "previous".to_string()]);

    // Recovery order here is [Current, Previous, Golden]. Current is stale
    // (rejected at validate_topology); Previous is the tier that actually
    // wins, but only after one failed match retries into a second.
    harness
        .ledger
        .save(SnapshotTier::Current, &snapshot_for("current"), &HashSet::new())
        .expect("save current");
    harness
        .ledger
        .save(SnapshotTier::Previous, &snapshot_for("previous"), &HashSet::new())
        .expect("save previous");
    harness.backend.push_validate_topology_result(false); // Current: stale
    harness.backend.push_validate_topology_result(true); // Previous: accepted
    harness.backend.push_snapshot_matches_result(false); // Previous attempt 1
    harness.backend.push_snapshot_matches_result(true); // Previous attempt 2

    let (handle, mut signals, mut machine) = harness.build();
    let run = tokio::spawn(async move { machine.run().await });

    let gen = handle.current_generation();
    handle.send(CommandMessage::RevertCommand(gen)).await.expect("send revert");

    match signals.recv().await {
        Some(Signal::Exit(0)) => {}
        other => panic!("expected Exit(0), got {other:?}"),
    }

    assert_eq!(harness.backend.apply_snapshot_calls.load(Ordering::SeqCst), 2);
    run.abort();
}

#[tokio::test(start_paused = true)]
async fn s5_recovery_failure_rearms_on_display_event() {
    let harness = Harness::new();
    harness.backend.set_enumerated_devices(["current".to_string()]);
    // A Current tier exists but every attempt to validate it fails, so each
    // Recovery dispatch rejects it (and Previous/Golden are never saved),
    // landing back in EventLoop without ever reaching apply_snapshot.
    harness
        .ledger
        .save(SnapshotTier::Current, &snapshot_for("current"), &HashSet::new())
        .expect("save current");
    harness.backend.push_validate_topology_result(false);
    harness.backend.push_validate_topology_result(false);
    harness.backend.push_apply_result(ApplyStatus::Ok);
    let (handle, mut signals, mut machine) = harness.build();
    let run = tokio::spawn(async move { machine.run().await });

    let gen = handle.current_generation();
    handle.send(CommandMessage::ApplyCommand(sample_request(), gen)).await.expect("send apply");
    match signals.recv().await {
        Some(Signal::ApplyResult(ApplyStatus::Ok)) => {}
        other => panic!("expected ApplyResult(Ok) to arm recovery, got {other:?}"),
    }

    let gen = handle.current_generation();
    handle.send(CommandMessage::RevertCommand(gen)).await.expect("send revert");
    tokio::time::sleep(Duration::from_millis(50)).await;
    tokio::task::yield_now().await;

    // Recovery rejected the only saved tier and landed in EventLoop with the
    // armed flag intact; a DisplayEvent now re-triggers a fresh recovery
    // dispatch, observed as a second validate_topology call.
    let calls_before = harness.backend.validate_topology_calls.load(Ordering::SeqCst);
    assert_eq!(calls_before, 1, "first Revert should have checked the Current tier once");

    let gen = handle.current_generation();
    handle
        .send(CommandMessage::DisplayEventMessage(DisplayEvent::Change, gen))
        .await
        .expect("send display event");
    tokio::time::sleep(Duration::from_millis(50)).await;
    tokio::task::yield_now().await;
    let calls_after = harness.backend.validate_topology_calls.load(Ordering::SeqCst);
    assert_eq!(calls_after, 2, "the display event must have driven a second recovery dispatch");

    run.abort();
}

#[tokio::test(start_paused = true)]
async fn s6_disarm_cancels_in_flight_apply() {
    let harness = Harness::new();
    // Never resolves before Disarm: apply_results queue stays empty, so the
    // fake's default (Ok) would fire immediately — instead push a status
    // that keeps the cycle going long enough for Disarm to race ahead via a
    // retry delay.
    harness.backend.push_apply_result(ApplyStatus::Retryable);
    let (handle, mut signals, mut machine) = harness.build();
    let run = tokio::spawn(async move { machine.run().await });

    let apply_gen = handle.current_generation();
    handle.send(CommandMessage::ApplyCommand(sample_request(), apply_gen)).await.expect("send apply");

    // Give the dispatcher a tick to move into InProgress before disarming.
    tokio::task::yield_now().await;

    let disarm_gen = handle.current_generation();
    handle.send(CommandMessage::DisarmCommand(disarm_gen)).await.expect("send disarm");

    // Drain the signal channel briefly: Disarm itself emits no signal, and
    // the stale ApplyOutcome for the old generation must be dropped silently.
    let drained = tokio::time::timeout(Duration::from_millis(500), signals.recv()).await;
    assert!(drained.is_err() || drained.unwrap().is_none(), "no signal should be emitted after Disarm");

    assert_eq!(harness.scheduled_task.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.scheduled_task.delete_calls.load(Ordering::SeqCst), 1);
    run.abort();
}

#[tokio::test(start_paused = true)]
async fn stale_generation_message_is_dropped_without_dispatch() {
    let harness = Harness::new();
    let (handle, mut signals, mut machine) = harness.build();
    let run = tokio::spawn(async move { machine.run().await });

    let stale_generation = handle.current_generation() + 1;
    handle
        .send(CommandMessage::ApplyCommand(sample_request(), stale_generation))
        .await
        .expect("send apply");

    let drained = tokio::time::timeout(Duration::from_millis(200), signals.recv()).await;
    assert!(drained.is_err(), "a stale-generation command must never produce a signal");
    assert_eq!(harness.backend.apply_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.scheduled_task.create_calls.load(Ordering::SeqCst), 0);

    run.abort();
}

#[tokio::test(start_paused = true)]
async fn single_flight_apply_never_double_dispatches() {
    let harness = Harness::new();
    harness.backend.push_apply_result(ApplyStatus::Ok);
    let (handle, mut signals, mut machine) = harness.build();
    let run = tokio::spawn(async move { machine.run().await });

    let gen = handle.current_generation();
    handle.send(CommandMessage::ApplyCommand(sample_request(), gen)).await.expect("send apply");

    // A second ApplyCommand under the *same* (now stale-at-arrival)
    // generation must be dropped, never adding a second outstanding Apply.
    handle.send(CommandMessage::ApplyCommand(sample_request(), gen)).await.expect("send apply 2");

    match signals.recv().await {
        Some(Signal::ApplyResult(ApplyStatus::Ok)) => {}
        other => panic!("expected a single ApplyResult(Ok), got {other:?}"),
    }

    assert_eq!(harness.backend.apply_calls.load(Ordering::SeqCst), 1);
    run.abort();
}
