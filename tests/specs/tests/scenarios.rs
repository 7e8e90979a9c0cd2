// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Black-box scenario tests against the real `display-helper-host` binary,
//! plus property coverage of the generation-drop and single-flight-apply
//! invariants through the public state-machine API.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use display_helper_core::clock::TokioSleeper;
use display_helper_core::dispatcher::AsyncDispatcher;
use display_helper_core::domain::ApplyStatus;
use display_helper_core::policy::ApplyPolicy;
use display_helper_core::ports::{DisplayBackend, VirtualDisplayPort};
use display_helper_core::snapshot::SnapshotLedger;
use display_helper_core::state_machine::{CommandMessage, Signal, StateMachine, StateMachineDeps};
use display_helper_core::testing::{FakeDisplayBackend, FakeScheduledTask, FakeVirtualDisplay, FakeWorkarounds, ManualClock};

use display_helper_specs::{sample_apply_request, write_apply_request, HostFixture};

fn build_machine(
    backend: Arc<FakeDisplayBackend>,
    scheduled_task: Arc<FakeScheduledTask>,
    dir: &tempfile::TempDir,
) -> (
    display_helper_core::state_machine::StateMachineHandle,
    tokio::sync::mpsc::UnboundedReceiver<Signal>,
    StateMachine,
) {
    let deps = StateMachineDeps {
        backend: backend.clone(),
        scheduled_task,
        workarounds: Arc::new(FakeWorkarounds::default()),
        ledger: Arc::new(SnapshotLedger::new(dir.path(), false)),
        clock: Arc::new(ManualClock::new()),
        policy: ApplyPolicy::default(),
        blacklist: HashSet::new(),
        hdr_blank_delay: Duration::from_millis(1000),
    };
    let backend_dyn: Arc<dyn DisplayBackend> = backend;
    let vd: Arc<dyn VirtualDisplayPort> = Arc::new(FakeVirtualDisplay::new());
    StateMachine::new(deps, move |completion_tx| {
        AsyncDispatcher::new(backend_dyn, vd, Arc::new(TokioSleeper), completion_tx, Duration::from_millis(500), Duration::from_millis(200))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Invariant 4: any message carrying a generation older than the
    /// current one is dropped without dispatching or mutating state,
    /// regardless of how far behind it is.
    #[test]
    fn generation_drop_ignores_any_staleness(stale_offset in 1u64..1000) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let backend = Arc::new(FakeDisplayBackend::new());
            let scheduled_task = Arc::new(FakeScheduledTask::default());
            let (handle, mut signals, mut machine) = build_machine(backend.clone(), scheduled_task.clone(), &dir);
            let run = tokio::spawn(async move { machine.run().await });

            let stale_generation = handle.current_generation() + stale_offset;
            handle
                .send(CommandMessage::ApplyCommand(sample_apply_request("A"), stale_generation))
                .await
                .unwrap();

            let drained = tokio::time::timeout(Duration::from_millis(150), signals.recv()).await;
            prop_assert!(drained.is_err(), "a stale-generation command must never produce a signal");
            prop_assert_eq!(backend.apply_calls.load(Ordering::SeqCst), 0);
            prop_assert_eq!(scheduled_task.create_calls.load(Ordering::SeqCst), 0);
            run.abort();
            Ok(())
        })?;
    }

    /// Invariant 5: however many duplicate ApplyCommands arrive stamped
    /// with the generation the machine was at when the first was accepted,
    /// at most one Apply ever dispatches — later sends under that same,
    /// now-superseded-on-arrival generation are no-ops.
    #[test]
    fn single_flight_apply_holds_under_repeated_sends(extra_sends in 0usize..5) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let backend = Arc::new(FakeDisplayBackend::new());
            backend.push_apply_result(ApplyStatus::Ok);
            let scheduled_task = Arc::new(FakeScheduledTask::default());
            let (handle, mut signals, mut machine) = build_machine(backend.clone(), scheduled_task, &dir);
            let run = tokio::spawn(async move { machine.run().await });

            let gen = handle.current_generation();
            for _ in 0..=extra_sends {
                handle.send(CommandMessage::ApplyCommand(sample_apply_request("A"), gen)).await.unwrap();
            }

            match signals.recv().await {
                Some(Signal::ApplyResult(ApplyStatus::Ok)) => {}
                other => panic!("expected a single ApplyResult(Ok), got {other:?}"),
            }
            prop_assert_eq!(backend.apply_calls.load(Ordering::SeqCst), 1);
            run.abort();
            Ok(())
        })?;
    }
}

// -- Black-box CLI scenarios --------------------------------------------------

#[test]
fn apply_then_disarm_roundtrip() -> anyhow::Result<()> {
    let fixture = HostFixture::new()?;
    let request_path = write_apply_request(fixture.snapshot_dir.path(), &sample_apply_request("A"))?;

    let apply = fixture.run(&["apply", "--request", request_path.to_str().unwrap()])?;
    anyhow::ensure!(apply.status.success(), "apply failed: {}", String::from_utf8_lossy(&apply.stderr));
    anyhow::ensure!(fixture.snapshot_path("current.json").exists(), "expected a Current snapshot after apply");

    let disarm = fixture.run(&["disarm"])?;
    anyhow::ensure!(disarm.status.success(), "disarm failed: {}", String::from_utf8_lossy(&disarm.stderr));
    Ok(())
}

#[test]
fn export_golden_then_snapshot_current_populate_tiers() -> anyhow::Result<()> {
    let fixture = HostFixture::new()?;

    let golden = fixture.run(&["export-golden"])?;
    anyhow::ensure!(golden.status.success(), "export-golden failed: {}", String::from_utf8_lossy(&golden.stderr));
    anyhow::ensure!(fixture.snapshot_path("golden.json").exists());

    let snapshot = fixture.run(&["snapshot-current"])?;
    anyhow::ensure!(snapshot.status.success(), "snapshot-current failed: {}", String::from_utf8_lossy(&snapshot.stderr));
    anyhow::ensure!(fixture.snapshot_path("current.json").exists());

    Ok(())
}

#[test]
fn revert_with_empty_ledger_does_not_crash() -> anyhow::Result<()> {
    let fixture = HostFixture::new()?;
    let revert = fixture.run(&["revert"])?;
    anyhow::ensure!(revert.status.success(), "revert failed: {}", String::from_utf8_lossy(&revert.stderr));
    Ok(())
}
