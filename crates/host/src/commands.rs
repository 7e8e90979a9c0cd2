// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Thin adapters from the CLI surface onto `core`'s state machine and
//! snapshot ledger. No settings UI, no HTTP — manual invocation and the
//! scheduled-task revert entry point are the only callers in production.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use display_helper_core::clock::TokioSleeper;
use display_helper_core::config::Config as CoreConfig;
use display_helper_core::dispatcher::AsyncDispatcher;
use display_helper_core::domain::ApplyRequest;
use display_helper_core::ipc::{read_framed, write_framed, HelperRequest, HelperResponse};
use display_helper_core::snapshot::SnapshotLedger;
use display_helper_core::state_machine::{CommandMessage, Signal, StateMachine, StateMachineDeps};

use crate::adapters::{StubDisplayBackend, StubScheduledTask, StubVirtualDisplay, StubWorkarounds};

/// How long a one-shot `apply`/`revert` CLI invocation waits for a
/// terminal signal before giving up and reporting "still in progress".
const ONE_SHOT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_deps(core_config: &CoreConfig, snapshot_dir: &Path) -> StateMachineDeps {
    StateMachineDeps {
        backend: Arc::new(StubDisplayBackend),
        scheduled_task: Arc::new(StubScheduledTask),
        workarounds: Arc::new(StubWorkarounds),
        ledger: Arc::new(SnapshotLedger::new(snapshot_dir, core_config.prefer_golden_first)),
        clock: Arc::new(display_helper_core::clock::SystemClock),
        policy: core_config.apply_policy(),
        blacklist: HashSet::new(),
        hdr_blank_delay: Duration::from_millis(1000),
    }
}

fn spawn_state_machine(
    core_config: &CoreConfig,
    snapshot_dir: &Path,
) -> (
    display_helper_core::state_machine::StateMachineHandle,
    tokio::sync::mpsc::UnboundedReceiver<Signal>,
    tokio::task::JoinHandle<()>,
) {
    let deps = build_deps(core_config, snapshot_dir);
    let verification_spin = core_config.verification_spin_bound();
    let backend = deps.backend.clone();
    let virtual_display: Arc<dyn display_helper_core::ports::VirtualDisplayPort> = Arc::new(StubVirtualDisplay);

    let (handle, signal_rx, mut machine) = StateMachine::new(deps, move |completion_tx| {
        AsyncDispatcher::new(
            backend,
            virtual_display,
            Arc::new(TokioSleeper),
            completion_tx,
            verification_spin,
            Duration::from_millis(500),
        )
    });

    let join = tokio::spawn(async move { machine.run().await });
    (handle, signal_rx, join)
}

pub async fn apply(core_config: &CoreConfig, snapshot_dir: &Path, request: ApplyRequest) -> anyhow::Result<()> {
    let (handle, mut signal_rx, join) = spawn_state_machine(core_config, snapshot_dir);
    let generation = handle.current_generation();

    handle
        .send(CommandMessage::ApplyCommand(request, generation))
        .await
        .map_err(|_| anyhow::anyhow!("state machine command queue closed"))?;

    match tokio::time::timeout(ONE_SHOT_TIMEOUT, signal_rx.recv()).await {
        Ok(Some(Signal::ApplyResult(status))) => info!(?status, "apply finished"),
        Ok(Some(Signal::Exit(code))) => info!(code, "apply triggered an unexpected exit"),
        Ok(None) => warn!("signal channel closed before apply completed"),
        Err(_) => warn!("apply did not reach a terminal result within {ONE_SHOT_TIMEOUT:?}"),
    }

    join.abort();
    Ok(())
}

pub async fn revert(core_config: &CoreConfig, snapshot_dir: &Path) -> anyhow::Result<()> {
    let (handle, mut signal_rx, join) = spawn_state_machine(core_config, snapshot_dir);
    let generation = handle.current_generation();

    handle
        .send(CommandMessage::RevertCommand(generation))
        .await
        .map_err(|_| anyhow::anyhow!("state machine command queue closed"))?;

    match tokio::time::timeout(ONE_SHOT_TIMEOUT, signal_rx.recv()).await {
        Ok(Some(Signal::Exit(code))) => info!(code, "recovery validated, exiting"),
        Ok(Some(Signal::ApplyResult(status))) => info!(?status, "unexpected apply result during revert"),
        Ok(None) => warn!("signal channel closed before recovery completed"),
        Err(_) => warn!("recovery did not converge within {ONE_SHOT_TIMEOUT:?}; armed for retry on the next event"),
    }

    join.abort();
    Ok(())
}

pub async fn disarm(core_config: &CoreConfig, snapshot_dir: &Path) -> anyhow::Result<()> {
    let (handle, _signal_rx, join) = spawn_state_machine(core_config, snapshot_dir);
    let generation = handle.current_generation();

    handle
        .send(CommandMessage::DisarmCommand(generation))
        .await
        .map_err(|_| anyhow::anyhow!("state machine command queue closed"))?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    join.abort();
    Ok(())
}

pub fn export_golden(core_config: &CoreConfig, snapshot_dir: &Path, blacklist: HashSet<String>) -> anyhow::Result<()> {
    let backend = StubDisplayBackend;
    let ledger = SnapshotLedger::new(snapshot_dir, core_config.prefer_golden_first);
    ledger.export_golden(&backend, &blacklist)?;
    info!("exported golden snapshot");
    Ok(())
}

pub fn snapshot_current(
    core_config: &CoreConfig,
    snapshot_dir: &Path,
    blacklist: HashSet<String>,
) -> anyhow::Result<()> {
    let backend = StubDisplayBackend;
    let ledger = SnapshotLedger::new(snapshot_dir, core_config.prefer_golden_first);
    ledger.snapshot_current(&backend, &blacklist)?;
    info!("captured current snapshot");
    Ok(())
}

/// Run the state machine's event loop, reading [`HelperRequest`] frames off
/// stdin and writing [`HelperResponse`] frames to stdout — the host's stand-in
/// for the named-pipe transport described in the design (stdio keeps this
/// runnable without a platform-specific pipe implementation).
pub async fn serve(core_config: &CoreConfig, snapshot_dir: &Path) -> anyhow::Result<()> {
    let (handle, mut signal_rx, join) = spawn_state_machine(core_config, snapshot_dir);

    tokio::spawn(async move {
        while let Some(signal) = signal_rx.recv().await {
            match signal {
                Signal::ApplyResult(status) => info!(?status, "apply result"),
                Signal::Exit(code) => {
                    info!(code, "state machine reached a terminal state, exiting");
                    std::process::exit(code);
                }
            }
        }
    });

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();

    loop {
        let request: HelperRequest = match read_framed(&mut stdin).await {
            Ok(request) => request,
            Err(err) => {
                info!(%err, "helper pipe closed, stopping serve loop");
                break;
            }
        };

        let generation = handle.current_generation();
        let command = match request {
            HelperRequest::Ping => None,
            HelperRequest::Apply(req) => Some(CommandMessage::ApplyCommand(req, generation)),
            HelperRequest::Revert => Some(CommandMessage::RevertCommand(generation)),
            HelperRequest::ExportGolden(devices) => Some(CommandMessage::ExportGoldenCommand(devices, generation)),
            HelperRequest::SnapshotCurrent(devices) => {
                Some(CommandMessage::SnapshotCurrentCommand(devices, generation))
            }
        };

        if let Some(command) = command {
            if handle.send(command).await.is_err() {
                error!("state machine command queue closed");
                break;
            }
        }

        write_framed(&mut stdout, &HelperResponse::Ack).await?;
    }

    join.abort();
    Ok(())
}
