// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! State Machine (C10, §4.10): the single-threaded event loop tying the
//! dispatcher, policy, ports, and snapshot ledger together.
//!
//! All state mutation happens on the task that owns `StateMachine::run` —
//! no locks guard `self`. The dispatcher and every operation worker talk
//! back to this loop only by posting onto one of the two channels it
//! selects on (§5 "no component calls back into C10 synchronously").

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::clock::{CancellationSource, Clock, Generation};
use crate::dispatcher::{AsyncDispatcher, DispatchCompletion};
use crate::domain::{ActiveTopology, ApplyRequest, ApplyStatus, DeviceId, State};
use crate::message::{MessageQueue, MessageSender, DEFAULT_QUEUE_CAPACITY};
use crate::policy::{ApplyPolicy, VirtualDisplayDecision};
use crate::ports::{DetailLevel, DisplayBackend, PlatformWorkaroundsPort, ScheduledTaskPort};
use crate::snapshot::SnapshotLedger;

/// Display-topology event the host forwards in from its OS listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    Change,
}

/// Out-of-process-helper event the watchdog/heartbeat forward in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperEvent {
    HeartbeatTimeout,
}

/// Commands and external events accepted on the bounded queue (§4.10).
/// Dispatcher completions arrive on a separate unbounded channel — see
/// [`StateMachine::run`].
#[derive(Debug)]
pub enum CommandMessage {
    ApplyCommand(ApplyRequest, Generation),
    RevertCommand(Generation),
    DisarmCommand(Generation),
    ExportGoldenCommand(HashSet<DeviceId>, Generation),
    SnapshotCurrentCommand(HashSet<DeviceId>, Generation),
    DisplayEventMessage(DisplayEvent, Generation),
    HelperEventMessage(HelperEvent, Generation),
}

impl CommandMessage {
    fn generation(&self) -> Generation {
        match self {
            CommandMessage::ApplyCommand(_, g)
            | CommandMessage::RevertCommand(g)
            | CommandMessage::DisarmCommand(g)
            | CommandMessage::ExportGoldenCommand(_, g)
            | CommandMessage::SnapshotCurrentCommand(_, g)
            | CommandMessage::DisplayEventMessage(_, g)
            | CommandMessage::HelperEventMessage(_, g) => *g,
        }
    }
}

/// Observable outcomes of the event loop, consumed by whatever embeds it
/// (the host binary's IPC responder, or a test harness).
#[derive(Debug, Clone)]
pub enum Signal {
    ApplyResult(ApplyStatus),
    Exit(i32),
}

/// Handle a caller uses to submit commands/events and read the current
/// generation to stamp them with (§5: a message is dropped if its stamped
/// generation doesn't match the current one by the time it's processed).
#[derive(Clone)]
pub struct StateMachineHandle {
    command_tx: MessageSender<CommandMessage>,
    cancellation: CancellationSource,
}

impl StateMachineHandle {
    pub fn current_generation(&self) -> Generation {
        self.cancellation.current()
    }

    pub async fn send(&self, message: CommandMessage) -> Result<(), CommandMessage> {
        self.command_tx.send(message).await.map_err(|e| e.0)
    }
}

pub struct StateMachine {
    state: State,
    cancellation: CancellationSource,
    commands: MessageQueue<CommandMessage>,
    completions: UnboundedReceiver<DispatchCompletion>,
    dispatcher: AsyncDispatcher,
    ledger: Arc<SnapshotLedger>,
    backend: Arc<dyn DisplayBackend>,
    scheduled_task: Arc<dyn ScheduledTaskPort>,
    workarounds: Arc<dyn PlatformWorkaroundsPort>,
    clock: Arc<dyn Clock>,
    policy: ApplyPolicy,
    blacklist: HashSet<DeviceId>,
    signal_tx: UnboundedSender<Signal>,
    recovery_armed: bool,
    attempts: u32,
    current_request: Option<ApplyRequest>,
    expected_topology: Option<ActiveTopology>,
    last_vd_reset: Option<Instant>,
    hdr_blank_delay: std::time::Duration,
}

/// Everything the event loop needs wired in at construction. Kept as one
/// struct because `StateMachine::new` otherwise drowns in positional args.
pub struct StateMachineDeps {
    pub backend: Arc<dyn DisplayBackend>,
    pub scheduled_task: Arc<dyn ScheduledTaskPort>,
    pub workarounds: Arc<dyn PlatformWorkaroundsPort>,
    pub ledger: Arc<SnapshotLedger>,
    pub clock: Arc<dyn Clock>,
    pub policy: ApplyPolicy,
    pub blacklist: HashSet<DeviceId>,
    pub hdr_blank_delay: std::time::Duration,
}

impl StateMachine {
    /// Build a state machine plus the dispatcher it drives and the handle
    /// callers use to talk to it. Returns `(handle, signal_rx, state_machine)`
    /// — the caller spawns `state_machine.run()` and listens on `signal_rx`.
    pub fn new(
        deps: StateMachineDeps,
        dispatcher_factory: impl FnOnce(UnboundedSender<DispatchCompletion>) -> AsyncDispatcher,
    ) -> (StateMachineHandle, mpsc::UnboundedReceiver<Signal>, Self) {
        let (command_tx, commands) = MessageQueue::bounded(DEFAULT_QUEUE_CAPACITY);
        let (completion_tx, completions) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let cancellation = CancellationSource::new();
        let dispatcher = dispatcher_factory(completion_tx);

        let handle = StateMachineHandle { command_tx, cancellation: cancellation.clone() };

        let machine = Self {
            state: State::Waiting,
            cancellation,
            commands,
            completions,
            dispatcher,
            ledger: deps.ledger,
            backend: deps.backend,
            scheduled_task: deps.scheduled_task,
            workarounds: deps.workarounds,
            clock: deps.clock,
            policy: deps.policy,
            blacklist: deps.blacklist,
            signal_tx,
            recovery_armed: false,
            attempts: 0,
            current_request: None,
            expected_topology: None,
            last_vd_reset: None,
            hdr_blank_delay: deps.hdr_blank_delay,
        };

        (handle, signal_rx, machine)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn recovery_armed(&self) -> bool {
        self.recovery_armed
    }

    fn available_devices(&self) -> HashSet<DeviceId> {
        self.backend.enumerate(DetailLevel::IdsOnly).into_iter().map(|d| d.id).collect()
    }

    fn emit(&self, signal: Signal) {
        let _ = self.signal_tx.send(signal);
    }

    /// Run the event loop until the queue closes or RecoveryValidation
    /// succeeds and the process should exit (§4.10 "(terminal)").
    pub async fn run(&mut self) {
        loop {
            tokio::select! {
                biased;
                completion = self.completions.recv() => {
                    match completion {
                        Some(completion) => {
                            if !self.accept(completion.generation()) {
                                debug!(generation = completion.generation(), "dropping stale completion");
                                continue;
                            }
                            if self.handle_completion(completion).await {
                                return;
                            }
                        }
                        None => {
                            debug!("completion channel closed, stopping event loop");
                            return;
                        }
                    }
                }
                message = self.commands.wait_pop() => {
                    match message {
                        Ok(message) => {
                            if !self.accept(message.generation()) {
                                debug!(generation = message.generation(), "dropping stale message");
                                continue;
                            }
                            self.handle_command(message).await;
                        }
                        Err(err) => {
                            warn!(%err, "command queue closed, stopping event loop");
                            return;
                        }
                    }
                }
            }
        }
    }

    fn accept(&self, generation: Generation) -> bool {
        generation == self.cancellation.current()
    }

    fn begin_apply(&mut self, request: ApplyRequest) {
        self.attempts = 1;
        self.current_request = Some(request.clone());
        self.expected_topology = None;
        self.scheduled_task.create();
        let token = self.cancellation.token();
        self.dispatcher.dispatch_apply(request, token, std::time::Duration::ZERO, false);
        self.state = State::InProgress;
    }

    async fn handle_command(&mut self, message: CommandMessage) {
        match message {
            CommandMessage::ApplyCommand(request, _) => {
                if matches!(self.state, State::InProgress | State::Verification) {
                    debug!("fresh ApplyCommand supersedes in-flight apply, bumping generation");
                    self.cancellation.cancel();
                }
                self.begin_apply(request);
            }
            CommandMessage::RevertCommand(_) => {
                if matches!(self.state, State::Waiting | State::EventLoop) {
                    self.scheduled_task.delete();
                    let token = self.cancellation.token();
                    let available = self.available_devices();
                    self.dispatcher.dispatch_recovery(
                        self.ledger.clone(),
                        available,
                        self.policy.retry_delay(1),
                        token,
                    );
                    self.state = State::Recovery;
                } else {
                    debug!(state = ?self.state, "ignoring RevertCommand outside Waiting/EventLoop");
                }
            }
            CommandMessage::DisarmCommand(_) => {
                self.cancellation.cancel();
                self.scheduled_task.delete();
                self.recovery_armed = false;
                self.attempts = 0;
                self.current_request = None;
                self.expected_topology = None;
                self.state = State::Waiting;
            }
            CommandMessage::ExportGoldenCommand(blacklist, _) => {
                match self.ledger.export_golden(self.backend.as_ref(), &blacklist) {
                    Ok(_) => debug!("exported golden snapshot"),
                    Err(err) => warn!(%err, "failed to export golden snapshot"),
                }
            }
            CommandMessage::SnapshotCurrentCommand(blacklist, _) => {
                match self.ledger.snapshot_current(self.backend.as_ref(), &blacklist) {
                    Ok(_) => debug!("captured current snapshot"),
                    Err(err) => warn!(%err, "failed to capture current snapshot"),
                }
            }
            CommandMessage::DisplayEventMessage(event, _) => {
                self.maybe_trigger_recovery_from_event(format!("{event:?}"));
            }
            CommandMessage::HelperEventMessage(event, _) => {
                self.maybe_trigger_recovery_from_event(format!("{event:?}"));
            }
        }
    }

    fn maybe_trigger_recovery_from_event(&mut self, event_name: String) {
        if self.state != State::EventLoop || !self.recovery_armed {
            return;
        }
        info!(event = %event_name, "recovery-armed event triggered recovery dispatch");
        let token = self.cancellation.token();
        let available = self.available_devices();
        self.dispatcher.dispatch_recovery(self.ledger.clone(), available, self.policy.retry_delay(1), token);
        self.state = State::Recovery;
    }

    /// Returns `true` if the event loop should stop (terminal state reached).
    async fn handle_completion(&mut self, completion: DispatchCompletion) -> bool {
        match completion {
            DispatchCompletion::Apply { outcome, .. } => self.handle_apply_outcome(outcome),
            DispatchCompletion::Verification { result, .. } => self.handle_verification_result(result),
            DispatchCompletion::Recovery { outcome, .. } => self.handle_recovery_outcome(outcome),
            DispatchCompletion::RecoveryValidation { outcome, .. } => {
                return self.handle_recovery_validation_result(outcome.success);
            }
        }
        false
    }

    fn handle_apply_outcome(&mut self, outcome: crate::domain::ApplyOutcome) {
        if self.state != State::InProgress {
            return;
        }

        match outcome.status {
            ApplyStatus::Ok => {
                let Some(request) = self.current_request.clone() else {
                    warn!("apply outcome arrived with no current request, dropping");
                    return;
                };
                self.expected_topology = outcome.expected_topology;
                let token = self.cancellation.token();
                self.dispatcher.dispatch_verify(request, self.expected_topology.clone(), token);
                self.state = State::Verification;
            }
            ApplyStatus::Retryable => self.retry_or_give_up(),
            ApplyStatus::NeedsVirtualDisplayReset => {
                let now = self.clock.now();
                match self.policy.maybe_reset_virtual_display(
                    ApplyStatus::NeedsVirtualDisplayReset,
                    outcome.virtual_display_requested,
                    self.last_vd_reset,
                    now,
                ) {
                    VirtualDisplayDecision::ResetVirtualDisplay => {
                        let Some(request) = self.current_request.clone() else {
                            warn!("virtual-display reset decision arrived with no current request, dropping");
                            return;
                        };
                        self.last_vd_reset = Some(now);
                        let token = self.cancellation.token();
                        self.dispatcher.dispatch_apply(request, token, self.policy.retry_delay(self.attempts), true);
                    }
                    VirtualDisplayDecision::Proceed => self.retry_or_give_up(),
                }
            }
            ApplyStatus::InvalidRequest | ApplyStatus::Fatal => {
                self.emit(Signal::ApplyResult(outcome.status));
                self.scheduled_task.delete();
                self.state = State::Waiting;
            }
        }
    }

    fn retry_or_give_up(&mut self) {
        if self.attempts >= self.policy.max_retries {
            self.emit(Signal::ApplyResult(ApplyStatus::Retryable));
            self.scheduled_task.delete();
            self.state = State::Waiting;
            return;
        }
        let Some(request) = self.current_request.clone() else {
            warn!("retry attempted with no current request, giving up instead");
            self.emit(Signal::ApplyResult(ApplyStatus::Retryable));
            self.scheduled_task.delete();
            self.state = State::Waiting;
            return;
        };
        self.attempts += 1;
        let token = self.cancellation.token();
        self.dispatcher.dispatch_apply(request, token, self.policy.retry_delay(self.attempts), false);
    }

    fn handle_verification_result(&mut self, verified: bool) {
        if self.state != State::Verification {
            return;
        }

        if verified {
            self.workarounds.refresh_shell();
            let workarounds = self.workarounds.clone();
            let delay = self.hdr_blank_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                workarounds.blank_hdr_states(delay);
            });

            match self.ledger.snapshot_current(self.backend.as_ref(), &self.blacklist) {
                Ok(_) => debug!("post-verification snapshot captured"),
                Err(err) => warn!(%err, "post-verification snapshot capture failed"),
            }

            self.recovery_armed = true;
            self.emit(Signal::ApplyResult(ApplyStatus::Ok));
        } else {
            self.emit(Signal::ApplyResult(ApplyStatus::Retryable));
        }

        self.state = State::Waiting;
    }

    fn handle_recovery_outcome(&mut self, outcome: crate::operations::RecoveryOutcome) {
        if self.state != State::Recovery {
            return;
        }

        if let Some(winning) = outcome.success.then_some(outcome.winning_snapshot).flatten() {
            let token = self.cancellation.token();
            self.dispatcher.dispatch_recovery_validate(winning, token);
            self.state = State::RecoveryValidation;
        } else {
            self.state = State::EventLoop;
        }
    }

    fn handle_recovery_validation_result(&mut self, success: bool) -> bool {
        if self.state != State::RecoveryValidation {
            return false;
        }

        if success {
            self.emit(Signal::Exit(0));
            true
        } else {
            self.state = State::EventLoop;
            false
        }
    }
}

#[cfg(test)]
#[path = "state_machine_tests.rs"]
mod tests;
