//! VM controller - Periodic probing, debounced state reconciliation and lifecycle commands
//!
//! A single controller task owns the runtime state and the confirm timer.
//! Everything else talks to it through [`VmController`], which sends
//! messages over a channel and reads the published [`StatusSnapshot`].
//! Commands and probes run on the blocking pool and report back over the
//! same channel, so results are applied in the order they complete.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::command::CommandRunner;
use super::containers::{self, ContainerName};
use super::locator::ExecutableLocator;
use super::probe::{self, ProbeResult};
use super::settings::Settings;
use super::status::{RuntimeState, StateTransition, StatusSnapshot};
use super::timer::ConfirmTimer;

/// Capacity of the transition event channel
const TRANSITION_CAPACITY: usize = 32;

/// Timing knobs for the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerTimings {
    /// Interval between periodic probes
    pub poll_interval: Duration,
    /// How long a positive reading must hold before the VM counts as running
    pub confirm_delay: Duration,
    /// Delay between a start/stop command and its follow-up probe
    pub follow_up_delay: Duration,
}

impl Default for ControllerTimings {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for ControllerTimings {
    fn from(settings: &Settings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            confirm_delay: settings.confirm_delay(),
            follow_up_delay: settings.follow_up_delay(),
        }
    }
}

/// Lifecycle command sent to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MachineCommand {
    Start,
    Stop,
}

impl MachineCommand {
    fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }

    fn args(self) -> [&'static str; 2] {
        ["machine", self.name()]
    }
}

#[derive(Debug)]
enum ControlMessage {
    /// Probe right away, outside the periodic schedule
    CheckNow,
    /// Issue a lifecycle command and schedule a follow-up probe
    Machine(MachineCommand),
    /// A probe finished on the blocking pool
    ProbeCompleted(ProbeResult),
    /// The confirm timer armed with this generation fired
    Confirm { generation: u64 },
    Shutdown,
}

/// Handle to the controller task
pub struct VmController {
    tx: mpsc::UnboundedSender<ControlMessage>,
    status: watch::Receiver<StatusSnapshot>,
    transitions: broadcast::Sender<StateTransition>,
    runner: Arc<dyn CommandRunner>,
    executable: Arc<PathBuf>,
    task: Option<JoinHandle<()>>,
}

impl VmController {
    /// Resolve the executable once, then start the controller.
    /// Must be called from within a tokio runtime.
    pub async fn initialize(settings: &Settings, runner: Arc<dyn CommandRunner>) -> Self {
        let locator = ExecutableLocator::from_settings(settings);
        let fallback = locator.fallback().clone();
        let lookup_runner = Arc::clone(&runner);
        let executable =
            match tokio::task::spawn_blocking(move || locator.resolve(lookup_runner.as_ref()))
                .await
            {
                Ok(path) => path,
                Err(e) => {
                    error!("Executable lookup task failed: {}", e);
                    fallback
                }
            };

        Self::spawn(runner, executable, ControllerTimings::from(settings))
    }

    /// Start the controller task for an already resolved executable.
    /// The first probe runs immediately.
    pub fn spawn(
        runner: Arc<dyn CommandRunner>,
        executable: PathBuf,
        timings: ControllerTimings,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(StatusSnapshot::new(RuntimeState::Unknown));
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        let executable = Arc::new(executable);

        let task = ControllerTask {
            tx: tx.clone(),
            runner: Arc::clone(&runner),
            executable: Arc::clone(&executable),
            timings,
            state: RuntimeState::Unknown,
            confirm: ConfirmTimer::new(),
            background: JoinSet::new(),
            status_tx,
            transitions: transitions.clone(),
        };

        info!(
            "Watching {} every {:?}",
            executable.display(),
            timings.poll_interval
        );

        Self {
            tx,
            status,
            transitions,
            runner,
            executable,
            task: Some(tokio::spawn(task.run(rx))),
        }
    }

    /// Current reconciled state
    pub fn current_state(&self) -> RuntimeState {
        self.status.borrow().state
    }

    /// Receiver that always holds the latest snapshot; `changed()` wakes on
    /// every state change
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    /// Stream of individual state changes
    pub fn transitions(&self) -> broadcast::Receiver<StateTransition> {
        self.transitions.subscribe()
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Names of running containers. Empty unless the VM is confirmed running;
    /// no command is issued in that case.
    pub async fn list_containers(&self) -> Vec<ContainerName> {
        if !self.current_state().is_running() {
            return Vec::new();
        }

        let runner = Arc::clone(&self.runner);
        let executable = Arc::clone(&self.executable);
        match tokio::task::spawn_blocking(move || {
            containers::list_containers(runner.as_ref(), &executable)
        })
        .await
        {
            Ok(names) => names,
            Err(e) => {
                warn!("Container listing task failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Start the machine. Returns immediately; the state follows once the
    /// scheduled follow-up probe has run.
    pub fn start_vm(&self) {
        self.send(ControlMessage::Machine(MachineCommand::Start));
    }

    /// Stop the machine. Returns immediately, like [`VmController::start_vm`].
    pub fn stop_vm(&self) {
        self.send(ControlMessage::Machine(MachineCommand::Stop));
    }

    /// Probe now; the result goes through the usual debounce
    pub fn check_now(&self) {
        self.send(ControlMessage::CheckNow);
    }

    /// Stop the controller task, cancelling timers and follow-up probes
    pub async fn shutdown(mut self) {
        self.send(ControlMessage::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Controller task ended abnormally: {}", e);
            }
        }
    }

    fn send(&self, message: ControlMessage) {
        if self.tx.send(message).is_err() {
            debug!("Controller task is gone; message dropped");
        }
    }
}

impl Drop for VmController {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.tx.send(ControlMessage::Shutdown);
        }
    }
}

/// State owned by the controller task
struct ControllerTask {
    /// Sender for messages the task schedules to itself
    tx: mpsc::UnboundedSender<ControlMessage>,
    runner: Arc<dyn CommandRunner>,
    executable: Arc<PathBuf>,
    timings: ControllerTimings,
    state: RuntimeState,
    confirm: ConfirmTimer,
    /// In-flight probes, lifecycle commands and follow-up probes
    background: JoinSet<()>,
    status_tx: watch::Sender<StatusSnapshot>,
    transitions: broadcast::Sender<StateTransition>,
}

impl ControllerTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ControlMessage>) {
        let mut ticker = time::interval(self.timings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(ControlMessage::Shutdown) | None => break,
                    Some(message) => self.handle(message),
                },
                _ = ticker.tick() => self.spawn_probe(),
                Some(joined) = self.background.join_next(), if !self.background.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Background task panicked: {}", e);
                        }
                    }
                }
            }
        }

        self.confirm.cancel();
        self.background.shutdown().await;
        info!("Controller stopped in state {}", self.state);
    }

    fn handle(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::CheckNow => self.spawn_probe(),
            ControlMessage::Machine(command) => self.issue(command),
            ControlMessage::ProbeCompleted(result) => self.apply_probe(result),
            ControlMessage::Confirm { generation } => self.confirm_running(generation),
            ControlMessage::Shutdown => {}
        }
    }

    fn spawn_probe(&mut self) {
        let runner = Arc::clone(&self.runner);
        let executable = Arc::clone(&self.executable);
        let tx = self.tx.clone();

        self.background.spawn(async move {
            match tokio::task::spawn_blocking(move || probe::probe(runner.as_ref(), &executable))
                .await
            {
                Ok(result) => {
                    let _ = tx.send(ControlMessage::ProbeCompleted(result));
                }
                Err(e) => warn!("Probe task failed: {}", e),
            }
        });
    }

    /// Fire-and-forget lifecycle command plus exactly one delayed re-probe
    fn issue(&mut self, command: MachineCommand) {
        info!("Requesting machine {}", command.name());

        let runner = Arc::clone(&self.runner);
        let executable = Arc::clone(&self.executable);
        self.background.spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                runner.run(&executable, &command.args())
            })
            .await;

            match result {
                Ok(Ok(output)) if output.success() => {
                    info!("Machine {} finished", command.name())
                }
                Ok(Ok(output)) => warn!(
                    "Machine {} exited with {}: {}",
                    command.name(),
                    output.exit_code,
                    output.text().trim()
                ),
                Ok(Err(e)) => warn!("Error in command execution: {}", e),
                Err(e) => warn!("Machine {} task failed: {}", command.name(), e),
            }
        });

        let tx = self.tx.clone();
        let delay = self.timings.follow_up_delay;
        self.background.spawn(async move {
            time::sleep(delay).await;
            let _ = tx.send(ControlMessage::CheckNow);
        });
    }

    /// Reconcile one probe result.
    ///
    /// A negative reading stops at once and cancels any pending confirm. A
    /// positive reading arms the confirm timer only when none is pending: a
    /// repeated positive reading keeps the existing deadline rather than
    /// restarting it, so the delay counts from the first positive reading and
    /// a poll interval equal to the confirm delay cannot postpone `Running`
    /// indefinitely.
    fn apply_probe(&mut self, result: ProbeResult) {
        debug!(
            "Probe result: running={} state={:?} error={:?} ({} bytes)",
            result.running,
            result.machine_state,
            result.error,
            result.raw.len()
        );

        if !result.running {
            if self.confirm.cancel() {
                info!("Machine went down before it was confirmed running");
            }
            self.transition(RuntimeState::Stopped);
            return;
        }

        if self.state.is_running() {
            return;
        }

        if self.confirm.is_pending() {
            debug!("Machine still reports running; confirmation already pending");
            return;
        }

        let tx = self.tx.clone();
        let generation = self.confirm.arm(self.timings.confirm_delay, move |generation| {
            let _ = tx.send(ControlMessage::Confirm { generation });
        });
        debug!(
            "Machine reports running; confirming in {:?} (generation {})",
            self.timings.confirm_delay, generation
        );
        self.transition(RuntimeState::StartingUp);
    }

    fn confirm_running(&mut self, generation: u64) {
        if self.confirm.acknowledge(generation) {
            self.transition(RuntimeState::Running);
        } else {
            debug!("Ignoring stale confirmation (generation {})", generation);
        }
    }

    fn transition(&mut self, to: RuntimeState) {
        if self.state == to {
            return;
        }

        let from = self.state;
        self.state = to;
        let snapshot = StatusSnapshot::new(to);
        info!("Machine state {} -> {}", from, to);

        self.status_tx.send_replace(snapshot);
        // No subscribers is fine
        let _ = self.transitions.send(StateTransition {
            from,
            to,
            at: snapshot.since,
        });
    }
}
