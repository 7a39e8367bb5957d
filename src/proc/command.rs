// src/proc/command.rs

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::sleep;
use tracing::debug;

use crate::bus::{Event, EventBus};
use crate::errors::{DevloopError, Result};
use crate::proc::classify::{OutputFilter, Route};
use crate::proc::group::{ProcessGroup, signal_pid};

const RESTART_KILL_ATTEMPTS: u32 = 5;

/// Static configuration of one managed command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Stable logical name, e.g. `"application"`, `"templ"`, `"go"`.
    pub name: String,
    /// The fully-expanded shell command line, run via `/bin/sh -c`. Callers
    /// interpolate configuration values into this string, so those values
    /// must be trusted.
    pub full_command: String,
    /// Tools that spawn their own subprocess trees are never bound to the
    /// supervisor's teardown-on-drop and must always be killed by explicit
    /// group signal.
    pub requires_group_kill: bool,
    /// Whether the orchestrator launches this command immediately.
    pub run_at_start: bool,
}

/// Lifecycle state of the backing OS process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcStatus {
    NotStarted,
    Running,
    Killing,
    Exited(i32),
}

#[derive(Debug, Clone, Copy)]
struct ProcState {
    pid: Option<u32>,
    status: ProcStatus,
}

/// Snapshot of a command's externally visible state, for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandState {
    pub name: String,
    pub running: bool,
    pub has_error: bool,
    pub exit_code: Option<i32>,
}

/// One external OS process plus its restart/kill lifecycle.
///
/// The public out/err channels live as long as this value: restart wires
/// each new incarnation into the same channels, so consumers never need to
/// resubscribe. At most one OS process backs a command at any instant;
/// `start` and `restart` serialize on a per-command lock.
pub struct ManagedCommand {
    name: String,
    full_command: String,
    requires_group_kill: bool,
    run_at_start: bool,
    grace: Duration,
    bus: EventBus,
    errors_tx: mpsc::Sender<anyhow::Error>,
    filter: OutputFilter,
    out_tx: mpsc::Sender<String>,
    err_tx: mpsc::Sender<String>,
    out_rx: std::sync::Mutex<Option<mpsc::Receiver<String>>>,
    err_rx: std::sync::Mutex<Option<mpsc::Receiver<String>>>,
    state_tx: Arc<watch::Sender<ProcState>>,
    state_rx: watch::Receiver<ProcState>,
    has_error: Arc<AtomicBool>,
    restart_lock: Mutex<()>,
}

impl ManagedCommand {
    /// Create a new command with fresh public output/error channels. Does
    /// not run anything yet; call [`ManagedCommand::start`].
    pub fn new(
        spec: CommandSpec,
        bus: EventBus,
        errors_tx: mpsc::Sender<anyhow::Error>,
        grace: Duration,
    ) -> Arc<Self> {
        let (out_tx, out_rx) = mpsc::channel(256);
        let (err_tx, err_rx) = mpsc::channel(256);
        Self::build(
            spec,
            bus,
            errors_tx,
            grace,
            out_tx,
            Some(out_rx),
            err_tx,
            Some(err_rx),
        )
    }

    /// Create a command whose output is piped into `parent`'s public
    /// channels instead of its own. Used for one-shot helper invocations
    /// that should show up under another tool's name.
    pub fn attached_to(spec: CommandSpec, parent: &ManagedCommand) -> Arc<Self> {
        Self::build(
            spec,
            parent.bus.clone(),
            parent.errors_tx.clone(),
            parent.grace,
            parent.out_tx.clone(),
            None,
            parent.err_tx.clone(),
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        spec: CommandSpec,
        bus: EventBus,
        errors_tx: mpsc::Sender<anyhow::Error>,
        grace: Duration,
        out_tx: mpsc::Sender<String>,
        out_rx: Option<mpsc::Receiver<String>>,
        err_tx: mpsc::Sender<String>,
        err_rx: Option<mpsc::Receiver<String>>,
    ) -> Arc<Self> {
        let filter = OutputFilter::for_tool(&spec.name);
        let (state_tx, state_rx) = watch::channel(ProcState {
            pid: None,
            status: ProcStatus::NotStarted,
        });
        Arc::new(Self {
            name: spec.name,
            full_command: spec.full_command,
            requires_group_kill: spec.requires_group_kill,
            run_at_start: spec.run_at_start,
            grace,
            bus,
            errors_tx,
            filter,
            out_tx,
            err_tx,
            out_rx: std::sync::Mutex::new(out_rx),
            err_rx: std::sync::Mutex::new(err_rx),
            state_tx: Arc::new(state_tx),
            state_rx,
            has_error: Arc::new(AtomicBool::new(false)),
            restart_lock: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_command(&self) -> &str {
        &self.full_command
    }

    pub fn run_at_start(&self) -> bool {
        self.run_at_start
    }

    pub fn requires_group_kill(&self) -> bool {
        self.requires_group_kill
    }

    /// True while the most recent output line routed to the error channel
    /// and no restart has happened since.
    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ProcStatus {
        self.state_rx.borrow().status
    }

    /// Has started and not yet reported a terminal state.
    pub fn is_running(&self) -> bool {
        matches!(self.status(), ProcStatus::Running | ProcStatus::Killing)
    }

    /// Has reported a terminal state.
    pub fn is_done(&self) -> bool {
        matches!(self.status(), ProcStatus::Exited(_))
    }

    pub fn state(&self) -> CommandState {
        let status = self.status();
        CommandState {
            name: self.name.clone(),
            running: matches!(status, ProcStatus::Running | ProcStatus::Killing),
            has_error: self.has_error(),
            exit_code: match status {
                ProcStatus::Exited(code) => Some(code),
                _ => None,
            },
        }
    }

    /// Take the public output-line receiver. Returns `None` after the first
    /// call, or for commands attached to another command's channels.
    pub fn take_output(&self) -> Option<mpsc::Receiver<String>> {
        self.out_rx.lock().ok().and_then(|mut guard| guard.take())
    }

    /// Take the public error-line receiver. Same rules as
    /// [`ManagedCommand::take_output`].
    pub fn take_errors(&self) -> Option<mpsc::Receiver<String>> {
        self.err_rx.lock().ok().and_then(|mut guard| guard.take())
    }

    /// Write a line to the command's public output channel.
    pub async fn output_line(&self, line: impl Into<String>) {
        let _ = self.out_tx.send(line.into()).await;
    }

    /// Write a line to the command's public error channel.
    pub async fn error_line(&self, line: impl Into<String>) {
        let _ = self.err_tx.send(line.into()).await;
    }

    fn pid(&self) -> Option<u32> {
        self.state_rx.borrow().pid
    }

    /// Launch the OS process. Fails only if it cannot be spawned; everything
    /// after a successful spawn is reported asynchronously.
    pub async fn start(&self) -> Result<()> {
        let _guard = self.restart_lock.lock().await;
        if self.is_running() {
            return Err(DevloopError::Other(anyhow::anyhow!(
                "command {:?} is already running",
                self.name
            )));
        }
        self.spawn_incarnation().await
    }

    /// Restart the command. If it is running, the old process is terminated
    /// first: a group-level graceful signal (skipped entirely for
    /// `requires_group_kill` commands), one grace interval, then bounded
    /// forceful-kill retries. Once stopped, a fresh process is started with
    /// identical configuration, wired into the existing public channels.
    ///
    /// Concurrent restart requests serialize on the per-command lock; the
    /// kill/retry loop deliberately runs inline so a command's old and new
    /// incarnations never race.
    pub async fn restart(&self) -> Result<()> {
        let _guard = self.restart_lock.lock().await;

        if self.is_running() {
            if !self.requires_group_kill {
                if let Some(pid) = self.pid() {
                    if let Ok(Some(group)) = ProcessGroup::of(pid) {
                        // One of these works for most tools.
                        let _ = group.signal(Signal::SIGTERM);
                        let _ = group.signal(Signal::SIGINT);
                    }
                }
                sleep(self.grace).await;
            }

            if self.is_running() {
                self.kill().await;
                let mut attempts = 0u32;
                while self.is_running() {
                    let _ = self
                        .out_tx
                        .send(format!(
                            "{} is still running, waiting for it to die before restarting",
                            self.name
                        ))
                        .await;
                    sleep(self.grace).await;
                    attempts += 1;
                    if attempts > RESTART_KILL_ATTEMPTS {
                        return Err(DevloopError::CommandWontDie {
                            name: self.name.clone(),
                            attempts: RESTART_KILL_ATTEMPTS,
                        });
                    }
                }
            }
        }

        self.spawn_incarnation().await?;
        self.has_error.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Forcefully kill the process and its whole group if still running.
    ///
    /// Idempotent: no-op if the process already exited (unless it requires
    /// group kill, in which case stray group members are still swept) and
    /// no-op if it never started. All failures are reported on the shared
    /// error channel; "process already gone" counts as success.
    pub async fn kill(&self) {
        let state = *self.state_rx.borrow();

        if matches!(state.status, ProcStatus::Exited(_)) && !self.requires_group_kill {
            return;
        }
        let Some(pid) = state.pid else {
            // Never started.
            return;
        };

        let _ = self
            .out_tx
            .send(format!("force-killing {}...", self.name))
            .await;

        if matches!(state.status, ProcStatus::Running) {
            self.state_tx.send_modify(|st| {
                if matches!(st.status, ProcStatus::Running) {
                    st.status = ProcStatus::Killing;
                }
            });
        }

        match ProcessGroup::of(pid) {
            Ok(Some(group)) => {
                if let Err(err) = group.force_kill() {
                    let _ = self
                        .errors_tx
                        .send(err.context(format!("failed to kill process group for {:?}", self.name)))
                        .await;
                }
            }
            Ok(None) => {}
            Err(err) => {
                let _ = self
                    .errors_tx
                    .send(err.context(format!(
                        "failed to get process group ID for {:?}",
                        self.name
                    )))
                    .await;
            }
        }

        // The group id lookup can race with natural exit; cover the tracked
        // pid directly as well.
        match signal_pid(pid, Signal::SIGKILL) {
            Ok(()) => {
                let _ = self
                    .out_tx
                    .send(format!("{} has been killed", self.name))
                    .await;
            }
            Err(err) => {
                let _ = self
                    .errors_tx
                    .send(err.context(format!("cannot kill {:?}", self.name)))
                    .await;
            }
        }
    }

    /// Spawn one incarnation of the process and its reader/classifier/exit
    /// tasks. Caller must hold the restart lock.
    async fn spawn_incarnation(&self) -> Result<()> {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(&self.full_command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        if !self.requires_group_kill {
            // Bound to the supervisor lifetime: dying with the runtime is
            // the teardown path for single-process tools.
            cmd.kill_on_drop(true);
        }

        let mut child = cmd.spawn().map_err(|source| DevloopError::Spawn {
            name: self.name.clone(),
            source,
        })?;

        self.state_tx.send_replace(ProcState {
            pid: child.id(),
            status: ProcStatus::Running,
        });

        let _ = self
            .out_tx
            .send(format!("running {:?}", self.full_command))
            .await;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("failed to capture stdout of {:?}", self.name))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("failed to capture stderr of {:?}", self.name))?;

        // Raw per-stream channels, classified before they reach the public
        // channels.
        let (raw_out_tx, raw_out_rx) = mpsc::channel(64);
        let (raw_err_tx, raw_err_rx) = mpsc::channel(64);
        tokio::spawn(stream_lines(stdout, raw_out_tx));
        tokio::spawn(stream_lines(stderr, raw_err_tx));
        tokio::spawn(route_output(
            self.filter.clone(),
            raw_out_rx,
            raw_err_rx,
            self.out_tx.clone(),
            self.err_tx.clone(),
            Arc::clone(&self.has_error),
        ));

        let name = self.name.clone();
        let state_tx = Arc::clone(&self.state_tx);
        let errors_tx = self.errors_tx.clone();
        let bus = self.bus.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let code = status.code().unwrap_or(-1);
                    state_tx.send_modify(|st| st.status = ProcStatus::Exited(code));
                    if !status.success() && status.code().is_some() {
                        let _ = errors_tx
                            .send(anyhow::anyhow!(
                                "command {name:?} exited with exit code {code}"
                            ))
                            .await;
                    }
                }
                Err(err) => {
                    state_tx.send_modify(|st| st.status = ProcStatus::Exited(-1));
                    let _ = errors_tx
                        .send(
                            anyhow::Error::new(err)
                                .context(format!("command {name:?} exited with error")),
                        )
                        .await;
                }
            }
            bus.publish(Event::command_done(name)).await;
        });

        Ok(())
    }
}

/// Read `reader` line by line into `tx` until EOF or the receiver is gone.
async fn stream_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!(error = %err, "error reading process output");
                break;
            }
        }
    }
}

/// Route raw stdout/stderr lines onto the public output/error channels per
/// the tool's classification rules, flagging the command on error lines.
async fn route_output(
    filter: OutputFilter,
    mut raw_out: mpsc::Receiver<String>,
    mut raw_err: mpsc::Receiver<String>,
    out_tx: mpsc::Sender<String>,
    err_tx: mpsc::Sender<String>,
    has_error: Arc<AtomicBool>,
) {
    let mut out_open = true;
    let mut err_open = true;
    while out_open || err_open {
        let (line, from_stderr) = tokio::select! {
            maybe = raw_out.recv(), if out_open => match maybe {
                Some(line) => (line, false),
                None => {
                    out_open = false;
                    continue;
                }
            },
            maybe = raw_err.recv(), if err_open => match maybe {
                Some(line) => (line, true),
                None => {
                    err_open = false;
                    continue;
                }
            },
        };

        match filter.route(&line, from_stderr) {
            Route::Output => {
                let _ = out_tx.send(line).await;
            }
            Route::Error => {
                has_error.store(true, Ordering::SeqCst);
                let _ = err_tx.send(line).await;
            }
        }
    }
}
