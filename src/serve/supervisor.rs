// src/serve/supervisor.rs

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::config::ServerSettings;
use crate::errors::{DevflowError, Result};
use crate::serve::reload::ReloadNotifier;

/// A crash this soon after a start counts toward the crash streak.
const RAPID_CRASH_WINDOW: Duration = Duration::from_secs(2);
/// Base restart delay once a crash streak begins; doubles per crash,
/// capped at base * 2^6.
const RESTART_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Lifecycle states of the supervised server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Crashed,
}

/// How to spawn and health-check the server process.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub program: String,
    pub args: Vec<String>,
    /// Exported to the child as the `PORT` environment variable.
    pub port: u16,
    /// Regex matched against stdout lines; first match means ready.
    /// Without it the server counts as ready once spawned.
    pub ready_pattern: Option<String>,
    pub startup_timeout: Duration,
    pub shutdown_timeout: Duration,
    /// Delay between a successful restart and the live-reload signal.
    pub settle_delay: Duration,
}

impl SupervisorSettings {
    /// Derive supervisor settings from the manifest's `[server]`
    /// section: `<command> <dest>/<entry>`.
    pub fn from_server(server: &ServerSettings, dest_root: &Path, port: u16) -> Self {
        Self {
            program: server.command.clone(),
            args: vec![dest_root.join(&server.entry).to_string_lossy().into_owned()],
            port,
            ready_pattern: server.ready_pattern.clone(),
            startup_timeout: server.startup_timeout,
            shutdown_timeout: server.shutdown_timeout,
            settle_delay: server.settle_delay,
        }
    }
}

enum Request {
    Start(oneshot::Sender<Result<()>>),
    Restart(oneshot::Sender<Result<()>>),
    State(oneshot::Sender<ServerState>),
    Shutdown(oneshot::Sender<()>),
}

/// Client side of the supervisor actor. All process lifecycle requests
/// go through the actor's mailbox, so concurrent restarts serialize
/// behind each other instead of interleaving.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<Request>,
}

impl std::fmt::Debug for SupervisorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorHandle").finish_non_exhaustive()
    }
}

impl SupervisorHandle {
    /// Start the server; blocks until it reports ready or the startup
    /// timeout elapses.
    pub async fn start(&self) -> Result<()> {
        self.request(Request::Start).await
    }

    /// Graceful stop (bounded wait) followed by a fresh start. After a
    /// successful restart the live-reload notification fires once the
    /// settle delay elapses.
    pub async fn restart(&self) -> Result<()> {
        self.request(Request::Restart).await
    }

    /// Current lifecycle state; `Stopped` once the actor is gone.
    pub async fn state(&self) -> ServerState {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Request::State(reply_tx)).await.is_err() {
            return ServerState::Stopped;
        }
        reply_rx.await.unwrap_or(ServerState::Stopped)
    }

    /// Stop the server and end the supervisor. Idempotent: repeated
    /// calls after the actor has exited are no-ops.
    pub async fn shutdown(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Request::Shutdown(reply_tx)).await.is_ok() {
            let _ = reply_rx.await;
        }
    }

    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<()>>) -> Request,
    ) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| DevflowError::Other(anyhow!("supervisor is no longer running")))?;
        reply_rx
            .await
            .map_err(|_| DevflowError::Other(anyhow!("supervisor dropped the request")))?
    }
}

/// Spawn the supervisor actor. The returned handle is the only way to
/// signal the server process.
pub fn spawn_supervisor(
    settings: SupervisorSettings,
    reloader: Arc<dyn ReloadNotifier>,
) -> SupervisorHandle {
    let (tx, rx) = mpsc::channel::<Request>(16);
    let (exit_tx, exit_rx) = mpsc::channel::<ExitNotice>(16);

    let supervisor = Supervisor {
        settings,
        reloader,
        state: ServerState::Stopped,
        child: None,
        generation: 0,
        exit_tx,
        last_start: None,
        crash_streak: 0,
    };

    tokio::spawn(supervisor.run(rx, exit_rx));

    SupervisorHandle { tx }
}

/// Sent by the monitor task when the process exits on its own.
#[derive(Debug)]
struct ExitNotice {
    generation: u64,
    description: String,
}

/// Handle to the currently supervised process instance.
struct ChildSlot {
    generation: u64,
    /// Tells the monitor task to kill the child; carries an ack sender
    /// so `stop` can bound its wait.
    kill: Option<oneshot::Sender<oneshot::Sender<()>>>,
}

struct Supervisor {
    settings: SupervisorSettings,
    reloader: Arc<dyn ReloadNotifier>,
    state: ServerState,
    child: Option<ChildSlot>,
    /// Increments per spawn so stale exit notices can be discarded.
    generation: u64,
    exit_tx: mpsc::Sender<ExitNotice>,
    last_start: Option<Instant>,
    crash_streak: u32,
}

impl Supervisor {
    async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request>,
        mut exits: mpsc::Receiver<ExitNotice>,
    ) {
        info!("process supervisor started");

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    None => {
                        self.stop().await;
                        break;
                    }
                    Some(Request::Start(reply)) => {
                        let result = self.start().await;
                        let _ = reply.send(result);
                    }
                    Some(Request::Restart(reply)) => {
                        let result = self.restart().await;
                        if result.is_ok() {
                            self.schedule_reload();
                        }
                        let _ = reply.send(result);
                    }
                    Some(Request::State(reply)) => {
                        let _ = reply.send(self.state);
                    }
                    Some(Request::Shutdown(reply)) => {
                        self.stop().await;
                        let _ = reply.send(());
                        break;
                    }
                },
                Some(notice) = exits.recv() => {
                    self.handle_unexpected_exit(notice).await;
                }
            }
        }

        info!("process supervisor exiting");
    }

    /// Spawn the process and wait for readiness.
    async fn start(&mut self) -> Result<()> {
        if matches!(self.state, ServerState::Starting | ServerState::Running) {
            debug!("server already running; start is a no-op");
            return Ok(());
        }

        self.state = ServerState::Starting;
        self.generation += 1;
        let generation = self.generation;

        info!(
            program = %self.settings.program,
            args = ?self.settings.args,
            "starting server process"
        );

        let mut child = Command::new(&self.settings.program)
            .args(&self.settings.args)
            .env("PORT", self.settings.port.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                self.state = ServerState::Stopped;
                DevflowError::ProcessCrash(format!("failed to spawn server: {e}"))
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Always drain stderr so OS buffers don't fill; log at debug.
        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = "stderr", "{line}");
                }
            });
        }

        if let Some(ref pattern) = self.settings.ready_pattern {
            // Validated at manifest load; recompiled here because the
            // settings only carry the string form.
            let re = match Regex::new(pattern) {
                Ok(re) => re,
                Err(e) => {
                    self.state = ServerState::Stopped;
                    return Err(DevflowError::Configuration(format!(
                        "invalid ready_pattern: {e}"
                    )));
                }
            };

            let Some(stdout) = stdout else {
                self.state = ServerState::Stopped;
                return Err(DevflowError::ProcessCrash(
                    "server has no stdout pipe".to_string(),
                ));
            };
            let mut lines = BufReader::new(stdout).lines();

            let wait_ready = async {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = "stdout", "{line}");
                    if re.is_match(&line) {
                        return Ok(());
                    }
                }
                Err(DevflowError::ProcessCrash(
                    "server exited before reporting ready".to_string(),
                ))
            };

            match timeout(self.settings.startup_timeout, wait_ready).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    let _ = child.kill().await;
                    self.state = ServerState::Stopped;
                    return Err(err);
                }
                Err(_elapsed) => {
                    warn!(
                        timeout = ?self.settings.startup_timeout,
                        "server did not report ready in time; killing it"
                    );
                    let _ = child.kill().await;
                    self.state = ServerState::Stopped;
                    return Err(DevflowError::StartupTimeout(self.settings.startup_timeout));
                }
            }

            // Keep draining stdout after readiness.
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = "stdout", "{line}");
                }
            });
        } else if let Some(stdout) = stdout {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = "stdout", "{line}");
                }
            });
        }

        // The monitor task owns the child from here on.
        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(monitor(child, generation, kill_rx, self.exit_tx.clone()));

        self.child = Some(ChildSlot {
            generation,
            kill: Some(kill_tx),
        });
        self.state = ServerState::Running;
        self.last_start = Some(Instant::now());

        info!("server is ready");
        Ok(())
    }

    /// Graceful stop with a bounded wait. Idempotent.
    async fn stop(&mut self) {
        let Some(mut slot) = self.child.take() else {
            self.state = ServerState::Stopped;
            return;
        };

        if let Some(kill) = slot.kill.take() {
            let (ack_tx, ack_rx) = oneshot::channel();
            if kill.send(ack_tx).is_ok() {
                match timeout(self.settings.shutdown_timeout, ack_rx).await {
                    Ok(_) => debug!("server stopped"),
                    Err(_) => warn!(
                        timeout = ?self.settings.shutdown_timeout,
                        "server did not confirm stop within the shutdown timeout"
                    ),
                }
            }
        }

        self.state = ServerState::Stopped;
    }

    async fn restart(&mut self) -> Result<()> {
        info!("restarting server");
        self.stop().await;
        self.start().await
    }

    /// Live-reload fires after the settle delay so clients don't
    /// reload against a server that is still binding its socket.
    fn schedule_reload(&self) {
        let reloader = Arc::clone(&self.reloader);
        let delay = self.settings.settle_delay;
        tokio::spawn(async move {
            sleep(delay).await;
            reloader.clients_changed();
        });
    }

    async fn handle_unexpected_exit(&mut self, notice: ExitNotice) {
        if self.child.as_ref().map(|c| c.generation) != Some(notice.generation) {
            debug!(generation = notice.generation, "stale exit notice; ignoring");
            return;
        }

        self.child = None;
        self.state = ServerState::Crashed;
        warn!(
            error = %DevflowError::ProcessCrash(notice.description.clone()),
            "server exited unexpectedly"
        );

        // Crash streak only counts exits shortly after a start.
        let rapid = self
            .last_start
            .map(|t| t.elapsed() < RAPID_CRASH_WINDOW)
            .unwrap_or(false);
        self.crash_streak = if rapid { self.crash_streak + 1 } else { 1 };

        if self.crash_streak > 1 {
            let exp = (self.crash_streak - 1).min(6);
            let backoff = RESTART_BACKOFF_BASE * 2u32.pow(exp);
            warn!(
                streak = self.crash_streak,
                backoff = ?backoff,
                "rapid crash loop; backing off before restart"
            );
            sleep(backoff).await;
        }

        match self.start().await {
            Ok(()) => {
                info!("server restarted after crash");
                self.schedule_reload();
            }
            Err(err) => {
                error!(error = %err, "failed to restart server after crash");
            }
        }
    }
}

/// Owns the child process: either it exits on its own (an exit notice
/// is sent) or the supervisor requests a kill (acked, no notice).
async fn monitor(
    mut child: Child,
    generation: u64,
    kill_rx: oneshot::Receiver<oneshot::Sender<()>>,
    exit_tx: mpsc::Sender<ExitNotice>,
) {
    tokio::select! {
        status = child.wait() => {
            let description = match status {
                Ok(s) => format!("exited with {}", s.code().unwrap_or(-1)),
                Err(e) => format!("wait failed: {e}"),
            };
            let _ = exit_tx.send(ExitNotice { generation, description }).await;
        }
        ack = kill_rx => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill server process");
            }
            let _ = child.wait().await;
            if let Ok(ack) = ack {
                let _ = ack.send(());
            }
        }
    }
}
