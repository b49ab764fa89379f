//! Pod worker supervisor.
//!
//! Owns zero or one worker process. The process is spawned by [`PodSupervisor::start`],
//! its output is parsed line by line, and its exit is classified as either a
//! clean stop or a crash. Crashes while running are retried with linear backoff
//! up to [`SupervisorPolicy::max_restarts`].
//!
//! A monitor task owns the `Child`. Everything else talks to it through a
//! [`ChildHandle`]: a stop request channel plus an "exited" watch.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bridge_core::settings::validate_pod_settings;
use bridge_core::{
    BridgeError, BridgeEvent, BridgeResult, ConfigStore, EventEmitter, EventSource, LogEntry,
    LogLevel, PodSettings, ProcessStatus, SupervisedProcessState,
};
use chrono::Utc;
use futures_util::future::BoxFuture;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::locator::ExecutableLocator;
use super::log_ring::{DEFAULT_LOG_CAPACITY, LogRing};
use super::output::parse_line;
use crate::process::{GRACEFUL_SIGNAL, OutputStream, spawn_line_reader, terminate_child};

/// Returned by `start()` when no auth token is configured.
pub const NO_TOKEN_MESSAGE: &str =
    "No pod token configured. Set an auth token in pod settings before starting.";

/// How long the monitor waits for output readers to drain after exit.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Timing and retry policy for the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorPolicy {
    /// How long to wait for a "connected" signal before assuming the worker is up.
    pub readiness_timeout: Duration,
    /// Time between SIGTERM and SIGKILL on stop.
    pub grace_period: Duration,
    /// Automatic restarts allowed before giving up. Reset by a connected signal.
    pub max_restarts: u32,
    /// Restart `n` waits `n * restart_base_delay`.
    pub restart_base_delay: Duration,
    /// Captured log entries retained.
    pub log_capacity: usize,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(10),
            grace_period: Duration::from_secs(5),
            max_restarts: 5,
            restart_base_delay: Duration::from_secs(2),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Build the worker's argument vector.
pub fn worker_args(settings: &PodSettings) -> Vec<String> {
    vec![
        "start".to_string(),
        "--token".to_string(),
        settings.auth_token.trim().to_string(),
        "--url".to_string(),
        settings.remote_url.clone(),
        "--name".to_string(),
        settings.display_name.clone(),
        "--max-workspaces".to_string(),
        settings.capacity_limit.to_string(),
        "--json-logs".to_string(),
    ]
}

/// Whether an exit observed while running counts as a crash.
///
/// A zero exit code or the graceful termination signal is a clean exit.
pub const fn is_unexpected_exit(code: Option<i32>, signal: Option<i32>) -> bool {
    let clean_code = matches!(code, Some(0));
    let graceful_signal = matches!(signal, Some(s) if s == GRACEFUL_SIGNAL);
    !clean_code && !graceful_signal
}

/// Supervisor for the pod worker process.
///
/// Not `Clone`: share it behind an `Arc`. Dropping the supervisor cancels any
/// scheduled restart and terminates the worker.
pub struct PodSupervisor {
    inner: Arc<Inner>,
}

struct ChildHandle {
    generation: u64,
    pid: Option<u32>,
    stop_tx: oneshot::Sender<()>,
    exited: watch::Receiver<bool>,
}

struct Inner {
    config: Arc<dyn ConfigStore>,
    emitter: Arc<dyn EventEmitter>,
    locator: ExecutableLocator,
    policy: SupervisorPolicy,
    state: watch::Sender<SupervisedProcessState>,
    logs: Mutex<LogRing>,
    child: Mutex<Option<ChildHandle>>,
    launch_lock: tokio::sync::Mutex<()>,
    pending_restart: Mutex<Option<JoinHandle<()>>>,
    generation: AtomicU64,
    restart_attempts: AtomicU32,
    active_workspaces: AtomicU32,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PodSupervisor {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        emitter: Arc<dyn EventEmitter>,
        locator: ExecutableLocator,
        policy: SupervisorPolicy,
    ) -> Self {
        let (state, _) = watch::channel(SupervisedProcessState::default());
        let logs = LogRing::new(policy.log_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                emitter,
                locator,
                policy,
                state,
                logs: Mutex::new(logs),
                child: Mutex::new(None),
                launch_lock: tokio::sync::Mutex::new(()),
                pending_restart: Mutex::new(None),
                generation: AtomicU64::new(0),
                restart_attempts: AtomicU32::new(0),
                active_workspaces: AtomicU32::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Supervisor with the default locator and policy.
    pub fn with_defaults(config: Arc<dyn ConfigStore>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self::new(
            config,
            emitter,
            ExecutableLocator::default(),
            SupervisorPolicy::default(),
        )
    }

    /// Spawn the worker and wait until it is running.
    ///
    /// Resolves once a connected signal is seen or the readiness timeout
    /// elapses with the process still alive. A no-op if already live.
    pub async fn start(&self) -> BridgeResult<()> {
        self.inner.cancel_pending_restart();
        Inner::launch(Arc::clone(&self.inner)).await
    }

    /// Stop the worker, escalating to a forced kill after the grace period.
    ///
    /// Resolves once the process has exited. Cancels any scheduled restart.
    /// The restart counter is left unchanged.
    pub async fn stop(&self) -> BridgeResult<()> {
        let inner = &self.inner;
        inner.cancel_pending_restart();

        let handle = lock(&inner.child).take();
        let Some(handle) = handle else {
            inner.update_state(|s| {
                if s.status == ProcessStatus::Stopped {
                    return false;
                }
                s.status = ProcessStatus::Stopped;
                s.pid = None;
                s.connected_to_remote = false;
                true
            });
            return Ok(());
        };

        info!(pid = ?handle.pid, "Stopping pod worker");
        inner.update_state(|s| {
            s.status = ProcessStatus::Stopping;
            true
        });

        let ChildHandle {
            stop_tx,
            mut exited,
            ..
        } = handle;
        let _ = stop_tx.send(());
        let _ = exited.wait_for(|done| *done).await;

        // The exit may have raced with the stop request and been seen as a crash.
        inner.cancel_pending_restart();
        inner.update_state(|s| {
            if s.status == ProcessStatus::Stopped {
                return false;
            }
            s.status = ProcessStatus::Stopped;
            s.pid = None;
            s.connected_to_remote = false;
            true
        });
        info!("Pod worker stopped");
        Ok(())
    }

    /// Stop (if live) then start. Resets the restart counter.
    pub async fn restart(&self) -> BridgeResult<()> {
        self.stop().await?;
        self.inner.restart_attempts.store(0, Ordering::SeqCst);
        self.start().await
    }

    /// Current process state.
    pub fn status(&self) -> SupervisedProcessState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn watch_status(&self) -> watch::Receiver<SupervisedProcessState> {
        self.inner.state.subscribe()
    }

    /// The most recent `limit` log entries (all when `None`), oldest first.
    pub fn get_logs(&self, limit: Option<usize>) -> Vec<LogEntry> {
        lock(&self.inner.logs).recent(limit)
    }

    pub fn clear_logs(&self) {
        lock(&self.inner.logs).clear();
    }

    /// Workspaces the worker last reported as active.
    pub fn active_workspaces(&self) -> u32 {
        self.inner.active_workspaces.load(Ordering::SeqCst)
    }

    /// Automatic restarts attempted since the last connected signal.
    pub fn restart_attempts(&self) -> u32 {
        self.inner.restart_attempts.load(Ordering::SeqCst)
    }
}

impl Drop for PodSupervisor {
    fn drop(&mut self) {
        let inner = &self.inner;
        inner.cancel_pending_restart();

        let handle = {
            let mut slot = lock(&inner.child);
            inner.closed.store(true, Ordering::SeqCst);
            slot.take()
        };
        if let Some(handle) = handle {
            debug!(pid = ?handle.pid, "Supervisor dropped, terminating pod worker");
            inner.update_state(|s| {
                s.status = ProcessStatus::Stopping;
                true
            });
            // The monitor terminates the child once the stop sender is gone.
            drop(handle);
        }
    }
}

impl Inner {
    fn current_status(&self) -> ProcessStatus {
        self.state.borrow().status
    }

    /// Apply `f` to the state; emits `status-changed` when it returns true.
    fn update_state(&self, f: impl FnOnce(&mut SupervisedProcessState) -> bool) -> bool {
        let changed = self.state.send_if_modified(f);
        if changed {
            let state = self.state.borrow().clone();
            self.emitter.emit(BridgeEvent::StatusChanged { state });
        }
        changed
    }

    fn cancel_pending_restart(&self) {
        if let Some(task) = lock(&self.pending_restart).take() {
            task.abort();
        }
    }

    fn append_log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::now(level, message);
        lock(&self.logs).push(entry.clone());
        self.emitter.emit(BridgeEvent::Log { entry });
    }

    /// Record a start failure: state goes to `error` and an error event is emitted.
    fn fail(&self, message: &str) {
        error!(error = %message, "Pod worker failed");
        self.update_state(|s| {
            s.status = ProcessStatus::Error;
            s.pid = None;
            s.connected_to_remote = false;
            s.last_error = Some(message.to_string());
            true
        });
        self.emitter
            .emit(BridgeEvent::error(EventSource::Supervisor, message));
    }

    // Returns a boxed future so the restart path (monitor -> exit -> launch)
    // does not produce a recursive opaque type.
    fn launch(self: Arc<Self>) -> BoxFuture<'static, BridgeResult<()>> {
        Box::pin(async move {
            let _guard = self.launch_lock.lock().await;

            match self.current_status() {
                ProcessStatus::Starting | ProcessStatus::Running => {
                    debug!("Pod worker already running");
                    return Ok(());
                }
                ProcessStatus::Stopping => {
                    return Err(BridgeError::Internal(
                        "Pod worker is stopping; try again once it has stopped".to_string(),
                    ));
                }
                ProcessStatus::Stopped | ProcessStatus::Error => {}
            }

            let settings = self.config.pod_settings().await?;
            if !settings.has_token() {
                return Err(BridgeError::Configuration(NO_TOKEN_MESSAGE.to_string()));
            }
            validate_pod_settings(&settings)?;

            let Some(executable) = self.locator.locate().await else {
                let message = format!(
                    "Pod worker executable '{}' not found (looked for bundled binary {}, development build, and PATH)",
                    self.locator.command(),
                    self.locator.bundled_file_name()
                );
                warn!("{message}");
                return Err(BridgeError::Unavailable(message));
            };

            let mut command = Command::new(&executable);
            command
                .args(worker_args(&settings))
                .env("PYTHONUNBUFFERED", "1")
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let mut child = match command.spawn() {
                Ok(child) => child,
                Err(e) => {
                    let message =
                        format!("Failed to start pod worker {}: {e}", executable.display());
                    self.fail(&message);
                    return Err(BridgeError::Spawn(message));
                }
            };

            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let pid = child.id();
            self.active_workspaces.store(0, Ordering::SeqCst);
            self.update_state(|s| {
                *s = SupervisedProcessState {
                    status: ProcessStatus::Starting,
                    pid,
                    started_at: Some(Utc::now()),
                    last_error: None,
                    connected_to_remote: false,
                };
                true
            });
            info!(
                pid = ?pid,
                path = %executable.display(),
                name = %settings.display_name,
                "Pod worker spawned"
            );

            let readers = self.attach_readers(&mut child, generation);
            let (stop_tx, stop_rx) = oneshot::channel();
            let (exited_tx, exited) = watch::channel(false);
            tokio::spawn(Arc::clone(&self).monitor(child, generation, stop_rx, readers, exited_tx));

            let handle = ChildHandle {
                generation,
                pid,
                stop_tx,
                exited,
            };
            {
                let mut slot = lock(&self.child);
                if self.closed.load(Ordering::SeqCst) {
                    drop(slot);
                    drop(handle);
                    return Err(BridgeError::Internal(
                        "Supervisor shut down during start".to_string(),
                    ));
                }
                *slot = Some(handle);
            }

            self.await_readiness(generation).await
        })
    }

    fn attach_readers(self: &Arc<Self>, child: &mut Child, generation: u64) -> Vec<JoinHandle<()>> {
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            let inner = Arc::clone(self);
            readers.push(spawn_line_reader(stdout, OutputStream::Stdout, move |line| {
                inner.handle_line(generation, &line, OutputStream::Stdout);
            }));
        }
        if let Some(stderr) = child.stderr.take() {
            let inner = Arc::clone(self);
            readers.push(spawn_line_reader(stderr, OutputStream::Stderr, move |line| {
                inner.handle_line(generation, &line, OutputStream::Stderr);
            }));
        }
        readers
    }

    /// Race the connected signal against the readiness timeout.
    async fn await_readiness(&self, generation: u64) -> BridgeResult<()> {
        let mut rx = self.state.subscribe();
        let settled = timeout(self.policy.readiness_timeout, async {
            rx.wait_for(|s| s.status != ProcessStatus::Starting)
                .await
                .map(|s| s.clone())
        })
        .await;

        match settled {
            Ok(Ok(state)) => match state.status {
                ProcessStatus::Running | ProcessStatus::Starting => Ok(()),
                ProcessStatus::Error => Err(BridgeError::Spawn(
                    state
                        .last_error
                        .unwrap_or_else(|| "Pod worker exited during startup".to_string()),
                )),
                ProcessStatus::Stopping | ProcessStatus::Stopped => Err(BridgeError::Internal(
                    "Pod worker was stopped before it became ready".to_string(),
                )),
            },
            Ok(Err(_)) => Err(BridgeError::Internal(
                "Supervisor state channel closed".to_string(),
            )),
            Err(_) => {
                let promoted = self.update_state(|s| {
                    let current = self.generation.load(Ordering::SeqCst) == generation;
                    if current && s.status == ProcessStatus::Starting {
                        s.status = ProcessStatus::Running;
                        true
                    } else {
                        false
                    }
                });
                if promoted {
                    info!(
                        timeout_ms = self.policy.readiness_timeout.as_millis(),
                        "No connection signal before readiness timeout, assuming pod worker is running"
                    );
                    return Ok(());
                }
                match self.current_status() {
                    ProcessStatus::Running => Ok(()),
                    _ => Err(BridgeError::Spawn(
                        self.state
                            .borrow()
                            .last_error
                            .clone()
                            .unwrap_or_else(|| "Pod worker did not become ready".to_string()),
                    )),
                }
            }
        }
    }

    fn handle_line(&self, generation: u64, line: &str, stream: OutputStream) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        let Some(parsed) = parse_line(line, stream) else {
            return;
        };

        self.append_log(parsed.level(), parsed.message());

        if let Some(count) = parsed.active_workspaces() {
            let previous = self.active_workspaces.swap(count, Ordering::SeqCst);
            if previous != count {
                debug!(count, "Active workspaces changed");
                self.emitter.emit(BridgeEvent::WorkspacesChanged { count });
            }
        }

        if parsed.signals_connected() {
            self.mark_connected();
        }
    }

    fn mark_connected(&self) {
        let changed = self.update_state(|s| {
            if matches!(s.status, ProcessStatus::Starting | ProcessStatus::Running)
                && !s.connected_to_remote
            {
                s.status = ProcessStatus::Running;
                s.connected_to_remote = true;
                true
            } else {
                false
            }
        });
        if changed {
            self.restart_attempts.store(0, Ordering::SeqCst);
            info!("Pod worker connected to remote");
            self.emitter.emit(BridgeEvent::Connected);
        }
    }

    async fn monitor(
        self: Arc<Self>,
        mut child: Child,
        generation: u64,
        mut stop_rx: oneshot::Receiver<()>,
        readers: Vec<JoinHandle<()>>,
        exited_tx: watch::Sender<bool>,
    ) {
        // A dropped stop sender (supervisor gone) also means "stop".
        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = &mut stop_rx => None,
        };
        let result = match waited {
            Some(status) => status,
            None => terminate_child(&mut child, self.policy.grace_period).await,
        };

        for reader in readers {
            let _ = timeout(READER_DRAIN_TIMEOUT, reader).await;
        }

        self.handle_exit(generation, &result);
        let _ = exited_tx.send(true);
    }

    fn handle_exit(self: &Arc<Self>, generation: u64, result: &io::Result<ExitStatus>) {
        {
            let mut slot = lock(&self.child);
            if slot.as_ref().is_some_and(|h| h.generation == generation) {
                *slot = None;
            }
        }
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Ignoring exit of superseded pod worker");
            return;
        }

        if self.active_workspaces.swap(0, Ordering::SeqCst) != 0 {
            self.emitter.emit(BridgeEvent::WorkspacesChanged { count: 0 });
        }

        let (code, signal) = match result {
            Ok(status) => (status.code(), exit_signal(status)),
            Err(e) => {
                warn!(error = %e, "Failed to wait on pod worker");
                (None, None)
            }
        };
        let description = describe_exit(code, signal);
        let previous = self.current_status();
        info!(exit = %description, previous = ?previous, "Pod worker exited");
        self.append_log(LogLevel::Info, format!("Pod worker exited ({description})"));

        match previous {
            ProcessStatus::Starting => {
                self.fail(&format!("Pod worker exited during startup ({description})"));
            }
            ProcessStatus::Running if is_unexpected_exit(code, signal) => {
                self.handle_crash(&description);
            }
            _ => {
                self.update_state(|s| {
                    s.status = ProcessStatus::Stopped;
                    s.pid = None;
                    s.connected_to_remote = false;
                    true
                });
            }
        }
    }

    fn handle_crash(self: &Arc<Self>, description: &str) {
        self.fail(&format!("Pod worker crashed ({description})"));

        let attempts = self.restart_attempts.load(Ordering::SeqCst);
        if attempts >= self.policy.max_restarts {
            let message = format!(
                "Pod worker crashed after {attempts} restart attempts; giving up"
            );
            warn!("{message}");
            self.update_state(|s| {
                s.status = ProcessStatus::Stopped;
                s.last_error = Some(message.clone());
                true
            });
            self.emitter
                .emit(BridgeEvent::error(EventSource::Supervisor, message));
            return;
        }

        let attempt = attempts + 1;
        self.restart_attempts.store(attempt, Ordering::SeqCst);
        let delay = self.policy.restart_base_delay * attempt;
        info!(
            attempt,
            max = self.policy.max_restarts,
            delay_ms = delay.as_millis(),
            "Scheduling pod worker restart"
        );

        let inner = Arc::clone(self);
        let task = tokio::spawn(async move {
            sleep(delay).await;
            if let Err(e) = Self::launch(Arc::clone(&inner)).await {
                warn!(attempt, error = %e, "Pod worker restart failed");
                inner
                    .emitter
                    .emit(BridgeEvent::error(EventSource::Supervisor, e.to_string()));
            }
        });
        if let Some(previous) = lock(&self.pending_restart).replace(task) {
            previous.abort();
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
const fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

fn describe_exit(code: Option<i32>, signal: Option<i32>) -> String {
    match (code, signal) {
        (Some(code), _) => format!("exit code {code}"),
        (None, Some(signal)) => format!("signal {signal}"),
        (None, None) => "unknown exit status".to_string(),
    }
}
