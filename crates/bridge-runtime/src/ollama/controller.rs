//! Runtime controller: reachability polling, model management and inference
//! against an independently running local Ollama.
//!
//! The controller never owns the runtime process. It infers the runtime's
//! state from probes:
//!
//! - inventory call succeeds → `running`
//! - inventory call fails, `ollama` on PATH → `stopped`
//! - inventory call fails, `ollama` missing → `not_installed`

use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bridge_core::{
    BridgeError, BridgeEvent, BridgeResult, ChatRequest, ChatResponse, ConfigStore,
    EventEmitter, EventSource, InferencePort, PullProgress, RuntimeState, RuntimeStatus,
    TokenCounts, TunnelStatus,
};
use reqwest::Client;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::OllamaClient;

/// Name of the runtime executable looked up on PATH.
pub const DEFAULT_RUNTIME_COMMAND: &str = "ollama";

/// Timing policy for the controller.
#[derive(Debug, Clone)]
pub struct ControllerPolicy {
    /// Period of the background health loop.
    pub health_interval: Duration,
    /// Timeout for inventory and version probes.
    pub probe_timeout: Duration,
    /// Timeout for a single chat completion.
    pub chat_timeout: Duration,
    /// How long `start()` waits for a launched runtime to become reachable.
    pub start_wait: Duration,
    /// Poll period while waiting in `start()`.
    pub start_poll_interval: Duration,
    /// Runtime executable name, used for the presence check and `start()`.
    pub runtime_command: String,
}

impl Default for ControllerPolicy {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(3),
            chat_timeout: Duration::from_secs(300),
            start_wait: Duration::from_secs(15),
            start_poll_interval: Duration::from_millis(500),
            runtime_command: DEFAULT_RUNTIME_COMMAND.to_string(),
        }
    }
}

struct HealthLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct ControllerInner {
    config: Arc<dyn ConfigStore>,
    emitter: Arc<dyn EventEmitter>,
    policy: ControllerPolicy,
    http: Client,
    status: RwLock<RuntimeStatus>,
}

/// Controller for the local inference runtime.
///
/// Not `Clone`: share it behind an `Arc`. Dropping it stops the health loop.
pub struct RuntimeController {
    inner: Arc<ControllerInner>,
    health: Mutex<Option<HealthLoop>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RuntimeController {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        emitter: Arc<dyn EventEmitter>,
        policy: ControllerPolicy,
    ) -> BridgeResult<Self> {
        let http = Client::builder()
            .connect_timeout(policy.probe_timeout)
            .build()
            .map_err(|e| BridgeError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                emitter,
                policy,
                http,
                status: RwLock::new(RuntimeStatus::default()),
            }),
            health: Mutex::new(None),
        })
    }

    /// Last computed status snapshot.
    pub fn status(&self) -> RuntimeStatus {
        self.inner.snapshot()
    }

    /// Probe the runtime now and return the fresh status.
    pub async fn check_status(&self) -> RuntimeStatus {
        self.inner.check_status().await
    }

    /// Whether the runtime executable is on PATH.
    pub async fn is_installed(&self) -> bool {
        self.inner.is_installed().await
    }

    /// Launch `ollama serve` if the runtime is installed but not reachable,
    /// then wait for it to answer.
    pub async fn start(&self) -> BridgeResult<RuntimeStatus> {
        let inner = &self.inner;
        let current = inner.check_status().await;
        match current.status {
            RuntimeState::Running => return Ok(current),
            RuntimeState::NotInstalled => {
                return Err(BridgeError::Unavailable(format!(
                    "{} is not installed",
                    inner.policy.runtime_command
                )));
            }
            RuntimeState::Stopped | RuntimeState::Checking => {}
        }

        let command = inner.policy.runtime_command.clone();
        let executable = tokio::task::spawn_blocking(move || which::which(command))
            .await
            .map_err(|e| BridgeError::Internal(format!("Presence check panicked: {e}")))?
            .map_err(|e| BridgeError::Unavailable(format!("Runtime executable not found: {e}")))?;

        info!(path = %executable.display(), "Launching local runtime");
        let mut child = Command::new(&executable)
            .arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                BridgeError::Spawn(format!("Failed to launch {}: {e}", executable.display()))
            })?;
        // Detached: reap it whenever it exits.
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        let deadline = Instant::now() + inner.policy.start_wait;
        while Instant::now() < deadline {
            sleep(inner.policy.start_poll_interval).await;
            let status = inner.check_status().await;
            if status.status == RuntimeState::Running {
                info!("Local runtime is reachable");
                return Ok(status);
            }
        }

        Err(BridgeError::Unavailable(format!(
            "Local runtime did not become reachable within {}s",
            inner.policy.start_wait.as_secs()
        )))
    }

    /// Pull a model, reporting each progress record to `on_progress` (and as a
    /// `pull-progress` event). Refreshes the inventory on success.
    pub async fn pull_model<F>(&self, model: &str, mut on_progress: F) -> BridgeResult<()>
    where
        F: FnMut(&PullProgress) + Send,
    {
        let client = self.inner.client().await?;
        let emitter = Arc::clone(&self.inner.emitter);
        info!(model, "Pulling model");

        let result = client
            .pull(model, |progress| {
                on_progress(&progress);
                emitter.emit(BridgeEvent::PullProgress {
                    model: model.to_string(),
                    progress,
                });
            })
            .await;

        match result {
            Ok(()) => {
                info!(model, "Model pull complete");
                self.inner.check_status().await;
                Ok(())
            }
            Err(e) => {
                warn!(model, error = %e, "Model pull failed");
                Err(e)
            }
        }
    }

    /// Delete a model. Refreshes the inventory on success.
    pub async fn delete_model(&self, model: &str) -> BridgeResult<()> {
        let client = self.inner.client().await?;
        client.delete(model).await?;
        info!(model, "Model deleted");
        self.inner.check_status().await;
        Ok(())
    }

    /// Single non-streaming chat completion.
    pub async fn chat(&self, request: ChatRequest) -> BridgeResult<ChatResponse> {
        let client = self.inner.client().await?;
        client.chat(&request).await
    }

    /// Start the background health loop. No-op while one is running.
    pub fn start_health_checks(&self) {
        let mut slot = lock(&self.health);
        if slot.as_ref().is_some_and(|h| !h.task.is_finished()) {
            debug!("Health checks already running");
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let inner = Arc::clone(&self.inner);
        let period = inner.policy.health_interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        inner.check_status().await;
                    }
                }
            }
            debug!("Health loop exited");
        });

        info!(interval_secs = period.as_secs(), "Runtime health checks started");
        *slot = Some(HealthLoop { cancel, task });
    }

    /// Stop the health loop, releasing its timer.
    pub fn stop_health_checks(&self) {
        if let Some(health) = lock(&self.health).take() {
            health.cancel.cancel();
            info!("Runtime health checks stopped");
        }
    }

    pub fn health_checks_running(&self) -> bool {
        lock(&self.health)
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    /// Record the tunnel's connection state in the status snapshot.
    pub fn set_tunnel_status(&self, status: TunnelStatus) {
        self.inner.mutate(|s| {
            if s.tunnel_status == status {
                return false;
            }
            s.tunnel_status = status;
            true
        });
    }

    /// Count one answered tunnel request and its tokens.
    pub fn record_served(&self, tokens: TokenCounts) {
        self.inner.mutate(|s| {
            s.requests_served += 1;
            s.tokens_served += tokens.total();
            true
        });
    }
}

impl Drop for RuntimeController {
    fn drop(&mut self) {
        if let Some(health) = lock(&self.health).take() {
            health.cancel.cancel();
        }
    }
}

#[async_trait]
impl InferencePort for RuntimeController {
    async fn chat(&self, request: ChatRequest) -> BridgeResult<ChatResponse> {
        Self::chat(self, request).await
    }

    async fn model_names(&self) -> Vec<String> {
        self.status().model_names()
    }
}

impl ControllerInner {
    fn snapshot(&self) -> RuntimeStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `f`; emits `bridge-status-changed` when it returns true.
    fn mutate(&self, f: impl FnOnce(&mut RuntimeStatus) -> bool) -> RuntimeStatus {
        let (changed, snapshot) = {
            let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
            let changed = f(&mut status);
            (changed, status.clone())
        };
        if changed {
            self.emitter.emit(BridgeEvent::BridgeStatusChanged {
                status: snapshot.clone(),
            });
        }
        snapshot
    }

    async fn client(&self) -> BridgeResult<OllamaClient> {
        let settings = self.config.llm_settings().await?;
        Ok(OllamaClient::new(self.http.clone(), &settings.local_url)?
            .with_timeouts(self.policy.probe_timeout, self.policy.chat_timeout))
    }

    async fn is_installed(&self) -> bool {
        let command = self.policy.runtime_command.clone();
        tokio::task::spawn_blocking(move || which::which(command).is_ok())
            .await
            .unwrap_or(false)
    }

    async fn check_status(&self) -> RuntimeStatus {
        let probe = match self.client().await {
            Ok(client) => match client.list_models().await {
                Ok(models) => Ok((client, models)),
                Err(e) => Err(e),
            },
            Err(e) => {
                self.emitter
                    .emit(BridgeEvent::error(EventSource::Runtime, e.to_string()));
                Err(e)
            }
        };

        let (state, version, models) = match probe {
            Ok((client, models)) => {
                let version = match client.version().await {
                    Ok(v) => Some(v),
                    Err(e) => {
                        debug!(error = %e, "Runtime version unavailable");
                        None
                    }
                };
                (RuntimeState::Running, version, models)
            }
            Err(e) => {
                debug!(error = %e, "Runtime probe failed");
                let state = if self.is_installed().await {
                    RuntimeState::Stopped
                } else {
                    RuntimeState::NotInstalled
                };
                (state, None, Vec::new())
            }
        };

        self.mutate(|s| {
            let changed = s.status != state || s.version != version || s.models != models;
            if changed && s.status != state {
                info!(from = ?s.status, to = ?state, "Runtime state changed");
            }
            s.status = state;
            s.version = version;
            s.models = models;
            changed
        })
    }
}
