//! Event wiring for the long-running `run` command.
//!
//! Components never call each other directly. The orchestrator listens to
//! the bus, mirrors every event into the tracing log, and feeds tunnel
//! activity back into the runtime status (tunnel state and served counters).

use std::sync::Arc;

use bridge_core::{BridgeEvent, LogLevel, RuntimeState, TokenCounts};
use bridge_runtime::RuntimeController;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bootstrap::CliContext;

/// What [`Orchestrator::auto_start`] brought up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoStartReport {
    pub pod_started: bool,
    pub health_checks: bool,
    pub tunnel_connected: bool,
}

impl AutoStartReport {
    pub const fn anything_started(self) -> bool {
        self.pod_started || self.health_checks || self.tunnel_connected
    }
}

/// Background task consuming bus events.
pub struct Orchestrator {
    task: JoinHandle<()>,
}

impl Orchestrator {
    pub fn spawn(ctx: &CliContext) -> Self {
        let mut events = ctx.events.subscribe();
        let runtime = Arc::clone(&ctx.runtime);
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                apply_event(&runtime, &event);
                log_event(&event);
            }
        });
        Self { task }
    }

    /// Start every component whose settings have both `enabled` and
    /// `autoStart` set. Failures are logged and leave that component down.
    pub async fn auto_start(ctx: &CliContext) -> AutoStartReport {
        let mut report = AutoStartReport::default();
        let settings = match ctx.config.load().await {
            Ok(settings) => settings,
            Err(e) => {
                error!(error = %e, "Cannot read settings, nothing started");
                return report;
            }
        };

        if settings.pod.enabled && settings.pod.auto_start {
            match ctx.pod.start().await {
                Ok(()) => report.pod_started = true,
                Err(e) => warn!(error = %e, "Pod worker did not start"),
            }
        }

        if settings.llm.enabled && settings.llm.auto_start {
            let status = ctx.runtime.check_status().await;
            if status.status == RuntimeState::Stopped {
                if let Err(e) = ctx.runtime.start().await {
                    warn!(error = %e, "Local runtime did not start");
                }
            }
            ctx.runtime.start_health_checks();
            report.health_checks = true;

            if settings.llm.bridge_enabled {
                match ctx
                    .tunnel
                    .connect(&settings.pod.remote_url, &settings.pod.auth_token)
                    .await
                {
                    Ok(()) => report.tunnel_connected = true,
                    Err(e) => warn!(error = %e, "Tunnel did not connect"),
                }
            }
        }

        report
    }

    /// Tear everything down: tunnel, worker, health loop, then this task.
    pub async fn shutdown(self, ctx: &CliContext) {
        ctx.tunnel.disconnect().await;
        if let Err(e) = ctx.pod.stop().await {
            warn!(error = %e, "Pod worker did not stop cleanly");
        }
        ctx.runtime.stop_health_checks();
        tokio::task::yield_now().await;
        self.task.abort();
    }
}

/// Feed tunnel events back into the runtime status snapshot.
pub fn apply_event(runtime: &RuntimeController, event: &BridgeEvent) {
    match event {
        BridgeEvent::TunnelStatusChanged { status } => runtime.set_tunnel_status(*status),
        BridgeEvent::RequestCompleted {
            success: true,
            prompt_tokens,
            completion_tokens,
            ..
        } => runtime.record_served(TokenCounts {
            prompt: *prompt_tokens,
            completion: *completion_tokens,
        }),
        _ => {}
    }
}

/// Mirror an event into the tracing log. Worker output keeps its level.
pub fn log_event(event: &BridgeEvent) {
    match event {
        BridgeEvent::Log { entry } => match entry.level {
            LogLevel::Debug => debug!(target: "pod_worker", "{}", entry.message),
            LogLevel::Info => info!(target: "pod_worker", "{}", entry.message),
            LogLevel::Warn => warn!(target: "pod_worker", "{}", entry.message),
            LogLevel::Error => error!(target: "pod_worker", "{}", entry.message),
        },
        BridgeEvent::StatusChanged { state } => info!(
            status = %state.status,
            pid = ?state.pid,
            error = ?state.last_error,
            "Pod worker status"
        ),
        BridgeEvent::Connected => info!("Pod worker connected to the platform"),
        BridgeEvent::WorkspacesChanged { count } => info!(count, "Active workspaces"),
        BridgeEvent::BridgeStatusChanged { status } => debug!(
            status = %status.status,
            models = status.models.len(),
            "Runtime status"
        ),
        BridgeEvent::TunnelStatusChanged { status } => info!(%status, "Tunnel status"),
        BridgeEvent::PullProgress { model, progress } => {
            debug!(model = %model, status = %progress.status, "Pull progress");
        }
        BridgeEvent::RequestCompleted {
            request_id,
            model,
            prompt_tokens,
            completion_tokens,
            success,
            error,
        } => {
            if *success {
                info!(
                    request_id = %request_id,
                    model = %model,
                    prompt_tokens,
                    completion_tokens,
                    "Served request"
                );
            } else {
                warn!(request_id = %request_id, model = %model, error = ?error, "Request failed");
            }
        }
        BridgeEvent::Error { source, message } => error!(%source, "{message}"),
    }
}
