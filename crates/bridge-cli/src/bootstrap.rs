//! CLI bootstrap - the composition root.
//!
//! The only place where concrete adapters are instantiated:
//! - settings store (JSON file)
//! - event bus
//! - runtime controller (Ollama over HTTP)
//! - pod supervisor (bundled or PATH-resolved worker)
//! - tunnel client (WebSocket transport, inference served by the runtime controller)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bridge_core::{ConfigStore, EventBus, EventEmitter, InferencePort};
use bridge_runtime::{
    ControllerPolicy, ExecutableLocator, PodSupervisor, RuntimeController, SupervisorPolicy,
};
use bridge_tunnel::{TunnelClient, TunnelPolicy, TunnelTransport, WebSocketTransport};

use crate::config_store::{JsonFileConfigStore, default_config_path};

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Settings file location.
    pub config_path: PathBuf,
    pub supervisor: SupervisorPolicy,
    pub controller: ControllerPolicy,
    pub tunnel: TunnelPolicy,
    pub locator: ExecutableLocator,
}

impl CliConfig {
    /// Default policies, with the settings file at `config_path` or the
    /// per-user default location.
    pub fn with_defaults(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => default_config_path()
                .context("Could not determine the user configuration directory; pass --config")?,
        };
        Ok(Self {
            config_path,
            supervisor: SupervisorPolicy::default(),
            controller: ControllerPolicy::default(),
            tunnel: TunnelPolicy::default(),
            locator: ExecutableLocator::default(),
        })
    }
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    pub config: Arc<dyn ConfigStore>,
    pub config_path: PathBuf,
    pub events: EventBus,
    pub runtime: Arc<RuntimeController>,
    pub pod: Arc<PodSupervisor>,
    pub tunnel: Arc<TunnelClient>,
    pub locator: ExecutableLocator,
}

/// Compose the CLI context.
pub fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let store: Arc<dyn ConfigStore> = Arc::new(JsonFileConfigStore::new(&config.config_path));
    let events = EventBus::new();
    let emitter: Arc<dyn EventEmitter> = Arc::new(events.clone());

    let runtime = Arc::new(
        RuntimeController::new(Arc::clone(&store), Arc::clone(&emitter), config.controller)
            .context("Failed to create runtime controller")?,
    );

    let pod = Arc::new(PodSupervisor::new(
        Arc::clone(&store),
        Arc::clone(&emitter),
        config.locator.clone(),
        config.supervisor,
    ));

    let transport: Arc<dyn TunnelTransport> = Arc::new(WebSocketTransport::new());
    let inference: Arc<dyn InferencePort> = Arc::clone(&runtime) as Arc<dyn InferencePort>;
    let tunnel = Arc::new(TunnelClient::new(
        transport,
        inference,
        Arc::clone(&store),
        emitter,
        config.tunnel,
    ));

    Ok(CliContext {
        config: store,
        config_path: config.config_path,
        events,
        runtime,
        pod,
        tunnel,
        locator: config.locator,
    })
}
