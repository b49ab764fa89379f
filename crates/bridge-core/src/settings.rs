//! Settings domain types and validation.
//!
//! These are the persisted configuration values read from the config store.
//! Every field has a default so a missing or partial document still loads.

use serde::{Deserialize, Serialize};
use url::Url;

/// Default control-plane URL the pod worker and tunnel connect to.
pub const DEFAULT_REMOTE_URL: &str = "https://api.computebridge.dev";

/// Default address of the local inference runtime.
pub const DEFAULT_LOCAL_RUNTIME_URL: &str = "http://localhost:11434";

/// Upper bound for the pod's concurrent workspace capacity.
pub const MAX_CAPACITY_LIMIT: u32 = 32;

/// Settings for the supervised pod worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PodSettings {
    /// Whether the pod feature is enabled at all.
    pub enabled: bool,
    /// Token the worker authenticates with. Empty means "not configured".
    pub auth_token: String,
    /// Name shown for this machine on the remote platform.
    pub display_name: String,
    /// Control-plane URL the worker connects to.
    pub remote_url: String,
    /// Maximum number of concurrent workspaces the worker may host.
    pub capacity_limit: u32,
    /// Start the worker automatically on launch.
    pub auto_start: bool,
}

impl Default for PodSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            auth_token: String::new(),
            display_name: "My Pod".to_string(),
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            capacity_limit: 2,
            auto_start: false,
        }
    }
}

impl PodSettings {
    /// Whether a non-blank auth token is configured.
    pub fn has_token(&self) -> bool {
        !self.auth_token.trim().is_empty()
    }
}

/// Settings for the local runtime bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmBridgeSettings {
    /// Whether local runtime management is enabled.
    pub enabled: bool,
    /// Base URL of the local runtime HTTP API.
    pub local_url: String,
    /// Whether local models are exposed to the remote platform over the tunnel.
    pub bridge_enabled: bool,
    /// Models to expose. Empty exposes the full discovered inventory.
    pub exposed_models: Vec<String>,
    /// Start the runtime (and tunnel, if enabled) automatically on launch.
    pub auto_start: bool,
}

impl Default for LlmBridgeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            local_url: DEFAULT_LOCAL_RUNTIME_URL.to_string(),
            bridge_enabled: false,
            exposed_models: Vec::new(),
            auto_start: false,
        }
    }
}

/// The full persisted settings document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeSettings {
    /// Pod worker settings.
    pub pod: PodSettings,
    /// Local runtime bridge settings.
    pub llm: LlmBridgeSettings,
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid remote URL '{0}': must be an http(s) or ws(s) URL")]
    InvalidRemoteUrl(String),

    #[error("Invalid local runtime URL '{0}': must be an http(s) URL")]
    InvalidLocalUrl(String),

    #[error("Capacity limit must be between 1 and 32, got {0}")]
    InvalidCapacity(u32),

    #[error("Display name cannot be empty")]
    EmptyDisplayName,

    #[error("Exposed model names cannot be empty")]
    EmptyModelName,
}

/// Validate pod settings values.
pub fn validate_pod_settings(settings: &PodSettings) -> Result<(), SettingsError> {
    match Url::parse(&settings.remote_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "ws" | "wss") => {}
        _ => return Err(SettingsError::InvalidRemoteUrl(settings.remote_url.clone())),
    }

    if !(1..=MAX_CAPACITY_LIMIT).contains(&settings.capacity_limit) {
        return Err(SettingsError::InvalidCapacity(settings.capacity_limit));
    }

    if settings.display_name.trim().is_empty() {
        return Err(SettingsError::EmptyDisplayName);
    }

    Ok(())
}

/// Validate local runtime bridge settings values.
pub fn validate_llm_settings(settings: &LlmBridgeSettings) -> Result<(), SettingsError> {
    match Url::parse(&settings.local_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => return Err(SettingsError::InvalidLocalUrl(settings.local_url.clone())),
    }

    if settings.exposed_models.iter().any(|m| m.trim().is_empty()) {
        return Err(SettingsError::EmptyModelName);
    }

    Ok(())
}

/// Validate the full settings document.
pub fn validate_settings(settings: &BridgeSettings) -> Result<(), SettingsError> {
    validate_pod_settings(&settings.pod)?;
    validate_llm_settings(&settings.llm)
}
