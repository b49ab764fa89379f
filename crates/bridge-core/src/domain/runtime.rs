//! Local runtime status and model inventory types.

use serde::{Deserialize, Serialize};

/// Believed state of the local inference runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeState {
    /// No probe has completed yet.
    #[default]
    Checking,
    /// The runtime answered its inventory endpoint.
    Running,
    /// Unreachable, but the runtime binary is installed.
    Stopped,
    /// Unreachable and the runtime binary was not found.
    NotInstalled,
}

/// Status of the tunnel connection to the remote platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Checking => "checking",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::NotInstalled => "not_installed",
        })
    }
}

impl std::fmt::Display for TunnelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        })
    }
}

/// A model as reported by the local runtime's inventory call.
///
/// Fields are taken verbatim from the runtime and not validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Model tag, e.g. `llama3:latest`.
    pub name: String,
    /// Size on disk in bytes.
    pub size_bytes: u64,
    /// Content digest reported by the runtime.
    pub content_digest: String,
    /// Last modification time as reported (RFC 3339 string).
    pub modified_at: String,
    /// Optional capability metadata (family, parameter size, quantization...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Snapshot of the runtime bridge, recomputed on every poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStatus {
    /// Believed runtime state.
    pub status: RuntimeState,
    /// Runtime version, when the version endpoint answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Installed models, in inventory order.
    pub models: Vec<ModelDescriptor>,
    /// Current tunnel status.
    pub tunnel_status: TunnelStatus,
    /// Inference requests answered over the tunnel.
    pub requests_served: u64,
    /// Prompt plus completion tokens served over the tunnel.
    pub tokens_served: u64,
}

impl RuntimeStatus {
    /// Names of all installed models.
    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }
}
