//! Error taxonomy shared across the bridge.
//!
//! Direct operations (`start`, `pull_model`, `chat`, `connect`) return
//! `BridgeResult<T>`. Adapters that need a serializable outcome (IPC, CLI
//! JSON output) convert it into an [`OperationResult`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::ConfigStoreError;
use crate::settings::SettingsError;

/// Errors produced by the supervisor, runtime controller and tunnel client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// A required setting is missing or invalid. Raised before any side effect.
    #[error("{0}")]
    Configuration(String),

    /// No resolvable executable, or the local runtime is not reachable.
    #[error("{0}")]
    Unavailable(String),

    /// The child process could not be created.
    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    /// Network or timeout failure against the local runtime or the tunnel.
    #[error("Communication error: {0}")]
    Communication(String),

    /// A frame or record could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The local runtime reported a failure for a specific request.
    #[error("{0}")]
    RuntimeExecution(String),

    /// Unexpected internal condition.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Short machine-readable kind, used in event payloads.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Unavailable(_) => "unavailable",
            Self::Spawn(_) => "spawn",
            Self::Communication(_) => "communication",
            Self::Protocol(_) => "protocol",
            Self::RuntimeExecution(_) => "runtime_execution",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<SettingsError> for BridgeError {
    fn from(err: SettingsError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<ConfigStoreError> for BridgeError {
    fn from(err: ConfigStoreError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Result alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Serializable outcome of a caller-invoked operation.
///
/// Mirrors the `{ success, error }` shape consumed by the IPC layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResult {
    /// A successful outcome.
    pub const fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A failed outcome with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

impl<T> From<BridgeResult<T>> for OperationResult {
    fn from(result: BridgeResult<T>) -> Self {
        match result {
            Ok(_) => Self::ok(),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_result_from_error() {
        let result: BridgeResult<()> = Err(BridgeError::Configuration(
            "No pod token configured".to_string(),
        ));
        let outcome = OperationResult::from(result);
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("No pod token configured"));
    }

    #[test]
    fn test_operation_result_serialization() {
        let json = serde_json::to_string(&OperationResult::ok()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);

        let json = serde_json::to_string(&OperationResult::failed("boom")).unwrap();
        assert!(json.contains("\"error\":\"boom\""));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(BridgeError::Spawn("x".into()).kind(), "spawn");
        assert_eq!(
            BridgeError::RuntimeExecution("x".into()).kind(),
            "runtime_execution"
        );
    }
}
