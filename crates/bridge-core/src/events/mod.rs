//! Canonical event union emitted by the supervisor, runtime controller and
//! tunnel client.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag so the IPC layer can forward them
//! unchanged:
//!
//! ```json
//! { "type": "workspaces-changed", "count": 2 }
//! ```

mod bus;

use serde::{Deserialize, Serialize};

use crate::domain::{
    LogEntry, PullProgress, RuntimeStatus, SupervisedProcessState, TunnelStatus,
};

pub use bus::{DEFAULT_EVENT_CAPACITY, EventBus, EventSubscription};

/// Component that raised an [`BridgeEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Supervisor,
    Runtime,
    Tunnel,
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Supervisor => "supervisor",
            Self::Runtime => "runtime",
            Self::Tunnel => "tunnel",
        })
    }
}

/// Events consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BridgeEvent {
    /// The supervised process state changed.
    StatusChanged { state: SupervisedProcessState },

    /// A line of worker output was captured.
    Log { entry: LogEntry },

    /// The worker reported a live remote connection.
    Connected,

    /// The worker's active workspace count changed.
    WorkspacesChanged { count: u32 },

    /// A fresh runtime status snapshot was computed.
    BridgeStatusChanged { status: RuntimeStatus },

    /// The tunnel moved to a new connection state.
    TunnelStatusChanged { status: TunnelStatus },

    /// One progress record of a model pull.
    PullProgress {
        model: String,
        progress: PullProgress,
    },

    /// A tunnelled inference request was answered.
    #[serde(rename_all = "camelCase")]
    RequestCompleted {
        request_id: String,
        model: String,
        prompt_tokens: u64,
        completion_tokens: u64,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// An asynchronously discovered failure.
    Error {
        source: EventSource,
        message: String,
    },
}

impl BridgeEvent {
    /// Convenience constructor for [`BridgeEvent::Error`].
    pub fn error(source: EventSource, message: impl Into<String>) -> Self {
        Self::Error {
            source,
            message: message.into(),
        }
    }

    /// The wire name of this event's `type` tag.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => "status-changed",
            Self::Log { .. } => "log",
            Self::Connected => "connected",
            Self::WorkspacesChanged { .. } => "workspaces-changed",
            Self::BridgeStatusChanged { .. } => "bridge-status-changed",
            Self::TunnelStatusChanged { .. } => "tunnel-status-changed",
            Self::PullProgress { .. } => "pull-progress",
            Self::RequestCompleted { .. } => "request-completed",
            Self::Error { .. } => "error",
        }
    }
}
