//! Core domain types, events and port definitions for compute-bridge.
//!
//! This crate has no process, filesystem or network implementation details.
//! Adapters (`bridge-runtime`, `bridge-tunnel`, `bridge-cli`) depend on it and
//! implement or consume the ports defined here.
//!
//! # Structure
//!
//! - `domain` - Supervised process state, log entries, runtime status, chat envelopes
//! - `settings` - Persisted configuration types and validation
//! - `events` - Canonical event union and the broadcast event bus
//! - `ports` - Trait abstractions for the config store, event sinks and inference
//! - `error` - Error taxonomy shared across the bridge

#![deny(unsafe_code)]

pub mod domain;
pub mod error;
pub mod events;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    ChatMessage, ChatRequest, ChatResponse, LogEntry, LogLevel, ModelDescriptor, ProcessStatus,
    PullProgress, RuntimeState, RuntimeStatus, SupervisedProcessState, TokenCounts, TunnelStatus,
};
pub use error::{BridgeError, BridgeResult, OperationResult};
pub use events::{BridgeEvent, EventBus, EventSource, EventSubscription};
pub use ports::{
    ConfigStore, ConfigStoreError, EventEmitter, InMemoryConfigStore, InferencePort, NoopEmitter,
};
pub use settings::{
    BridgeSettings, DEFAULT_LOCAL_RUNTIME_URL, DEFAULT_REMOTE_URL, LlmBridgeSettings, PodSettings,
    SettingsError, validate_settings,
};
