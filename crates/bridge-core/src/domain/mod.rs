//! Domain types for the bridge.

mod chat;
mod process;
mod runtime;

pub use chat::{ChatMessage, ChatRequest, ChatResponse, PullProgress, TokenCounts};
pub use process::{LogEntry, LogLevel, ProcessStatus, SupervisedProcessState};
pub use runtime::{ModelDescriptor, RuntimeState, RuntimeStatus, TunnelStatus};
