//! Local inference runtime (Ollama) integration.
//!
//! - `client` - Thin typed wrapper over the runtime's HTTP API
//! - `controller` - Reachability polling, model management, inference port
//! - `pull` - NDJSON pull progress decoding

mod client;
mod controller;
mod pull;

pub use client::OllamaClient;
pub use controller::{ControllerPolicy, DEFAULT_RUNTIME_COMMAND, RuntimeController};
pub use pull::{LineBuffer, PullEvent, PullParseError, parse_pull_line};
