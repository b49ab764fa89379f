//! Process supervision and local runtime control for compute-bridge.
//!
//! This crate holds the OS and HTTP side of the bridge:
//!
//! - [`PodSupervisor`] spawns, monitors, restarts and stops the pod worker
//! - [`RuntimeController`] tracks an independently running Ollama, manages
//!   its models and answers inference requests through [`bridge_core::InferencePort`]

#![deny(unsafe_code)]

pub mod ollama;
pub mod pod;
pub mod process;

pub use ollama::{ControllerPolicy, OllamaClient, RuntimeController};
pub use pod::{ExecutableLocator, NO_TOKEN_MESSAGE, PodSupervisor, SupervisorPolicy};
