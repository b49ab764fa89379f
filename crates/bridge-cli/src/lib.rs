//! Command-line front end for compute-bridge.
//!
//! `main.rs` parses arguments, calls [`bootstrap`] to compose the supervisor,
//! runtime controller and tunnel client, and dispatches to [`handlers`].
//! Nothing outside `bootstrap` constructs infrastructure.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod commands;
pub mod config_store;
pub mod handlers;
pub mod orchestrator;
pub mod parser;
pub mod presentation;
pub mod settings_edit;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{Commands, ConfigCommand, PodCommand};
pub use config_store::{CONFIG_ENV, JsonFileConfigStore, default_config_path};
pub use orchestrator::Orchestrator;
pub use parser::Cli;
