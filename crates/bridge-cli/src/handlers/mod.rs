//! Command handlers.
//!
//! Handlers follow one pattern: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`.
//! They parse CLI-specific input, call the composed components, and format
//! the outcome for the terminal. They never construct infrastructure.

pub mod chat;
pub mod config;
pub mod models;
pub mod pod;
pub mod run;
pub mod status;
