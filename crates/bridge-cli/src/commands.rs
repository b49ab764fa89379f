//! Subcommand definitions.

use clap::Subcommand;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the bridge in the foreground, starting whatever the settings enable
    Run,

    /// Show the local runtime status
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// List models installed in the local runtime
    Models,

    /// Download a model into the local runtime
    Pull {
        /// Model tag, e.g. "llama3" or "qwen2.5:7b"
        model: String,
    },

    /// Delete a model from the local runtime
    Rm {
        /// Model tag to delete
        model: String,
    },

    /// Send a single chat message to a local model
    Chat {
        /// Model tag to use
        model: String,
        /// Prompt text
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
        /// Optional system prompt
        #[arg(short, long)]
        system: Option<String>,
    },

    /// Manage the pod worker
    Pod {
        #[command(subcommand)]
        command: PodCommand,
    },

    /// View or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Pod worker commands.
#[derive(Subcommand)]
pub enum PodCommand {
    /// Supervise the worker in the foreground until Ctrl+C
    Run {
        /// Do not stream worker output while running
        #[arg(short, long)]
        quiet: bool,
        /// With --quiet, retained log lines to print after stopping
        #[arg(long, default_value_t = 20)]
        tail: usize,
    },
    /// Show the resolved worker executable and its launch arguments
    Args,
}

/// Settings commands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show all settings (the auth token is masked)
    Show,
    /// Change one setting, e.g. `pod.authToken abc` or `llm.exposedModels llama3,phi3`
    Set {
        /// Dotted setting key
        key: String,
        /// New value
        value: String,
    },
    /// Reset all settings to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Print the settings file location
    Path,
}
