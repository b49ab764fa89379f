//! Root CLI structure and global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;
use crate::config_store::CONFIG_ENV;

/// Expose local compute (an Ollama runtime and a pod worker) to the
/// compute-bridge platform.
#[derive(Parser)]
#[command(name = "compute-bridge")]
#[command(about = "Share local LLM compute with the compute-bridge platform")]
#[command(version)]
pub struct Cli {
    /// Settings file to use instead of the per-user default
    #[arg(long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{ConfigCommand, PodCommand};
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "compute-bridge",
            "--verbose",
            "--config",
            "/tmp/bridge.json",
            "status",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/bridge.json")));
        assert!(matches!(cli.command, Some(Commands::Status { json: false })));
    }

    #[test]
    fn test_chat_prompt_words_are_joined_later() {
        let cli = Cli::parse_from(["compute-bridge", "chat", "llama3", "why", "is", "the", "sky", "blue"]);
        let Some(Commands::Chat { model, prompt, system }) = cli.command else {
            panic!("expected chat");
        };
        assert_eq!(model, "llama3");
        assert_eq!(prompt, vec!["why", "is", "the", "sky", "blue"]);
        assert_eq!(system, None);
    }

    #[test]
    fn test_nested_subcommands() {
        let cli = Cli::parse_from(["compute-bridge", "pod", "run", "--quiet", "--tail", "5"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Pod {
                command: PodCommand::Run { quiet: true, tail: 5 }
            })
        ));

        let cli = Cli::parse_from(["compute-bridge", "config", "set", "pod.capacityLimit", "4"]);
        let Some(Commands::Config {
            command: ConfigCommand::Set { key, value },
        }) = cli.command
        else {
            panic!("expected config set");
        };
        assert_eq!(key, "pod.capacityLimit");
        assert_eq!(value, "4");
    }
}
