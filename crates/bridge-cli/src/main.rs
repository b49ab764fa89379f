//! CLI entry point.
//!
//! Parses arguments, composes the context through [`bootstrap`] and routes
//! each command to its handler.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use bridge_cli::{Cli, CliConfig, Commands, PodCommand, bootstrap, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = CliConfig::with_defaults(cli.config)?;
    let ctx = bootstrap(config)?;

    match command {
        Commands::Run => handlers::run::execute(&ctx).await?,
        Commands::Status { json } => handlers::status::execute(&ctx, json).await?,
        Commands::Models => handlers::models::list(&ctx).await?,
        Commands::Pull { model } => handlers::models::pull(&ctx, &model).await?,
        Commands::Rm { model } => handlers::models::remove(&ctx, &model).await?,
        Commands::Chat {
            model,
            prompt,
            system,
        } => handlers::chat::execute(&ctx, model, &prompt, system).await?,
        Commands::Pod { command } => match command {
            PodCommand::Run { quiet, tail } => handlers::pod::run(&ctx, quiet, tail).await?,
            PodCommand::Args => handlers::pod::args(&ctx).await?,
        },
        Commands::Config { command } => handlers::config::execute(&ctx, command).await?,
    }

    Ok(())
}
