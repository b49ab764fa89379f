//! Pod worker handlers: `pod run`, `pod args`.

use anyhow::{Context, Result};
use bridge_core::{BridgeEvent, LogEntry, ProcessStatus};
use bridge_runtime::pod::worker_args;

use crate::bootstrap::CliContext;

const REDACTED: &str = "********";

/// Supervise the worker in the foreground until Ctrl+C.
pub async fn run(ctx: &CliContext, quiet: bool, tail: usize) -> Result<()> {
    // Subscribe before starting so the first status transitions are seen.
    let mut events = ctx.events.subscribe();
    ctx.pod.start().await?;
    println!("Pod worker started, press Ctrl+C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if !quiet {
                    print_event(&event);
                }
                if let BridgeEvent::StatusChanged { state } = &event {
                    // Out of restart attempts; nothing left to watch.
                    if state.status == ProcessStatus::Stopped {
                        break;
                    }
                }
            }
        }
    }

    ctx.pod.stop().await?;

    if quiet {
        for entry in ctx.pod.get_logs(Some(tail)) {
            print_entry(&entry);
        }
    }
    Ok(())
}

/// Print the resolved worker executable and its launch arguments.
pub async fn args(ctx: &CliContext) -> Result<()> {
    let settings = ctx.config.load().await?;
    match ctx.locator.locate().await {
        Some(path) => println!("{}", path.display()),
        None => println!("{} (not found)", ctx.locator.command()),
    }
    for arg in redact_token(worker_args(&settings.pod)) {
        println!("  {arg}");
    }
    Ok(())
}

fn redact_token(mut args: Vec<String>) -> Vec<String> {
    if let Some(i) = args.iter().position(|a| a == "--token") {
        if let Some(value) = args.get_mut(i + 1) {
            if !value.is_empty() {
                *value = REDACTED.to_string();
            }
        }
    }
    args
}

fn print_event(event: &BridgeEvent) {
    match event {
        BridgeEvent::Log { entry } => print_entry(entry),
        BridgeEvent::StatusChanged { state } => match &state.last_error {
            Some(error) => println!("-- status: {} ({error})", state.status),
            None => println!("-- status: {}", state.status),
        },
        BridgeEvent::Connected => println!("-- connected to remote"),
        BridgeEvent::WorkspacesChanged { count } => println!("-- active workspaces: {count}"),
        _ => {}
    }
}

fn print_entry(entry: &LogEntry) {
    println!(
        "{} {:<5} {}",
        entry.timestamp.format("%H:%M:%S"),
        entry.level.to_string(),
        entry.message
    );
}
