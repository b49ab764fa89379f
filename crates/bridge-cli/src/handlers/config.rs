//! `config` subcommand handlers.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use bridge_core::BridgeSettings;

use crate::bootstrap::CliContext;
use crate::commands::ConfigCommand;
use crate::settings_edit::apply_setting;

pub async fn execute(ctx: &CliContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => show(ctx).await,
        ConfigCommand::Set { key, value } => set(ctx, &key, &value).await,
        ConfigCommand::Reset { force } => reset(ctx, force).await,
        ConfigCommand::Path => {
            println!("{}", ctx.config_path.display());
            Ok(())
        }
    }
}

async fn show(ctx: &CliContext) -> Result<()> {
    let settings = ctx.config.load().await?;
    println!("{}", serde_json::to_string_pretty(&masked(settings))?);
    Ok(())
}

async fn set(ctx: &CliContext, key: &str, value: &str) -> Result<()> {
    let current = ctx.config.load().await?;
    let updated = apply_setting(&current, key, value)?;
    if updated == current {
        println!("{key} is already set to that value");
        return Ok(());
    }
    ctx.config.save(&updated).await?;
    println!("✓ Updated {key}");
    Ok(())
}

async fn reset(ctx: &CliContext, force: bool) -> Result<()> {
    if !force && !confirm("Reset all settings to their defaults?")? {
        println!("Reset cancelled");
        return Ok(());
    }
    ctx.config.save(&BridgeSettings::default()).await?;
    println!("✓ Settings reset to defaults");
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N]: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Hide all but the last four characters of the auth token.
fn masked(mut settings: BridgeSettings) -> BridgeSettings {
    let token = settings.pod.auth_token.trim();
    if !token.is_empty() {
        let count = token.chars().count();
        let tail: String = token.chars().skip(count.saturating_sub(4)).collect();
        settings.pod.auth_token = if count > 8 {
            format!("****{tail}")
        } else {
            "****".to_string()
        };
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_token() {
        let mut settings = BridgeSettings::default();
        settings.pod.auth_token = "pod_abcdefghijkl".into();
        assert_eq!(masked(settings.clone()).pod.auth_token, "****ijkl");

        settings.pod.auth_token = "short".into();
        assert_eq!(masked(settings.clone()).pod.auth_token, "****");

        settings.pod.auth_token = String::new();
        assert_eq!(masked(settings).pod.auth_token, "");
    }
}
