//! Model inventory handlers: `models`, `pull`, `rm`.

use anyhow::{Result, bail};
use bridge_core::RuntimeState;

use crate::bootstrap::CliContext;
use crate::presentation::{PullProgressBar, format_bytes, print_separator, truncate_string};

/// List installed models.
pub async fn list(ctx: &CliContext) -> Result<()> {
    let status = ctx.runtime.check_status().await;
    if status.status != RuntimeState::Running {
        bail!("Local runtime is {}; start it first", status.status);
    }

    if status.models.is_empty() {
        println!("No models installed. Try: compute-bridge pull llama3");
        return Ok(());
    }

    println!("{:<40} {:>10}  {:<14} MODIFIED", "NAME", "SIZE", "DIGEST");
    print_separator(90);
    for model in &status.models {
        let digest: String = model
            .content_digest
            .trim_start_matches("sha256:")
            .chars()
            .take(12)
            .collect();
        println!(
            "{:<40} {:>10}  {:<14} {}",
            truncate_string(&model.name, 40),
            format_bytes(model.size_bytes),
            digest,
            model.modified_at.get(..10).unwrap_or(&model.modified_at),
        );
    }
    Ok(())
}

/// Pull a model with a progress bar.
pub async fn pull(ctx: &CliContext, model: &str) -> Result<()> {
    let mut bar = PullProgressBar::new(model);
    let result = ctx
        .runtime
        .pull_model(model, |progress| bar.update(progress))
        .await;
    match result {
        Ok(()) => {
            bar.finish(&format!("✓ {model} pulled"));
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            Err(e.into())
        }
    }
}

/// Delete a model.
pub async fn remove(ctx: &CliContext, model: &str) -> Result<()> {
    ctx.runtime.delete_model(model).await?;
    println!("✓ Deleted {model}");
    Ok(())
}
