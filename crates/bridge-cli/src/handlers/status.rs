//! `status` command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::presentation::format_bytes;

pub async fn execute(ctx: &CliContext, json: bool) -> Result<()> {
    let settings = ctx.config.load().await?;
    let runtime = ctx.runtime.check_status().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&runtime)?);
        return Ok(());
    }

    println!("Local runtime");
    println!("  url:      {}", settings.llm.local_url);
    println!("  status:   {}", runtime.status);
    if let Some(version) = &runtime.version {
        println!("  version:  {version}");
    }
    let total: u64 = runtime.models.iter().map(|m| m.size_bytes).sum();
    println!(
        "  models:   {} ({})",
        runtime.models.len(),
        format_bytes(total)
    );
    println!(
        "  bridge:   {}",
        if settings.llm.bridge_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    println!();
    println!("Pod worker");
    println!("  enabled:  {}", settings.pod.enabled);
    println!(
        "  token:    {}",
        if settings.pod.has_token() {
            "configured"
        } else {
            "missing"
        }
    );
    println!("  name:     {}", settings.pod.display_name);
    println!("  capacity: {}", settings.pod.capacity_limit);
    match ctx.locator.locate().await {
        Some(path) => println!("  binary:   {}", path.display()),
        None => println!("  binary:   not found ({})", ctx.locator.command()),
    }
    Ok(())
}
