//! `run`: bring up whatever the settings enable and serve until Ctrl+C.

use anyhow::Result;
use tracing::info;

use crate::bootstrap::CliContext;
use crate::orchestrator::Orchestrator;

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let orchestrator = Orchestrator::spawn(ctx);
    let report = Orchestrator::auto_start(ctx).await;

    if !report.anything_started() {
        println!("Nothing to run: no component is enabled with auto-start.");
        println!("Enable one with, for example:");
        println!("  compute-bridge config set llm.enabled true");
        println!("  compute-bridge config set llm.autoStart true");
        orchestrator.shutdown(ctx).await;
        return Ok(());
    }

    info!(
        pod = report.pod_started,
        runtime = report.health_checks,
        tunnel = report.tunnel_connected,
        "compute-bridge running, press Ctrl+C to stop"
    );
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    orchestrator.shutdown(ctx).await;
    Ok(())
}
