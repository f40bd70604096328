//! Tessera Server: Application entry point.

use tessera_server::{AppContext, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tessera=info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    tracing::info!("Starting Tessera server...");

    if let Err(e) = run(ServerConfig::default()).await {
        tracing::error!(error = %e, "Tessera server failed");
        std::process::exit(1);
    }

    tracing::info!("Tessera server stopped.");
}

async fn run(config: ServerConfig) -> tessera_core::error::TesseraResult<()> {
    let ctx = AppContext::build(config).await?;

    let (startup, repair) = ctx.start().await?;
    tracing::info!(
        migrated = startup.migrated.len(),
        skipped = startup.skipped.len(),
        failed = startup.failed.len(),
        repaired = repair.repaired.len(),
        "Startup complete"
    );

    let sweeper = ctx.spawn_sweeper();

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }

    sweeper.abort();
    Ok(())
}
