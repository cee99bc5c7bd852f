use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use meteomatics_ingest::{IngestConfig, IngestService, MemorySink, scheduler, telemetry};
use tracing::{error, info, warn};

/// Hourly Meteomatics forecast ingestion into Azure Blob Storage
#[derive(Debug, Parser)]
#[command(name = "meteomatics-ingest", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Perform a single run and exit
    #[arg(long)]
    once: bool,

    /// Keep artifacts in memory instead of uploading them
    #[arg(long)]
    dry_run: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = IngestConfig::load_from_path(cli.config.clone())
        .context("Failed to load configuration")?;
    telemetry::init(&config.logging, cli.verbose)?;

    info!(
        version = meteomatics_ingest::VERSION,
        coordinates = config.coordinates.len(),
        container = %config.storage.container,
        "Starting meteomatics-ingest"
    );

    let mut service = IngestService::new(config)?;
    if cli.dry_run {
        info!("Dry run: artifacts are kept in memory");
        service = service.with_sink(Arc::new(MemorySink::new()));
    }

    if cli.once {
        if let Err(e) = service.run_once().await {
            error!(stage = %e.stage(), "Run aborted: {}", e);
        }
        return Ok(());
    }

    scheduler::run_scheduler(&service, shutdown_signal()).await?;
    Ok(())
}
