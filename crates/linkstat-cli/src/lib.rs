//! linkstat CLI - check link reachability and regenerate reports
//!
//! Every invocation is one service lifetime: load configuration, replay the
//! completed ledger, run a single command, then shut down, which waits for
//! background persistence to reach disk before the process exits.
use anyhow::{Context, Result};
use clap::Parser;
use linkstat_core::{Config, ProcessingService};
use tracing::{debug, warn};

mod cli;
mod commands;
mod output;
mod utils;

use crate::utils::initialize_logging;
use cli::Cli;

/// Execute the linkstat CLI with the currently configured environment.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded, the ledgers cannot be
/// opened, the command fails, or shutdown does not drain in time.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(&cli)?;

    let config = load_config(&cli)?;
    debug!(data_dir = %config.storage.data_dir.display(), "configuration loaded");

    let service = ProcessingService::open(&config)
        .await
        .with_context(|| {
            format!(
                "Failed to open ledgers in {}",
                config.storage.data_dir.display()
            )
        })?;

    let outcome = commands::execute(cli.command, &service, &config, cli.format).await;

    let drained = service.shutdown(config.service.shutdown_timeout()).await;
    if let Err(e) = &drained {
        warn!("shutdown did not finish cleanly: {e}");
    }

    outcome?;
    drained.context("Background persistence did not finish before shutdown timeout")?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir.clone_from(dir);
    }
    Ok(config)
}
