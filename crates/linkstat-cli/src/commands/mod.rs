//! Command implementations for the linkstat CLI
//!
//! Each command lives in its own submodule and runs against an already
//! started [`ProcessingService`].

mod check;
mod recover;
mod report;
mod status;

use anyhow::Result;
use linkstat_core::{Config, ProcessingService};

use crate::cli::Commands;
use crate::output::OutputFormat;

/// Dispatch `command` to its implementation
pub async fn execute(
    command: Commands,
    service: &ProcessingService,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    match command {
        Commands::Check { urls } => check::execute(service, urls, format).await,
        Commands::Report { numbers, output } => {
            report::execute(service, numbers, output.as_deref(), format).await
        },
        Commands::Recover { output_dir } => {
            recover::execute(service, output_dir.as_deref(), format).await
        },
        Commands::Status => status::execute(service, config, format).await,
    }
}
