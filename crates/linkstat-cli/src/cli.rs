//! # CLI Structure and Argument Parsing
//!
//! The command-line interface for `linkstat`, built with `clap` derive macros.
//!
//! ## Usage Patterns
//!
//! ```bash
//! # Probe a batch of links and store the result
//! linkstat check example.com https://example.org/docs
//!
//! # Render a report for previously stored batches
//! linkstat report 1 2 --output report.pdf
//!
//! # Rerun whatever a crash left unfinished
//! linkstat recover --output-dir recovered/
//!
//! # Inspect the ledgers
//! linkstat status --format json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Main CLI structure for the `linkstat` command
#[derive(Parser, Clone, Debug)]
#[command(name = "linkstat")]
#[command(version)]
#[command(about = "linkstat - Link reachability checks with crash recovery", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable all ANSI colors in output (also respects `NO_COLOR` env)
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Path to configuration file (overrides autodiscovery). Also via `LINKSTAT_CONFIG`.
    #[arg(long, global = true, value_name = "FILE", env = "LINKSTAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the ledger files. Also via `LINKSTAT_DATA_DIR`.
    #[arg(long = "data-dir", global = true, value_name = "DIR", env = "LINKSTAT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

/// Available subcommands for the `linkstat` CLI
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Probe links and store their statuses under a new number
    Check {
        /// URLs to probe; `https://` is assumed when no scheme is given
        #[arg(value_name = "URL", required = true)]
        urls: Vec<String>,
    },

    /// Render a report for previously assigned numbers
    Report {
        /// Numbers printed by `linkstat check`
        #[arg(value_name = "N", required = true)]
        numbers: Vec<u64>,

        /// Write the report as a PDF to this file instead of printing it
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Rerun submissions and reports interrupted by a crash
    Recover {
        /// Write each regenerated report into this directory as a PDF
        #[arg(long = "output-dir", value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Show ledger locations, the highest assigned number and pending work
    Status,
}
