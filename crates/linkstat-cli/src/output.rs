//! Output format selection and shared printing helpers.

use anyhow::Result;
use colored::{ColoredString, Colorize};
use linkstat_core::{LinkStatus, StatusMap};
use serde::Serialize;

/// Output format options supported by every command
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    Text,
    /// Pretty-printed JSON
    Json,
}

impl OutputFormat {
    pub const fn is_machine(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn status_badge(status: LinkStatus) -> ColoredString {
    match status {
        LinkStatus::Available => status.as_str().green(),
        LinkStatus::Unavailable => status.as_str().red(),
    }
}

/// One indented `url  status` line per entry
pub fn print_status_map(links: &StatusMap) {
    let width = links.keys().map(String::len).max().unwrap_or(0);
    for (url, status) in links {
        println!("  {url:<width$}  {}", status_badge(*status));
    }
}
