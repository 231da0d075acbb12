//! `linkstat status` - ledger locations and counters

use anyhow::Result;
use colored::Colorize;
use linkstat_core::{Config, ProcessingService};
use serde_json::json;

use crate::output::{OutputFormat, print_json};

pub async fn execute(
    service: &ProcessingService,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let (pending_links, pending_numbers) = service.pending_counts().await?;
    let storage = &config.storage;

    match format {
        OutputFormat::Text => {
            let rows = [
                ("Data dir", storage.data_dir.display().to_string()),
                ("Completed ledger", storage.completed_path().display().to_string()),
                ("Pending links", storage.pending_links_path().display().to_string()),
                ("Pending numbers", storage.pending_numbers_path().display().to_string()),
                ("Highest number", service.max_assigned().to_string()),
                ("Pending submissions", pending_links.to_string()),
                ("Pending reports", pending_numbers.to_string()),
            ];
            for (label, value) in rows {
                println!("{} {value}", format!("{:<20}", format!("{label}:")).bright_black());
            }
            if pending_links + pending_numbers > 0 {
                println!(
                    "{}",
                    "Unfinished work found. Run `linkstat recover` to rerun it.".yellow()
                );
            }
        },
        OutputFormat::Json => print_json(&json!({
            "data_dir": storage.data_dir,
            "completed_ledger": storage.completed_path(),
            "pending_links_ledger": storage.pending_links_path(),
            "pending_numbers_ledger": storage.pending_numbers_path(),
            "max_assigned": service.max_assigned(),
            "pending_links": pending_links,
            "pending_numbers": pending_numbers,
            "durability": config.service.durability,
        }))?,
    }
    Ok(())
}
