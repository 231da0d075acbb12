//! `linkstat check` - probe a batch of links and store the result

use anyhow::Result;
use colored::Colorize;
use linkstat_core::{LinkRequest, ProcessingService};

use crate::output::{OutputFormat, print_json, print_status_map};

pub async fn execute(
    service: &ProcessingService,
    urls: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let result = service.submit_links(LinkRequest::new(urls)).await?;

    match format {
        OutputFormat::Text => {
            println!("{} #{}", "Stored as".bright_black(), result.number.to_string().bold());
            print_status_map(&result.links);
        },
        OutputFormat::Json => print_json(&result)?,
    }
    Ok(())
}
