//! `linkstat report` - render a report for stored batches

use anyhow::{Context, Result};
use colored::Colorize;
use linkstat_core::{NumberRequest, ProcessingService, ReportArtifact};
use serde_json::json;
use std::path::Path;

use crate::output::{OutputFormat, print_json};

pub async fn execute(
    service: &ProcessingService,
    numbers: Vec<u64>,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let report = service.request_report(NumberRequest::new(numbers)).await?;

    let written = match output {
        Some(path) if !report.is_empty() => {
            write_report(path, &report)?;
            Some(path)
        },
        _ => None,
    };

    match format {
        OutputFormat::Text => match written {
            Some(path) => println!(
                "{} {}",
                "Report written to".green(),
                path.display().to_string().bold()
            ),
            None if report.is_empty() => println!("{}", report.description.yellow()),
            None => print!("{}", report.text()),
        },
        OutputFormat::Json => print_json(&json!({
            "description": report.description,
            "generated_at": report.generated_at,
            "entries": report.entries(),
            "output": written.map(|p| p.display().to_string()),
        }))?,
    }
    Ok(())
}

pub fn write_report(path: &Path, report: &ReportArtifact) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, &report.pdf)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
