//! `linkstat recover` - rerun work interrupted by a crash

use anyhow::{Context, Result};
use colored::Colorize;
use linkstat_core::{ProcessingService, RecoveredWork};
use serde_json::json;
use std::path::{Path, PathBuf};

use super::report::write_report;
use crate::output::{OutputFormat, print_json, print_status_map};

pub async fn execute(
    service: &ProcessingService,
    output_dir: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let work = service.recover_unfinished_work().await?;

    let files = match output_dir {
        Some(dir) => write_reports(dir, &work)?,
        None => Vec::new(),
    };

    match format {
        OutputFormat::Text => render_text(&work, &files, output_dir.is_some()),
        OutputFormat::Json => print_json(&json!({
            "links": work.links,
            "reports": work
                .reports
                .iter()
                .map(|r| json!({
                    "description": r.description,
                    "generated_at": r.generated_at,
                    "entries": r.entries(),
                }))
                .collect::<Vec<_>>(),
            "files": files.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        }))?,
    }
    Ok(())
}

fn write_reports(dir: &Path, work: &RecoveredWork) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let mut files = Vec::new();
    for (i, report) in work.reports.iter().enumerate() {
        if report.is_empty() {
            continue;
        }
        let path = dir.join(format!("report-{}.pdf", i + 1));
        write_report(&path, report)?;
        files.push(path);
    }
    Ok(files)
}

fn render_text(work: &RecoveredWork, files: &[PathBuf], to_files: bool) {
    if work.is_placeholder() {
        println!("{}", work.reports[0].description.yellow());
        return;
    }

    for result in &work.links {
        println!("{} #{}", "Rerun stored as".bright_black(), result.number.to_string().bold());
        print_status_map(&result.links);
    }
    for report in &work.reports {
        if report.is_empty() {
            println!("{}", report.description.yellow());
        } else if !to_files {
            print!("{}", report.text());
        }
    }
    for path in files {
        println!("{} {}", "Report written to".green(), path.display());
    }
}
