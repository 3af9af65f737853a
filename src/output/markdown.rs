//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a run,
//! including totals, per-combination outcomes and failures.

use crate::output::report::RunReport;
use crate::output::traits::{WriteError, WriteResult};
use std::fs;
use std::path::Path;

/// Generates a markdown summary of a run
///
/// # Arguments
///
/// * `report` - The run report
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(WriteError)` - Failed to write summary
pub fn generate_markdown_summary(report: &RunReport, output_path: &Path) -> WriteResult<()> {
    let markdown = format_markdown_summary(report);

    if let Some(dir) = output_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| WriteError::io(dir.display(), e))?;
    }
    fs::write(output_path, markdown).map_err(|e| WriteError::io(output_path.display(), e))?;

    Ok(())
}

/// Formats a run report as markdown
///
/// # Arguments
///
/// * `report` - The run report
///
/// # Returns
///
/// A formatted markdown string
pub fn format_markdown_summary(report: &RunReport) -> String {
    let mut md = String::new();

    md.push_str("# Vernala Scrape Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    if let Some(run_id) = report.run_id {
        md.push_str(&format!("- **Run ID**: {}\n", run_id));
    }
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    if let Some(finished) = report.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = report.duration_seconds() {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!(
        "- **Status**: {}\n",
        report.run_status().to_db_string()
    ));
    md.push_str(&format!("- **Config Hash**: {}\n\n", report.config_hash));

    // Totals
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Combinations**: {}\n", report.combinations.len()));
    md.push_str(&format!("- **Written**: {}\n", report.written_count()));
    md.push_str(&format!("- **Failed**: {}\n", report.failed_count()));
    md.push_str(&format!("- **Entries Written**: {}\n", report.total_entries()));
    md.push_str(&format!("- **Pages Fetched**: {}\n", report.total_pages_fetched()));
    md.push_str(&format!("- **Pages Failed**: {}\n", report.total_pages_failed()));
    md.push_str(&format!(
        "- **Incomplete Entries**: {}\n",
        report.total_incomplete()
    ));
    md.push_str(&format!(
        "- **Parse Failures**: {}\n\n",
        report.total_parse_failures()
    ));

    if report.combinations.is_empty() {
        return md;
    }

    md.push_str("## Combinations\n\n");
    md.push_str("| Language | Source | Letter | Status | Entries | Pages | Failed Pages | Incomplete | Parse Failures |\n");
    md.push_str("|----------|--------|--------|--------|---------|-------|--------------|------------|----------------|\n");
    for c in &report.combinations {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
            c.combination.language,
            c.combination.source.code(),
            c.combination.letter,
            c.status,
            c.entries_written,
            c.pages_fetched,
            c.pages_failed,
            c.incomplete_entries,
            c.parse_failures
        ));
    }
    md.push('\n');

    let early: Vec<_> = report
        .combinations
        .iter()
        .filter_map(|c| c.stopped_early_at.map(|page| (c, page)))
        .collect();
    if !early.is_empty() {
        md.push_str("## Early Stops\n\n");
        for (c, page) in early {
            match c.expected_pages {
                Some(expected) => md.push_str(&format!(
                    "- {}: empty page {} of {} expected\n",
                    c.combination, page, expected
                )),
                None => md.push_str(&format!("- {}: empty page {}\n", c.combination, page)),
            }
        }
        md.push('\n');
    }

    let failures: Vec<_> = report
        .combinations
        .iter()
        .filter_map(|c| c.error.as_ref().map(|e| (c, e)))
        .collect();
    if !failures.is_empty() {
        md.push_str("## Errors\n\n");
        for (c, error) in failures {
            md.push_str(&format!("- **{}** ({}): {}\n", c.combination, c.status, error));
        }
        md.push('\n');
    }

    md
}
