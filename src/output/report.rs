//! Run and per-combination reports
//!
//! A `CombinationReport` is produced for every combination the orchestrator
//! schedules; the `RunReport` collects them in scheduling order.

use crate::model::{Combination, ScrapeResult};
use crate::storage::RunStatus;
use chrono::{DateTime, Utc};
use std::fmt;

/// Final status of one combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombinationStatus {
    /// The writer replaced the stored set
    Written,

    /// Pages were fetched but the writer failed
    WriteFailed,

    /// Not a single page was fetched; the stored set was left alone
    NothingFetched,

    /// The combination task panicked
    Panicked,
}

impl CombinationStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::WriteFailed => "write_failed",
            Self::NothingFetched => "nothing_fetched",
            Self::Panicked => "panicked",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "written" => Some(Self::Written),
            "write_failed" => Some(Self::WriteFailed),
            "nothing_fetched" => Some(Self::NothingFetched),
            "panicked" => Some(Self::Panicked),
            _ => None,
        }
    }
}

impl fmt::Display for CombinationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Written => "written",
            Self::WriteFailed => "write failed",
            Self::NothingFetched => "nothing fetched",
            Self::Panicked => "panicked",
        };
        f.write_str(label)
    }
}

/// Outcome of one combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinationReport {
    pub combination: Combination,
    pub status: CombinationStatus,
    pub entries_written: usize,
    pub pages_fetched: u32,
    pub pages_failed: u32,
    pub incomplete_entries: usize,
    pub parse_failures: usize,

    /// Expected last page from the first page's hint
    pub expected_pages: Option<u32>,

    /// Page at which the walk stopped before the expected last page
    pub stopped_early_at: Option<u32>,

    pub cancelled: bool,

    /// Write error, panic message, or first page failure
    pub error: Option<String>,
}

impl CombinationReport {
    /// Builds a report from a finished scrape result
    ///
    /// # Arguments
    ///
    /// * `result` - The aggregated result of the combination
    /// * `status` - What happened when the result was handed to the writer
    /// * `entries_written` - Entries the writer stored (0 unless written)
    /// * `error` - Error text to keep with the report
    pub fn from_result(
        result: &ScrapeResult,
        status: CombinationStatus,
        entries_written: usize,
        error: Option<String>,
    ) -> Self {
        let error = error.or_else(|| result.failed_pages.first().map(|f| f.error.clone()));
        Self {
            combination: result.combination.clone(),
            status,
            entries_written,
            pages_fetched: result.pages_fetched,
            pages_failed: result.pages_failed(),
            incomplete_entries: result.incomplete_count(),
            parse_failures: result.parse_failures.len(),
            expected_pages: result.expected_pages,
            stopped_early_at: result.stopped_early_at,
            cancelled: result.cancelled,
            error,
        }
    }

    /// Report for a combination whose task panicked
    pub fn panicked(combination: Combination, message: impl Into<String>) -> Self {
        Self {
            combination,
            status: CombinationStatus::Panicked,
            entries_written: 0,
            pages_fetched: 0,
            pages_failed: 0,
            incomplete_entries: 0,
            parse_failures: 0,
            expected_pages: None,
            stopped_early_at: None,
            cancelled: false,
            error: Some(message.into()),
        }
    }

    /// Returns true if the combination failed
    ///
    /// A combination that fetched nothing because the run was cancelled
    /// before it started is not a failure.
    pub fn is_failure(&self) -> bool {
        match self.status {
            CombinationStatus::Written => false,
            CombinationStatus::NothingFetched => !self.cancelled,
            CombinationStatus::WriteFailed | CombinationStatus::Panicked => true,
        }
    }
}

/// Summary of a whole run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Option<i64>,
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub combinations: Vec<CombinationReport>,
}

impl RunReport {
    pub fn new(config_hash: impl Into<String>) -> Self {
        Self {
            run_id: None,
            config_hash: config_hash.into(),
            started_at: Utc::now(),
            finished_at: None,
            cancelled: false,
            combinations: Vec::new(),
        }
    }

    /// Stamps the finish time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    pub fn total_entries(&self) -> usize {
        self.combinations.iter().map(|c| c.entries_written).sum()
    }

    pub fn total_pages_fetched(&self) -> u32 {
        self.combinations.iter().map(|c| c.pages_fetched).sum()
    }

    pub fn total_pages_failed(&self) -> u32 {
        self.combinations.iter().map(|c| c.pages_failed).sum()
    }

    pub fn total_incomplete(&self) -> usize {
        self.combinations.iter().map(|c| c.incomplete_entries).sum()
    }

    pub fn total_parse_failures(&self) -> usize {
        self.combinations.iter().map(|c| c.parse_failures).sum()
    }

    pub fn failed_count(&self) -> usize {
        self.combinations.iter().filter(|c| c.is_failure()).count()
    }

    pub fn written_count(&self) -> usize {
        self.combinations
            .iter()
            .filter(|c| c.status == CombinationStatus::Written)
            .count()
    }

    /// Returns true if the run had combinations and every one of them failed
    pub fn all_failed(&self) -> bool {
        !self.combinations.is_empty() && self.combinations.iter().all(|c| c.is_failure())
    }

    /// Status recorded in the run ledger
    pub fn run_status(&self) -> RunStatus {
        if self.cancelled {
            RunStatus::Interrupted
        } else if self.all_failed() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        }
    }
}

/// Prints a run report to stdout
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_report(report: &RunReport) {
    println!("=== Scrape Report ===\n");

    println!("Overview:");
    println!("  Combinations: {}", report.combinations.len());
    println!("  Written: {}", report.written_count());
    println!("  Failed: {}", report.failed_count());
    println!("  Entries written: {}", report.total_entries());
    println!(
        "  Pages fetched: {} ({} failed)",
        report.total_pages_fetched(),
        report.total_pages_failed()
    );
    println!("  Incomplete entries: {}", report.total_incomplete());
    println!("  Parse failures: {}", report.total_parse_failures());
    if let Some(seconds) = report.duration_seconds() {
        println!("  Duration: {}s", seconds);
    }
    if report.cancelled {
        println!("  Run was cancelled; partial results were written");
    }
    println!();

    println!("Combinations:");
    for c in &report.combinations {
        let mut notes = Vec::new();
        if let Some(page) = c.stopped_early_at {
            match c.expected_pages {
                Some(expected) => notes.push(format!("stopped early at page {} of {}", page, expected)),
                None => notes.push(format!("stopped early at page {}", page)),
            }
        }
        if c.cancelled {
            notes.push("cancelled".to_string());
        }
        if let Some(error) = &c.error {
            notes.push(error.clone());
        }

        println!(
            "  {:<24} {:<16} {:>5} entries  {:>3} pages  {:>3} failed  {:>3} incomplete{}",
            c.combination.to_string(),
            c.status.to_string(),
            c.entries_written,
            c.pages_fetched,
            c.pages_failed,
            c.incomplete_entries,
            if notes.is_empty() {
                String::new()
            } else {
                format!("  ({})", notes.join("; "))
            }
        );
    }
}
