//! Output module for writing combination sets and run summaries
//!
//! This module handles:
//! - Idempotent, atomic replacement of a combination's entries (SQLite, JSON)
//! - Per-combination and per-run reports
//! - Markdown summaries and store statistics

mod fanout;
mod json_output;
mod markdown;
pub mod report;
mod sqlite_output;
pub mod stats;
mod traits;

pub use fanout::FanoutWriter;
pub use json_output::{EntryDocument, JsonFileWriter};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use report::{print_report, CombinationReport, CombinationStatus, RunReport};
pub use sqlite_output::SqliteWriter;
pub use stats::{load_statistics, print_statistics, StoreStatistics};
pub use traits::{check_entries, OutputWriter, WriteError, WriteResult};

use crate::config::OutputConfig;
use crate::storage::SqliteStorage;
use std::sync::{Arc, Mutex};

/// Builds the writer for a run from the output configuration
///
/// The SQLite store is always written; a JSON writer is added when
/// `json-dir` is set.
///
/// # Arguments
///
/// * `config` - The output section of the configuration
/// * `storage` - The opened store, shared with the run ledger
///
/// # Returns
///
/// The writer every combination is handed to
pub fn build_writer(config: &OutputConfig, storage: Arc<Mutex<SqliteStorage>>) -> Arc<dyn OutputWriter> {
    let sqlite: Arc<dyn OutputWriter> = Arc::new(SqliteWriter::new(storage));

    match config.json_dir() {
        Some(dir) => {
            tracing::info!("Writing JSON documents to {}", dir.display());
            Arc::new(FanoutWriter::new(vec![
                sqlite,
                Arc::new(JsonFileWriter::new(dir)) as Arc<dyn OutputWriter>,
            ]))
        }
        None => sqlite,
    }
}
