//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{Combination, DictionaryEntry, SourceLanguage};
use crate::output::CombinationReport;
use crate::storage::{MatchMode, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines every database operation the scraper and its lookup
/// mode need.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new scrape run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Sets the final status of a run and stamps its finish time
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Entries =====

    /// Replaces the stored entry set of one combination
    ///
    /// Runs in a single transaction: readers see either the old set or the
    /// new one, never a mix.
    ///
    /// # Arguments
    ///
    /// * `combination` - The language, letter and source language being replaced
    /// * `entries` - The new set, in order
    ///
    /// # Returns
    ///
    /// The number of entries written
    fn replace_combination(
        &mut self,
        combination: &Combination,
        entries: &[DictionaryEntry],
    ) -> StorageResult<usize>;

    /// Loads the stored entries of one combination, in page order
    fn load_combination(&self, combination: &Combination) -> StorageResult<Vec<DictionaryEntry>>;

    /// Looks up entries by headword
    ///
    /// Matching is case-insensitive on the lower-cased headword; `%` and `_`
    /// in `word` are matched literally.
    ///
    /// # Arguments
    ///
    /// * `source` - Headword language
    /// * `language_code` - Target language code (e.g. "nnh")
    /// * `word` - The headword or fragment to look up
    /// * `mode` - Exact, prefix, or substring match
    /// * `limit` - Maximum number of entries returned
    fn query(
        &self,
        source: SourceLanguage,
        language_code: &str,
        word: &str,
        mode: MatchMode,
        limit: usize,
    ) -> StorageResult<Vec<DictionaryEntry>>;

    /// Looks up entries whose translations match a vernacular word
    fn query_reverse(
        &self,
        language_code: &str,
        word: &str,
        mode: MatchMode,
        limit: usize,
    ) -> StorageResult<Vec<DictionaryEntry>>;

    fn query_exact(
        &self,
        source: SourceLanguage,
        language_code: &str,
        word: &str,
        limit: usize,
    ) -> StorageResult<Vec<DictionaryEntry>> {
        self.query(source, language_code, word, MatchMode::Exact, limit)
    }

    fn query_prefix(
        &self,
        source: SourceLanguage,
        language_code: &str,
        word: &str,
        limit: usize,
    ) -> StorageResult<Vec<DictionaryEntry>> {
        self.query(source, language_code, word, MatchMode::Prefix, limit)
    }

    fn query_contains(
        &self,
        source: SourceLanguage,
        language_code: &str,
        word: &str,
        limit: usize,
    ) -> StorageResult<Vec<DictionaryEntry>> {
        self.query(source, language_code, word, MatchMode::Contains, limit)
    }

    // ===== Reports =====

    /// Records the outcome of one combination in a run
    fn record_combination_report(&mut self, run_id: i64, report: &CombinationReport) -> StorageResult<()>;

    /// Gets the combination outcomes of a run, in recording order
    fn get_combination_reports(&self, run_id: i64) -> StorageResult<Vec<CombinationReport>>;

    // ===== Statistics =====

    /// Counts all stored entries
    fn count_entries(&self) -> StorageResult<u64>;

    /// Counts all stored translations
    fn count_translations(&self) -> StorageResult<u64>;

    /// Counts entries flagged incomplete
    fn count_incomplete_entries(&self) -> StorageResult<u64>;

    /// Entry counts grouped by (language id, source language)
    fn entry_counts_by_language(&self) -> StorageResult<Vec<(String, String, u64)>>;
}
