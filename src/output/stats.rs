//! Statistics generation from the dictionary store
//!
//! This module provides functionality for extracting and displaying
//! store statistics from the storage layer.

use crate::output::report::CombinationReport;
use crate::storage::{RunRecord, Storage, StorageResult};

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Total number of stored entries
    pub total_entries: u64,

    /// Total number of stored translations
    pub total_translations: u64,

    /// Entries without any translation
    pub incomplete_entries: u64,

    /// Entry counts by (language id, source language)
    pub by_language: Vec<(String, String, u64)>,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Combination outcomes of the most recent run
    pub latest_reports: Vec<CombinationReport>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<StoreStatistics> {
    let latest_run = storage.get_latest_run()?;
    let latest_reports = match &latest_run {
        Some(run) => storage.get_combination_reports(run.id)?,
        None => Vec::new(),
    };

    Ok(StoreStatistics {
        total_entries: storage.count_entries()?,
        total_translations: storage.count_translations()?,
        incomplete_entries: storage.count_incomplete_entries()?,
        by_language: storage.entry_counts_by_language()?,
        latest_run,
        latest_reports,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Dictionary Statistics ===\n");

    println!("Overview:");
    println!("  Total entries: {}", stats.total_entries);
    println!("  Total translations: {}", stats.total_translations);
    let percentage = if stats.total_entries > 0 {
        (stats.incomplete_entries as f64 / stats.total_entries as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "  Incomplete entries: {} ({:.1}%)",
        stats.incomplete_entries, percentage
    );
    println!();

    if !stats.by_language.is_empty() {
        println!("Entries by Language:");
        for (language, source, count) in &stats.by_language {
            println!("  {} ({}): {}", language, source, count);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  ID: {}", run.id);
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Status: {}", run.status.to_db_string());

            let failed: Vec<_> = stats.latest_reports.iter().filter(|r| r.is_failure()).collect();
            println!(
                "  Combinations: {} ({} failed)",
                stats.latest_reports.len(),
                failed.len()
            );
            for report in failed {
                println!(
                    "    - {}: {}{}",
                    report.combination,
                    report.status,
                    report
                        .error
                        .as_ref()
                        .map(|e| format!(" ({})", e))
                        .unwrap_or_default()
                );
            }
        }
        None => println!("No runs recorded yet"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Combination, DictionaryEntry, SourceLanguage, Translation};
    use crate::output::report::CombinationStatus;
    use crate::storage::SqliteStorage;

    #[test]
    fn test_load_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let combo = Combination::new("ngiemboon", "a", SourceLanguage::English);
        storage
            .replace_combination(
                &combo,
                &[
                    DictionaryEntry::new("abandon", vec![Translation::new("ńnyé", None)], "nnh", &combo),
                    DictionaryEntry::new("able", vec![], "nnh", &combo),
                ],
            )
            .unwrap();

        let run_id = storage.create_run("hash").unwrap();
        storage
            .record_combination_report(
                run_id,
                &CombinationReport::panicked(combo.clone(), "boom"),
            )
            .unwrap();

        let stats = load_statistics(&storage).unwrap();

        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.total_translations, 1);
        assert_eq!(stats.incomplete_entries, 1);
        assert_eq!(stats.by_language.len(), 1);
        assert_eq!(stats.latest_run.unwrap().id, run_id);
        assert_eq!(stats.latest_reports[0].status, CombinationStatus::Panicked);
    }

    #[test]
    fn test_empty_store() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = load_statistics(&storage).unwrap();

        assert_eq!(stats.total_entries, 0);
        assert!(stats.latest_run.is_none());
        assert!(stats.latest_reports.is_empty());
    }
}
