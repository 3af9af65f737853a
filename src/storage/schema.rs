//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the dictionary store.

use crate::storage::traits::{StorageError, StorageResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Schema version this build reads and writes
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Schema metadata (version)
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Track scrape runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Dictionary entries, replaced as a set per combination
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    language_id TEXT NOT NULL,
    language_code TEXT NOT NULL,
    source_language TEXT NOT NULL,
    letter TEXT NOT NULL,
    position INTEGER NOT NULL,
    headword TEXT NOT NULL,
    headword_normalized TEXT NOT NULL,
    part_of_speech TEXT,
    sense_index INTEGER,
    variants TEXT NOT NULL DEFAULT '[]',
    incomplete INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_entries_combination ON entries(language_id, source_language, letter);
CREATE INDEX IF NOT EXISTS idx_entries_lookup ON entries(source_language, language_code, headword_normalized);

-- Vernacular translations of an entry, in page order
CREATE TABLE IF NOT EXISTS translations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id INTEGER NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    word TEXT NOT NULL,
    word_normalized TEXT NOT NULL,
    link TEXT
);

CREATE INDEX IF NOT EXISTS idx_translations_entry ON translations(entry_id);
CREATE INDEX IF NOT EXISTS idx_translations_word ON translations(word_normalized);

-- Per-combination outcome of each run
CREATE TABLE IF NOT EXISTS combination_reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    language_id TEXT NOT NULL,
    source_language TEXT NOT NULL,
    letter TEXT NOT NULL,
    status TEXT NOT NULL,
    entries_written INTEGER NOT NULL DEFAULT 0,
    pages_fetched INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0,
    incomplete_entries INTEGER NOT NULL DEFAULT 0,
    parse_failures INTEGER NOT NULL DEFAULT 0,
    expected_pages INTEGER,
    stopped_early_at INTEGER,
    cancelled INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_combination_reports_run ON combination_reports(run_id);
"#;

/// Initializes the database schema and checks its version
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized, version matches
/// * `Err(StorageError::SchemaMismatch)` - The database was written by another schema version
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    match get_schema_version(conn)? {
        None => {
            conn.execute(
                "INSERT INTO schema_meta (key, value) VALUES ('version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )?;
            Ok(())
        }
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(version) => Err(StorageError::SchemaMismatch(format!(
            "database schema version {} does not match expected version {}",
            version, SCHEMA_VERSION
        ))),
    }
}

/// Gets the schema version recorded in the database
pub fn get_schema_version(conn: &Connection) -> StorageResult<Option<u32>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(None),
        Some(v) => v.parse::<u32>().map(Some).map_err(|_| {
            StorageError::SchemaMismatch(format!("unreadable schema version '{}'", v))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["schema_meta", "runs", "entries", "translations", "combination_reports"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_version_mismatch_is_reported() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn.execute("UPDATE schema_meta SET value = '99' WHERE key = 'version'", [])
            .unwrap();

        assert!(matches!(
            initialize_schema(&conn),
            Err(StorageError::SchemaMismatch(_))
        ));
    }
}
