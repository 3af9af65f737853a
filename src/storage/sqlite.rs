//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::crawler::normalize_text;
use crate::model::{Combination, DictionaryEntry, SourceLanguage, Translation};
use crate::output::{CombinationReport, CombinationStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{MatchMode, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const ENTRY_COLUMNS: &str = "e.id, e.language_code, e.source_language, e.letter, e.headword, \
     e.part_of_speech, e.sense_index, e.variants, e.incomplete";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

/// Columns of `ENTRY_COLUMNS` in select order
type RawEntryRow = (i64, String, String, String, String, Option<String>, Option<u32>, String, bool);

/// An entry row before its translations are attached
struct EntryRow {
    id: i64,
    entry: DictionaryEntry,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database, or its schema version differs
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // WAL lets lookups read the previous set while a combination is replaced
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn map_entry_row(row: &Row<'_>) -> rusqlite::Result<RawEntryRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
        ))
    }

    /// Runs an entry query and attaches translations to each result
    fn load_entries(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> StorageResult<Vec<DictionaryEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raw_rows = stmt
            .query_map(params, Self::map_entry_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(raw_rows.len());
        for (id, code, source, letter, headword, pos, sense, variants, incomplete) in raw_rows {
            let source_language = SourceLanguage::from_code(&source).ok_or_else(|| {
                StorageError::Serialization(format!("unknown source language '{}' in entry {}", source, id))
            })?;
            let variants: Vec<String> = serde_json::from_str(&variants)
                .map_err(|e| StorageError::Serialization(format!("entry {} variants: {}", id, e)))?;

            rows.push(EntryRow {
                id,
                entry: DictionaryEntry {
                    headword,
                    translations: Vec::new(),
                    variants,
                    part_of_speech: pos,
                    sense_index: sense,
                    language: code,
                    letter,
                    source_language,
                    incomplete,
                },
            });
        }

        let mut translation_stmt = self.conn.prepare_cached(
            "SELECT word, link FROM translations WHERE entry_id = ?1 ORDER BY position",
        )?;

        let mut entries = Vec::with_capacity(rows.len());
        for mut row in rows {
            row.entry.translations = translation_stmt
                .query_map(params![row.id], |r| Ok(Translation::new(r.get::<_, String>(0)?, r.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            entries.push(row.entry);
        }

        Ok(entries)
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Lower-cased, normalized form used for case-insensitive matching
pub(crate) fn lookup_key(word: &str) -> String {
    normalize_text(word).to_lowercase()
}

/// Escapes LIKE wildcards so user input matches literally (with `ESCAPE '\'`)
pub(crate) fn escape_like(word: &str) -> String {
    let mut escaped = String::with_capacity(word.len());
    for c in word.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Builds the comparison clause and bound value for a match mode
fn match_clause(column: &str, word: &str, mode: MatchMode) -> (String, String) {
    let key = lookup_key(word);
    match mode {
        MatchMode::Exact => (format!("{} = ?", column), key),
        MatchMode::Prefix => (
            format!("{} LIKE ? ESCAPE '\\'", column),
            format!("{}%", escape_like(&key)),
        ),
        MatchMode::Contains => (
            format!("{} LIKE ? ESCAPE '\\'", column),
            format!("%{}%", escape_like(&key)),
        ),
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                map_run,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                map_run,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Entries =====

    fn replace_combination(
        &mut self,
        combination: &Combination,
        entries: &[DictionaryEntry],
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;

        // Translations go with their entries through ON DELETE CASCADE
        let removed = tx.execute(
            "DELETE FROM entries WHERE language_id = ?1 AND source_language = ?2 AND letter = ?3",
            params![combination.language, combination.source.code(), combination.letter],
        )?;

        {
            let mut insert_entry = tx.prepare_cached(
                "INSERT INTO entries (language_id, language_code, source_language, letter, position,
                 headword, headword_normalized, part_of_speech, sense_index, variants, incomplete)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            let mut insert_translation = tx.prepare_cached(
                "INSERT INTO translations (entry_id, position, word, word_normalized, link)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for (position, entry) in entries.iter().enumerate() {
                let variants = serde_json::to_string(&entry.variants)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;

                let entry_id = insert_entry.insert(params![
                    combination.language,
                    entry.language,
                    combination.source.code(),
                    combination.letter,
                    position as i64,
                    entry.headword,
                    lookup_key(&entry.headword),
                    entry.part_of_speech,
                    entry.sense_index,
                    variants,
                    entry.incomplete,
                ])?;

                for (t_position, translation) in entry.translations.iter().enumerate() {
                    insert_translation.execute(params![
                        entry_id,
                        t_position as i64,
                        translation.word,
                        lookup_key(&translation.word),
                        translation.link,
                    ])?;
                }
            }
        }

        tx.commit()?;

        tracing::debug!(
            "Replaced {} with {} entries ({} removed)",
            combination,
            entries.len(),
            removed
        );

        Ok(entries.len())
    }

    fn load_combination(&self, combination: &Combination) -> StorageResult<Vec<DictionaryEntry>> {
        let sql = format!(
            "SELECT {} FROM entries e
             WHERE e.language_id = ?1 AND e.source_language = ?2 AND e.letter = ?3
             ORDER BY e.position",
            ENTRY_COLUMNS
        );
        let source = combination.source.code();
        self.load_entries(&sql, &[&combination.language, &source, &combination.letter])
    }

    fn query(
        &self,
        source: SourceLanguage,
        language_code: &str,
        word: &str,
        mode: MatchMode,
        limit: usize,
    ) -> StorageResult<Vec<DictionaryEntry>> {
        let (clause, value) = match_clause("e.headword_normalized", word, mode);
        let sql = format!(
            "SELECT {} FROM entries e
             WHERE e.source_language = ? AND e.language_code = ? AND {}
             ORDER BY e.headword_normalized, e.id
             LIMIT ?",
            ENTRY_COLUMNS, clause
        );
        let source = source.code();
        let limit = limit as i64;
        self.load_entries(&sql, &[&source, &language_code, &value, &limit])
    }

    fn query_reverse(
        &self,
        language_code: &str,
        word: &str,
        mode: MatchMode,
        limit: usize,
    ) -> StorageResult<Vec<DictionaryEntry>> {
        let (clause, value) = match_clause("t.word_normalized", word, mode);
        let sql = format!(
            "SELECT {} FROM entries e
             WHERE e.language_code = ?
               AND e.id IN (SELECT t.entry_id FROM translations t WHERE {})
             ORDER BY e.headword_normalized, e.id
             LIMIT ?",
            ENTRY_COLUMNS, clause
        );
        let limit = limit as i64;
        self.load_entries(&sql, &[&language_code, &value, &limit])
    }

    // ===== Reports =====

    fn record_combination_report(&mut self, run_id: i64, report: &CombinationReport) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO combination_reports (run_id, language_id, source_language, letter, status,
             entries_written, pages_fetched, pages_failed, incomplete_entries, parse_failures,
             expected_pages, stopped_early_at, cancelled, error_message, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                run_id,
                report.combination.language,
                report.combination.source.code(),
                report.combination.letter,
                report.status.to_db_string(),
                report.entries_written as i64,
                report.pages_fetched,
                report.pages_failed,
                report.incomplete_entries as i64,
                report.parse_failures as i64,
                report.expected_pages,
                report.stopped_early_at,
                report.cancelled,
                report.error,
                now,
            ],
        )?;
        Ok(())
    }

    fn get_combination_reports(&self, run_id: i64) -> StorageResult<Vec<CombinationReport>> {
        let mut stmt = self.conn.prepare(
            "SELECT language_id, source_language, letter, status, entries_written, pages_fetched,
             pages_failed, incomplete_entries, parse_failures, expected_pages, stopped_early_at, cancelled,
             error_message
             FROM combination_reports WHERE run_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, Option<u32>>(9)?,
                    row.get::<_, Option<u32>>(10)?,
                    row.get::<_, bool>(11)?,
                    row.get::<_, Option<String>>(12)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(language, source, letter, status, written, fetched, failed, incomplete, parse, expected, stopped, cancelled, error)| {
                    let source = SourceLanguage::from_code(&source).ok_or_else(|| {
                        StorageError::Serialization(format!("unknown source language '{}'", source))
                    })?;
                    let status = CombinationStatus::from_db_string(&status).ok_or_else(|| {
                        StorageError::Serialization(format!("unknown combination status '{}'", status))
                    })?;
                    Ok(CombinationReport {
                        combination: Combination::new(language, letter, source),
                        status,
                        entries_written: written as usize,
                        pages_fetched: fetched,
                        pages_failed: failed,
                        incomplete_entries: incomplete as usize,
                        parse_failures: parse as usize,
                        expected_pages: expected,
                        stopped_early_at: stopped,
                        cancelled,
                        error,
                    })
                },
            )
            .collect()
    }

    // ===== Statistics =====

    fn count_entries(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM entries")
    }

    fn count_translations(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM translations")
    }

    fn count_incomplete_entries(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM entries WHERE incomplete = 1")
    }

    fn entry_counts_by_language(&self) -> StorageResult<Vec<(String, String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT language_id, source_language, COUNT(*) FROM entries
             GROUP BY language_id, source_language
             ORDER BY language_id, source_language",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }
}

fn map_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Failed),
    })
}
