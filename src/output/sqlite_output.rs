//! SQLite-based output writer implementation
//!
//! This module provides an output writer that replaces combination sets
//! directly in the SQLite storage backend.

use crate::model::{Combination, DictionaryEntry};
use crate::output::traits::{check_entries, OutputWriter, WriteError, WriteResult};
use crate::storage::{SqliteStorage, Storage};
use std::sync::{Arc, Mutex};

/// SQLite-based output writer
///
/// Each write is a single transaction (delete the combination, insert the new
/// set), so readers on other connections see either the old set or the new
/// one.
pub struct SqliteWriter {
    storage: Arc<Mutex<SqliteStorage>>,
}

impl SqliteWriter {
    /// Creates a new SQLite output writer
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage backend to write to, shared with the run ledger
    pub fn new(storage: Arc<Mutex<SqliteStorage>>) -> Self {
        Self { storage }
    }
}

impl OutputWriter for SqliteWriter {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn write(&self, combination: &Combination, entries: &[DictionaryEntry]) -> WriteResult<usize> {
        check_entries(combination, entries)?;

        let mut storage = self
            .storage
            .lock()
            .map_err(|e| WriteError::io("database", format!("Failed to lock storage: {}", e)))?;

        let written = storage.replace_combination(combination, entries)?;
        Ok(written)
    }
}
