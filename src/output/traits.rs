//! Output writer traits and types
//!
//! This module defines the trait interface for output writers and the
//! error type shared by every writer.

use crate::model::{Combination, DictionaryEntry};
use crate::storage::StorageError;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while writing a combination
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("Failed to write {target}: {message}")]
    IoFailure { target: String, message: String },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
}

impl WriteError {
    /// Builds an `IoFailure` for a target from any displayable cause
    pub fn io(target: impl fmt::Display, cause: impl fmt::Display) -> Self {
        Self::IoFailure {
            target: target.to_string(),
            message: cause.to_string(),
        }
    }
}

impl From<StorageError> for WriteError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SchemaMismatch(msg) => Self::SchemaMismatch(msg),
            other => Self::io("database", other),
        }
    }
}

/// Result type for output operations
pub type WriteResult<T> = Result<T, WriteError>;

/// Trait for output writers
///
/// A writer replaces the stored set of one combination with a new set.
/// Writing the same set twice leaves the same result as writing it once, and
/// a reader never observes a mix of the old and the new set. Implementations
/// must be thread-safe; combinations are written from concurrent tasks.
pub trait OutputWriter: Send + Sync {
    /// Short name used in logs (e.g. "sqlite", "json")
    fn name(&self) -> &str;

    /// Replaces the stored entries of a combination
    ///
    /// # Arguments
    ///
    /// * `combination` - The language, letter and source language being written
    /// * `entries` - The complete new set, in page order
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of entries written
    /// * `Err(WriteError)` - Nothing was replaced
    fn write(&self, combination: &Combination, entries: &[DictionaryEntry]) -> WriteResult<usize>;
}

/// Checks that every entry belongs to the combination being written
pub fn check_entries(combination: &Combination, entries: &[DictionaryEntry]) -> WriteResult<()> {
    match entries.iter().position(|e| !e.belongs_to(combination)) {
        None => Ok(()),
        Some(index) => {
            let entry = &entries[index];
            Err(WriteError::SchemaMismatch(format!(
                "entry {} ('{}', {}/{}) does not belong to {}",
                index, entry.headword, entry.source_language, entry.letter, combination
            )))
        }
    }
}
