//! Fan-out writer that hands each combination to several writers

use crate::model::{Combination, DictionaryEntry};
use crate::output::traits::{OutputWriter, WriteError, WriteResult};
use std::sync::Arc;

/// Writes every combination to each inner writer in turn
///
/// All writers are attempted even when one fails; the first error is
/// returned. Each inner write is atomic on its own.
pub struct FanoutWriter {
    writers: Vec<Arc<dyn OutputWriter>>,
}

impl FanoutWriter {
    pub fn new(writers: Vec<Arc<dyn OutputWriter>>) -> Self {
        Self { writers }
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl OutputWriter for FanoutWriter {
    fn name(&self) -> &str {
        "fanout"
    }

    fn write(&self, combination: &Combination, entries: &[DictionaryEntry]) -> WriteResult<usize> {
        let mut written = 0;
        let mut first_error: Option<WriteError> = None;

        for writer in &self.writers {
            match writer.write(combination, entries) {
                Ok(count) => written = written.max(count),
                Err(e) => {
                    tracing::warn!("{} writer failed for {}: {}", writer.name(), combination, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }
}
