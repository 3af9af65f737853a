//! JSON file output writer
//!
//! Writes one JSON document per combination at
//! `<dir>/<language>/<source>/<letter>.json`. Each document is a top-level
//! array of entry records.

use crate::model::{Combination, DictionaryEntry};
use crate::output::traits::{check_entries, OutputWriter, WriteError, WriteResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// One entry as serialized to the flat-file artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDocument {
    pub headword: String,
    pub translations: Vec<String>,
    pub links: Vec<Option<String>>,
    pub variants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sense_index: Option<u32>,
    pub language: String,
    pub letter: String,
    pub source_language: String,
    pub incomplete: bool,
}

impl From<&DictionaryEntry> for EntryDocument {
    fn from(entry: &DictionaryEntry) -> Self {
        Self {
            headword: entry.headword.clone(),
            translations: entry.translations.iter().map(|t| t.word.clone()).collect(),
            links: entry.translations.iter().map(|t| t.link.clone()).collect(),
            variants: entry.variants.clone(),
            part_of_speech: entry.part_of_speech.clone(),
            sense_index: entry.sense_index,
            language: entry.language.clone(),
            letter: entry.letter.clone(),
            source_language: entry.source_language.code().to_string(),
            incomplete: entry.incomplete,
        }
    }
}

/// Writes combination sets as JSON files
///
/// The document is written to a temporary file in the destination directory
/// and renamed over the target, so a reader sees the old file or the new one.
pub struct JsonFileWriter {
    root: PathBuf,
}

impl JsonFileWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the document for a combination
    pub fn path_for(&self, combination: &Combination) -> PathBuf {
        self.root
            .join(&combination.language)
            .join(combination.source.code())
            .join(format!("{}.json", combination.letter))
    }

    fn write_atomically(path: &Path, documents: &[EntryDocument]) -> WriteResult<()> {
        let dir = path
            .parent()
            .ok_or_else(|| WriteError::io(path.display(), "path has no parent directory"))?;
        fs::create_dir_all(dir).map_err(|e| WriteError::io(dir.display(), e))?;

        let temp = NamedTempFile::new_in(dir).map_err(|e| WriteError::io(dir.display(), e))?;
        {
            let mut out = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut out, documents)
                .map_err(|e| WriteError::io(path.display(), e))?;
            out.flush().map_err(|e| WriteError::io(path.display(), e))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|e| WriteError::io(path.display(), e))?;

        temp.persist(path)
            .map_err(|e| WriteError::io(path.display(), e.error))?;
        Ok(())
    }
}

impl OutputWriter for JsonFileWriter {
    fn name(&self) -> &str {
        "json"
    }

    fn write(&self, combination: &Combination, entries: &[DictionaryEntry]) -> WriteResult<usize> {
        check_entries(combination, entries)?;

        let documents: Vec<EntryDocument> = entries.iter().map(EntryDocument::from).collect();
        let path = self.path_for(combination);
        Self::write_atomically(&path, &documents)?;

        tracing::debug!("Wrote {} entries to {}", documents.len(), path.display());
        Ok(documents.len())
    }
}
