use crate::model::{Combination, SourceLanguage};

/// A vernacular rendering of a headword
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// The vernacular word, normalized
    pub word: String,

    /// Link to the word's entry page on the dictionary site
    pub link: Option<String>,
}

impl Translation {
    pub fn new(word: impl Into<String>, link: Option<String>) -> Self {
        Self {
            word: word.into(),
            link,
        }
    }
}

/// A normalized dictionary record
///
/// The headword and language code are always present. An entry whose page
/// block carried no usable translation is kept with an empty list and marked
/// incomplete, so consumers can tell "no data" apart from "not scraped".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    /// Headword in the source language
    pub headword: String,

    /// Translations in page order
    pub translations: Vec<Translation>,

    /// Alternative spellings listed for the entry
    pub variants: Vec<String>,

    pub part_of_speech: Option<String>,

    /// Homograph number disambiguating identical headwords
    pub sense_index: Option<u32>,

    /// ISO 639-3 code of the target language (e.g. "nnh")
    pub language: String,

    pub letter: String,

    pub source_language: SourceLanguage,

    pub incomplete: bool,
}

impl DictionaryEntry {
    /// Creates an entry for a combination; `incomplete` follows the translations
    pub fn new(
        headword: impl Into<String>,
        translations: Vec<Translation>,
        language_code: impl Into<String>,
        combination: &Combination,
    ) -> Self {
        let incomplete = translations.is_empty();
        Self {
            headword: headword.into(),
            translations,
            variants: Vec::new(),
            part_of_speech: None,
            sense_index: None,
            language: language_code.into(),
            letter: combination.letter.clone(),
            source_language: combination.source,
            incomplete,
        }
    }

    /// Returns true if the entry belongs to the given combination
    pub fn belongs_to(&self, combination: &Combination) -> bool {
        self.letter == combination.letter && self.source_language == combination.source
    }

    /// Translation words in order
    pub fn words(&self) -> Vec<&str> {
        self.translations.iter().map(|t| t.word.as_str()).collect()
    }
}
