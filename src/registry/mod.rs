//! Language registry
//!
//! Maps a language identifier to the site configuration used to build its
//! browse URLs. The registry starts from a compiled table and may be
//! extended or overridden by `[[language]]` entries in the config file.

mod language;

pub use language::{default_letters, LanguageConfig};

use crate::config::LanguageEntry;
use crate::RegistryError;
use std::collections::BTreeMap;

/// Typed catalog of the dictionaries the crawler knows about
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    languages: BTreeMap<String, LanguageConfig>,
}

impl LanguageRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled-in dictionaries
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for lang in [
            LanguageConfig::webonary("ngiemboon", "Ngiemboon", "nnh"),
            LanguageConfig::webonary("bafut", "Bafut", "bfd"),
        ] {
            registry.languages.insert(lang.id.clone(), lang);
        }
        registry
    }

    /// Builds the registry from the compiled table plus config entries
    ///
    /// Entries with an id already present replace the built-in definition.
    ///
    /// # Arguments
    ///
    /// * `entries` - `[[language]]` entries from the config file
    ///
    /// # Returns
    ///
    /// * `Ok(LanguageRegistry)` - Every language validated
    /// * `Err(RegistryError)` - A template failed validation
    pub fn with_entries(entries: &[LanguageEntry]) -> Result<Self, RegistryError> {
        let mut registry = Self::builtin();
        for entry in entries {
            let lang = entry.to_language_config();
            if registry.languages.contains_key(&lang.id) {
                tracing::info!("Config overrides built-in language '{}'", lang.id);
            }
            registry.insert(lang)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Adds or replaces a language after validating it
    pub fn insert(&mut self, lang: LanguageConfig) -> Result<(), RegistryError> {
        lang.validate()?;
        self.languages.insert(lang.id.clone(), lang);
        Ok(())
    }

    /// Looks up a language by identifier
    pub fn config_for(&self, id: &str) -> Result<&LanguageConfig, RegistryError> {
        self.languages
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Language identifiers in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.languages.keys().map(String::as_str)
    }

    pub fn languages(&self) -> impl Iterator<Item = &LanguageConfig> {
        self.languages.values()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// Validates every language; an empty registry is an error
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.languages.is_empty() {
            return Err(RegistryError::Empty);
        }
        for lang in self.languages.values() {
            lang.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceLanguage;

    #[test]
    fn test_builtin_languages() {
        let registry = LanguageRegistry::builtin();
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["bafut", "ngiemboon"]);
        assert_eq!(registry.config_for("ngiemboon").unwrap().code, "nnh");
        assert_eq!(registry.config_for("bafut").unwrap().code, "bfd");
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_unknown_language() {
        let registry = LanguageRegistry::builtin();
        assert_eq!(
            registry.config_for("klingon").unwrap_err(),
            RegistryError::NotFound("klingon".to_string())
        );
    }

    #[test]
    fn test_empty_registry_is_invalid() {
        assert_eq!(LanguageRegistry::new().validate(), Err(RegistryError::Empty));
    }

    #[test]
    fn test_config_entries_add_and_override() {
        let entries = vec![
            LanguageEntry {
                id: "testlang".to_string(),
                name: "Test".to_string(),
                code: "tst".to_string(),
                url_template: "http://127.0.0.1:9/{path}?letter={letter}&pagenr={page}".to_string(),
                letters: Some(vec!["a".to_string(), "b".to_string()]),
                sources: Some(vec![SourceLanguage::English]),
            },
            LanguageEntry {
                id: "bafut".to_string(),
                name: "Bafut (mirror)".to_string(),
                code: "bfd".to_string(),
                url_template: "https://mirror.example.org/bafut/{path}?letter={letter}&pagenr={page}"
                    .to_string(),
                letters: None,
                sources: None,
            },
        ];

        let registry = LanguageRegistry::with_entries(&entries).unwrap();
        assert_eq!(registry.len(), 3);

        let test = registry.config_for("testlang").unwrap();
        assert_eq!(test.letters, vec!["a", "b"]);
        assert!(!test.supports_source(SourceLanguage::French));

        let bafut = registry.config_for("bafut").unwrap();
        assert_eq!(bafut.name, "Bafut (mirror)");
        assert_eq!(bafut.letters.len(), 26);
    }

    #[test]
    fn test_invalid_entry_is_rejected() {
        let entries = vec![LanguageEntry {
            id: "broken".to_string(),
            name: "Broken".to_string(),
            code: "brk".to_string(),
            url_template: "https://example.org/?letter={letter}".to_string(),
            letters: None,
            sources: None,
        }];
        assert!(LanguageRegistry::with_entries(&entries).is_err());
    }
}
