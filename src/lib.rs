//! Vernala: a polite dictionary harvester
//!
//! This crate crawls the paginated browse pages of bilingual webonary
//! dictionaries (English/French to African vernacular languages), extracts
//! normalized entries, and stores them for exact, prefix and substring lookup.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod registry;
pub mod storage;

use thiserror::Error;

/// Main error type for scrape operations
///
/// Only the conditions represented here are fatal to a whole run. Per-page and
/// per-combination failures are recorded in the run report instead.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Language registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Language registry errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown language: {0}")]
    NotFound(String),

    #[error("Invalid URL template for '{language}': {reason}")]
    InvalidTemplate { language: String, reason: String },

    #[error("No languages configured")]
    Empty,
}

/// Result type alias for scrape operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{Combination, DictionaryEntry, PageRequest, RawPage, ScrapeResult, SourceLanguage};
pub use registry::{LanguageConfig, LanguageRegistry};
