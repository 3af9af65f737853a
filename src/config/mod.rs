//! Configuration module for the scraper
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use vernala_scraper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("vernala.toml")).unwrap();
//! println!("Minimum interval: {}ms", config.crawler.min_request_interval_ms);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, LanguageEntry, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
