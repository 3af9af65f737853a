use crate::model::SourceLanguage;
use crate::registry::{default_letters, LanguageConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the scraper
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "language")]
    pub languages: Vec<LanguageEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Minimum time between the starts of two requests, across the whole run (milliseconds)
    #[serde(rename = "min-request-interval-ms")]
    pub min_request_interval_ms: u64,

    /// Maximum number of requests in flight at once
    #[serde(rename = "max-concurrent-requests")]
    pub max_concurrent_requests: u32,

    /// Maximum number of combinations walked at once
    #[serde(rename = "max-concurrent-combinations")]
    pub max_concurrent_combinations: u32,

    /// Retries after the first attempt for transient failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    #[serde(rename = "retry-base-delay-ms")]
    pub retry_base_delay_ms: u64,

    #[serde(rename = "retry-max-delay-ms")]
    pub retry_max_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Entries per result page, used to turn an entry-count hint into a page count
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound on pages walked for one combination
    #[serde(rename = "max-pages-per-letter", default = "default_max_pages")]
    pub max_pages_per_letter: u32,
}

fn default_page_size() -> u32 {
    20
}

fn default_max_pages() -> u32 {
    500
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            min_request_interval_ms: 1000,
            max_concurrent_requests: 2,
            max_concurrent_combinations: 4,
            max_retries: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
            request_timeout_secs: 30,
            page_size: default_page_size(),
            max_pages_per_letter: default_max_pages(),
        }
    }
}

impl CrawlerConfig {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Root directory for per-combination JSON documents
    #[serde(rename = "json-dir", default)]
    pub json_dir: Option<String>,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

impl OutputConfig {
    pub fn json_dir(&self) -> Option<PathBuf> {
        self.json_dir.as_ref().map(PathBuf::from)
    }
}

/// A dictionary declared in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageEntry {
    /// Registry identifier
    pub id: String,

    pub name: String,

    /// ISO 639-3 code
    pub code: String,

    #[serde(rename = "url-template")]
    pub url_template: String,

    /// Defaults to `a`..`z`
    #[serde(default)]
    pub letters: Option<Vec<String>>,

    /// Defaults to both source languages
    #[serde(default)]
    pub sources: Option<Vec<SourceLanguage>>,
}

impl LanguageEntry {
    pub fn to_language_config(&self) -> LanguageConfig {
        LanguageConfig {
            id: self.id.clone(),
            name: self.name.clone(),
            code: self.code.clone(),
            url_template: self.url_template.clone(),
            letters: self.letters.clone().unwrap_or_else(default_letters),
            sources: self
                .sources
                .clone()
                .unwrap_or_else(|| SourceLanguage::all().to_vec()),
        }
    }
}
