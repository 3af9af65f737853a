use crate::config::types::{Config, CrawlerConfig, LanguageEntry, OutputConfig, UserAgentConfig};
use crate::{ConfigError, ConfigResult};
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_language_entries(&config.languages)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    if config.min_request_interval_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "min_request_interval_ms must be >= 100ms, got {}ms",
            config.min_request_interval_ms
        )));
    }

    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 16 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be between 1 and 16, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.max_concurrent_combinations < 1 || config.max_concurrent_combinations > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_combinations must be between 1 and 64, got {}",
            config.max_concurrent_combinations
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if config.retry_base_delay_ms < 1 {
        return Err(ConfigError::Validation(
            "retry_base_delay_ms must be >= 1ms".to_string(),
        ));
    }

    if config.retry_max_delay_ms < config.retry_base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry_max_delay_ms ({}) must be >= retry_base_delay_ms ({})",
            config.retry_max_delay_ms, config.retry_base_delay_ms
        )));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be between 1 and 300, got {}",
            config.request_timeout_secs
        )));
    }

    if config.page_size < 1 {
        return Err(ConfigError::Validation("page_size must be >= 1".to_string()));
    }

    if config.max_pages_per_letter < 1 {
        return Err(ConfigError::Validation(
            "max_pages_per_letter must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    if matches!(config.json_dir.as_deref(), Some("")) {
        return Err(ConfigError::Validation(
            "json_dir cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates `[[language]]` entries
fn validate_language_entries(entries: &[LanguageEntry]) -> ConfigResult<()> {
    let mut seen = HashSet::new();

    for entry in entries {
        if !seen.insert(entry.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Language '{}' is declared more than once",
                entry.id
            )));
        }

        if entry.letters.as_ref().is_some_and(|letters| {
            letters.iter().any(|l| l.trim().is_empty())
        }) {
            return Err(ConfigError::Validation(format!(
                "Language '{}' has an empty letter",
                entry.id
            )));
        }

        entry
            .to_language_config()
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> ConfigResult<()> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
