//! Rate-limited HTTP fetcher
//!
//! This module handles all HTTP requests for the scraper, including:
//! - Building the HTTP client with a descriptive user agent
//! - Admission through the shared politeness gate
//! - Retry with exponential backoff and jitter for transient failures
//! - Error classification into transient and permanent failures

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::gate::PolitenessGate;
use crate::model::{PageRequest, RawPage};
use async_trait::async_trait;
use rand::Rng;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Whether a failure is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transient,
    Permanent,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

/// A page that could not be fetched
///
/// The fetcher only ever returns `Permanent` errors: transient ones are
/// retried and become permanent once the retry budget is spent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} failure fetching {url} after {attempts} attempt(s): {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub attempts: u32,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, url: impl Into<String>, attempts: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            attempts,
            message: message.into(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.kind == FetchErrorKind::Permanent
    }
}

/// Low-level transport failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    /// Connection refused, reset, or DNS failure
    Connect,
    /// The body could not be read or decoded
    Body,
    /// The request could not be built
    Request,
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        !matches!(self.kind, TransportErrorKind::Request)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_builder() {
            TransportErrorKind::Request
        } else if e.is_body() || e.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Connect
        };
        Self::new(kind, e.to_string())
    }
}

/// A completed HTTP exchange, whatever its status
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub final_url: String,
    pub body: String,
    /// Parsed `Retry-After` header (seconds form only)
    pub retry_after: Option<Duration>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            final_url: String::new(),
            body: body.into(),
            retry_after: None,
        }
    }
}

/// One HTTP GET
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError>;
}

/// Production transport backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await.map_err(|e| {
            TransportError::new(TransportErrorKind::Body, format!("failed to read body: {}", e))
        })?;

        Ok(TransportResponse {
            status,
            final_url,
            body,
            retry_after,
        })
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Total per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use vernala_scraper::config::UserAgentConfig;
/// use vernala_scraper::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "VernalaScraper".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Retry budget and backoff schedule
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            jitter: true,
        }
    }

    /// `base * 2^step`, capped at the maximum delay
    pub fn backoff_step(&self, step: u32) -> Duration {
        let factor = 1u32.checked_shl(step).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff step plus random jitter of up to half the step
    pub fn delay_for(&self, step: u32) -> Duration {
        let delay = self.backoff_step(step);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let half = delay / 2;
        let jitter = rand::thread_rng().gen_range(Duration::ZERO..=half);
        delay + jitter
    }
}

/// Fetches pages through the politeness gate with retry
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    gate: Arc<PolitenessGate>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, gate: Arc<PolitenessGate>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            gate,
            policy,
        }
    }

    /// Fetches one page
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Success |
    /// | 429 | Gate hold-off of one extra backoff step (at least Retry-After), then retry |
    /// | 5xx | Retry with backoff |
    /// | Timeout, connection, body error | Retry with backoff |
    /// | Other 4xx, request build error | Immediate permanent failure |
    ///
    /// # Arguments
    ///
    /// * `request` - The page being fetched
    /// * `url` - The rendered URL for that page
    ///
    /// # Returns
    ///
    /// * `Ok(RawPage)` - The page body and status
    /// * `Err(FetchError)` - Always `Permanent`, with the attempt count and last cause
    pub async fn fetch(&self, request: &PageRequest, url: &Url) -> Result<RawPage, FetchError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let retries_used = attempt - 1;

            let outcome = {
                let Some(_permit) = self.gate.acquire().await else {
                    return Err(self.permanent(url, attempt, "politeness gate closed"));
                };
                tracing::debug!("GET {} (attempt {})", url, attempt);
                self.transport.get(url).await
            };

            let (cause, delay) = match outcome {
                Ok(response) if (200..300).contains(&response.status) => {
                    let final_url = if response.final_url.is_empty() {
                        url.to_string()
                    } else {
                        response.final_url
                    };
                    return Ok(RawPage {
                        request: request.clone(),
                        url: final_url,
                        status: response.status,
                        body: response.body,
                    });
                }
                Ok(response) if response.status == StatusCode::TOO_MANY_REQUESTS.as_u16() => {
                    let mut delay = self.policy.delay_for(retries_used + 1);
                    if let Some(retry_after) = response.retry_after {
                        delay = delay.max(retry_after);
                    }
                    tracing::warn!("{} rate limited, holding all requests for {:?}", url, delay);
                    self.gate.hold_off(delay);
                    ("HTTP 429 Too Many Requests".to_string(), delay)
                }
                Ok(response) if (500..600).contains(&response.status) => (
                    format!("HTTP {}", response.status),
                    self.policy.delay_for(retries_used),
                ),
                Ok(response) => {
                    return Err(self.permanent(url, attempt, format!("HTTP {}", response.status)));
                }
                Err(e) if e.is_transient() => (e.to_string(), self.policy.delay_for(retries_used)),
                Err(e) => return Err(self.permanent(url, attempt, e.to_string())),
            };

            if retries_used >= self.policy.max_retries {
                return Err(self.permanent(url, attempt, cause));
            }

            tracing::warn!(
                "{} failed ({}), retrying in {:?} ({}/{})",
                url,
                cause,
                delay,
                retries_used + 1,
                self.policy.max_retries
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn permanent(&self, url: &Url, attempts: u32, message: impl Into<String>) -> FetchError {
        FetchError::new(FetchErrorKind::Permanent, url.as_str(), attempts, message)
    }
}
