//! Crawler module for dictionary page fetching and processing
//!
//! This module contains the core scraping logic, including:
//! - The politeness gate shared by every request of a run
//! - HTTP fetching with retry logic
//! - Pagination walking per (language, letter, source language)
//! - Entry extraction from result pages
//! - Overall run orchestration

mod extractor;
mod fetcher;
mod gate;
mod orchestrator;
mod walker;

pub use extractor::{normalize_text, parse_page, Extraction, PageSummary, PaginationHint, ParseError, ParsedPage};
pub use fetcher::{
    build_http_client, FetchError, FetchErrorKind, Fetcher, HttpTransport, RetryPolicy, Transport,
    TransportError, TransportErrorKind, TransportResponse,
};
pub use gate::{GatePermit, PolitenessGate};
pub use orchestrator::{finish_combination, resolve_scope, Orchestrator, ScheduledCombination, ScrapeScope};
pub use walker::{PageWalker, WalkStep};

use crate::config::Config;
use crate::output::{build_writer, generate_markdown_summary, RunReport};
use crate::registry::LanguageRegistry;
use crate::storage::{open_storage, Storage};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Runs a complete scrape
///
/// This is the main entry point for starting a run. It will:
/// 1. Build and validate the language registry
/// 2. Resolve the scope into combinations
/// 3. Open the store and record the run
/// 4. Build the HTTP client, gate and fetcher
/// 5. Scrape every combination and write the results
/// 6. Record combination reports and write the markdown summary
///
/// # Arguments
///
/// * `config` - The scraper configuration
/// * `config_hash` - SHA-256 of the configuration file, kept with the run
/// * `scope` - Languages, letters and source languages to scrape
/// * `cancel` - Cancels the run cooperatively (e.g. on Ctrl-C)
///
/// # Returns
///
/// * `Ok(RunReport)` - The run finished; individual combinations may have failed
/// * `Err(ScrapeError)` - Registry, storage or client setup failed
pub async fn run_scrape(
    config: &Config,
    config_hash: &str,
    scope: &ScrapeScope,
    cancel: CancellationToken,
) -> crate::Result<RunReport> {
    let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(client));
    run_scrape_with_transport(config, config_hash, scope, cancel, transport).await
}

/// Runs a complete scrape over the given transport
///
/// Same as [`run_scrape`], with the HTTP layer supplied by the caller.
pub async fn run_scrape_with_transport(
    config: &Config,
    config_hash: &str,
    scope: &ScrapeScope,
    cancel: CancellationToken,
    transport: Arc<dyn Transport>,
) -> crate::Result<RunReport> {
    let registry = LanguageRegistry::with_entries(&config.languages)?;
    let combinations = resolve_scope(&registry, scope)?;

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let storage = Arc::new(Mutex::new(storage));

    let mut report = RunReport::new(config_hash);
    let run_id = storage
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .create_run(config_hash)?;
    report.run_id = Some(run_id);
    tracing::info!("Starting run {} ({} combinations)", run_id, combinations.len());

    let gate = Arc::new(PolitenessGate::from_config(&config.crawler));
    let fetcher = Arc::new(Fetcher::new(
        transport,
        gate,
        RetryPolicy::from_config(&config.crawler),
    ));
    let writer = build_writer(&config.output, Arc::clone(&storage));

    let orchestrator = Orchestrator::new(fetcher, writer, &config.crawler, cancel.clone());
    report.combinations = orchestrator.run(combinations).await;
    report.cancelled = cancel.is_cancelled();
    report.finish();

    {
        let mut storage = storage.lock().unwrap_or_else(|e| e.into_inner());
        for combination in &report.combinations {
            storage.record_combination_report(run_id, combination)?;
        }
        storage.finish_run(run_id, report.run_status())?;
    }

    let summary_path = Path::new(&config.output.summary_path);
    match generate_markdown_summary(&report, summary_path) {
        Ok(()) => tracing::info!("Summary written to {}", summary_path.display()),
        Err(e) => tracing::warn!("Failed to write summary: {}", e),
    }

    tracing::info!(
        "Run {} finished: {} entries written, {} of {} combinations failed",
        run_id,
        report.total_entries(),
        report.failed_count(),
        report.combinations.len()
    );

    Ok(report)
}
