//! Scrape orchestrator - fans out combinations and collects their reports
//!
//! This module contains the run loop that:
//! - Resolves the requested scope into (language, source, letter) combinations
//! - Runs combinations concurrently under a combination limit
//! - Walks, extracts and merges each combination in page order
//! - Hands each merged result to the output writer
//! - Isolates failures and panics to the combination they happen in

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::walker::{PageWalker, WalkStep};
use crate::model::{Combination, ScrapeResult, SourceLanguage};
use crate::output::{CombinationReport, CombinationStatus, OutputWriter};
use crate::registry::{LanguageConfig, LanguageRegistry};
use crate::RegistryError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// What a run should cover; empty lists mean "everything available"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeScope {
    pub languages: Vec<String>,
    pub letters: Vec<String>,
    pub sources: Vec<SourceLanguage>,
}

impl ScrapeScope {
    /// Every language, letter and source language in the registry
    pub fn all() -> Self {
        Self::default()
    }
}

/// A combination together with the site configuration used to walk it
#[derive(Debug, Clone)]
pub struct ScheduledCombination {
    pub combination: Combination,
    pub language: Arc<LanguageConfig>,
}

/// Resolves a scope into the combinations to scrape
///
/// Combinations are ordered by language id, then source language, then the
/// language's letter order. Letters and sources the language does not support
/// are skipped with a warning.
///
/// # Arguments
///
/// * `registry` - The validated language registry
/// * `scope` - Requested languages, letters and source languages
///
/// # Returns
///
/// * `Ok(Vec<ScheduledCombination>)` - The combinations, deterministic order
/// * `Err(RegistryError::NotFound)` - A requested language is unknown
pub fn resolve_scope(
    registry: &LanguageRegistry,
    scope: &ScrapeScope,
) -> Result<Vec<ScheduledCombination>, RegistryError> {
    let mut language_ids: Vec<String> = if scope.languages.is_empty() {
        registry.ids().map(str::to_string).collect()
    } else {
        scope.languages.iter().map(|l| l.trim().to_lowercase()).collect()
    };
    language_ids.sort();
    language_ids.dedup();

    let letters: Vec<String> = scope.letters.iter().map(|l| l.trim().to_lowercase()).collect();

    let mut scheduled = Vec::new();
    for id in &language_ids {
        let language = Arc::new(registry.config_for(id)?.clone());

        for source in SourceLanguage::all() {
            let requested = scope.sources.is_empty() || scope.sources.contains(&source);
            if !requested {
                continue;
            }
            if !language.supports_source(source) {
                if !scope.sources.is_empty() {
                    tracing::warn!("{} has no {} index, skipping", language.id, source.display_name());
                }
                continue;
            }

            if letters.is_empty() {
                for letter in &language.letters {
                    scheduled.push(ScheduledCombination {
                        combination: Combination::new(language.id.clone(), letter.clone(), source),
                        language: Arc::clone(&language),
                    });
                }
                continue;
            }

            for letter in language.letters.iter().filter(|l| letters.contains(l)) {
                scheduled.push(ScheduledCombination {
                    combination: Combination::new(language.id.clone(), letter.clone(), source),
                    language: Arc::clone(&language),
                });
            }
        }

        for letter in letters.iter().filter(|l| !language.supports_letter(l)) {
            tracing::warn!("{} cannot be browsed by letter '{}', skipping", language.id, letter);
        }
    }

    Ok(scheduled)
}

/// Runs combinations and collects one report for each
pub struct Orchestrator {
    fetcher: Arc<Fetcher>,
    writer: Arc<dyn OutputWriter>,
    page_size: u32,
    max_pages: u32,
    max_concurrent: usize,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `fetcher` - The run's fetcher; its gate is shared by every combination
    /// * `writer` - Receives each merged combination
    /// * `config` - Page size, page ceiling and combination limit
    /// * `cancel` - Run-wide cancellation token
    pub fn new(
        fetcher: Arc<Fetcher>,
        writer: Arc<dyn OutputWriter>,
        config: &CrawlerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            writer,
            page_size: config.page_size.max(1),
            max_pages: config.max_pages_per_letter.max(1),
            max_concurrent: (config.max_concurrent_combinations as usize).max(1),
            cancel,
        }
    }

    /// Runs every combination and returns their reports in input order
    ///
    /// Combinations start in input order, at most `max-concurrent-combinations`
    /// at a time. A panic inside one combination is reported as `Panicked`
    /// and does not affect the others.
    pub async fn run(&self, combinations: Vec<ScheduledCombination>) -> Vec<CombinationReport> {
        let total = combinations.len();
        tracing::info!(
            "Scraping {} combination(s), up to {} at a time",
            total,
            self.max_concurrent
        );

        let limiter = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let mut in_progress: HashMap<tokio::task::Id, (usize, Combination)> = HashMap::new();
        let mut reports: Vec<Option<CombinationReport>> = vec![None; total];

        for (index, scheduled) in combinations.into_iter().enumerate() {
            // Taking the slot here keeps start order equal to input order
            let slot = Arc::clone(&limiter).acquire_owned().await.ok();

            let combination = scheduled.combination.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let writer = Arc::clone(&self.writer);
            let cancel = self.cancel.clone();
            let (page_size, max_pages) = (self.page_size, self.max_pages);

            let handle = tasks.spawn(async move {
                let _slot = slot;
                scrape_combination(fetcher, scheduled, writer, page_size, max_pages, cancel).await
            });
            in_progress.insert(handle.id(), (index, combination));

            // Reap whatever already finished so reports stream into the log
            while let Some(joined) = tasks.try_join_next_with_id() {
                collect(joined, &mut in_progress, &mut reports);
            }
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            collect(joined, &mut in_progress, &mut reports);
        }

        reports.into_iter().flatten().collect()
    }
}

fn collect(
    joined: Result<(tokio::task::Id, CombinationReport), JoinError>,
    in_progress: &mut HashMap<tokio::task::Id, (usize, Combination)>,
    reports: &mut [Option<CombinationReport>],
) {
    match joined {
        Ok((id, report)) => {
            if let Some((index, _)) = in_progress.remove(&id) {
                reports[index] = Some(report);
            }
        }
        Err(join_error) => {
            if let Some((index, combination)) = in_progress.remove(&join_error.id()) {
                let message = panic_message(join_error);
                tracing::error!("{}: task failed: {}", combination, message);
                reports[index] = Some(CombinationReport::panicked(combination, message));
            }
        }
    }
}

fn panic_message(join_error: JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }
    let payload = join_error.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Walks, extracts and writes one combination
async fn scrape_combination(
    fetcher: Arc<Fetcher>,
    scheduled: ScheduledCombination,
    writer: Arc<dyn OutputWriter>,
    page_size: u32,
    max_pages: u32,
    cancel: CancellationToken,
) -> CombinationReport {
    let ScheduledCombination {
        combination,
        language,
    } = scheduled;

    tracing::debug!("{}: starting", combination);

    let mut walker = PageWalker::new(
        fetcher,
        language,
        combination.clone(),
        page_size,
        max_pages,
        cancel,
    );
    let mut result = ScrapeResult::new(combination);

    while let Some(step) = walker.next().await {
        match step {
            WalkStep::Fetched { raw, extraction } => {
                let page = raw.request.page();
                tracing::debug!(
                    "{}: page {} gave {} entries ({} parse failures)",
                    result.combination,
                    page,
                    extraction.entries.len(),
                    extraction.failures.len()
                );
                result.merge_page(page, extraction);
            }
            WalkStep::Failed { request, error } => {
                result.record_failed_page(request.page(), &error);
            }
        }
    }

    result.expected_pages = walker.expected_last();
    result.stopped_early_at = walker.stopped_early_at();
    result.cancelled = walker.was_cancelled();

    // SQLite and file writes block, so they run off the async workers
    let combination = result.combination.clone();
    match tokio::task::spawn_blocking(move || finish_combination(&result, writer.as_ref())).await {
        Ok(report) => report,
        Err(join_error) => {
            let message = panic_message(join_error);
            tracing::error!("{}: write task failed: {}", combination, message);
            CombinationReport::panicked(combination, message)
        }
    }
}

/// Hands a merged result to the writer and builds its report
///
/// A result without a single fetched page is not written, so the stored set
/// from an earlier run survives an outage.
pub fn finish_combination(result: &ScrapeResult, writer: &dyn OutputWriter) -> CombinationReport {
    if !result.has_data() {
        if result.cancelled {
            tracing::info!("{}: cancelled before any page was fetched", result.combination);
        } else {
            tracing::warn!(
                "{}: no page fetched ({} failed), keeping stored entries",
                result.combination,
                result.pages_failed()
            );
        }
        return CombinationReport::from_result(result, CombinationStatus::NothingFetched, 0, None);
    }

    match writer.write(&result.combination, &result.entries) {
        Ok(written) => {
            tracing::info!(
                "{}: wrote {} entries from {} page(s), {} failed, {} incomplete",
                result.combination,
                written,
                result.pages_fetched,
                result.pages_failed(),
                result.incomplete_count()
            );
            CombinationReport::from_result(result, CombinationStatus::Written, written, None)
        }
        Err(e) => {
            tracing::error!("{}: write failed: {}", result.combination, e);
            CombinationReport::from_result(result, CombinationStatus::WriteFailed, 0, Some(e.to_string()))
        }
    }
}
