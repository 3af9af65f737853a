//! Pagination walker
//!
//! Walks the result pages of one (language, letter, source language)
//! combination in increasing page order. The first page's pagination hint
//! sets the expected last page; without a hint the walk is open-ended and
//! ends at the first empty page or the configured page ceiling.

use crate::crawler::extractor::{parse_page, Extraction};
use crate::crawler::fetcher::{FetchError, FetchErrorKind, Fetcher};
use crate::model::{Combination, PageRequest, RawPage};
use crate::registry::LanguageConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One step of a walk
#[derive(Debug)]
pub enum WalkStep {
    /// A page was fetched (possibly with zero entry blocks) and extracted
    Fetched { raw: RawPage, extraction: Extraction },

    /// A page failed permanently and is a gap in the result
    Failed {
        request: PageRequest,
        error: FetchError,
    },
}

impl WalkStep {
    pub fn page(&self) -> u32 {
        match self {
            Self::Fetched { raw, .. } => raw.request.page(),
            Self::Failed { request, .. } => request.page(),
        }
    }
}

/// Pull-based page sequence for one combination
///
/// Not resumable mid-stream: create a new walker to start again from page 1.
pub struct PageWalker {
    fetcher: Arc<Fetcher>,
    language: Arc<LanguageConfig>,
    combination: Combination,
    page_size: u32,
    max_pages: u32,
    cancel: CancellationToken,

    /// The next page to request; None once the walk is over
    pending: Option<PageRequest>,

    expected_last: Option<u32>,
    stopped_early_at: Option<u32>,
    cancelled: bool,
}

impl PageWalker {
    /// Creates a walker positioned before page 1
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Shared rate-limited fetcher
    /// * `language` - Site configuration used to render page URLs
    /// * `combination` - The letter and source language to walk
    /// * `page_size` - Entries per page, to turn an entry count into a page count
    /// * `max_pages` - Ceiling on pages walked
    /// * `cancel` - Run-wide cancellation token
    pub fn new(
        fetcher: Arc<Fetcher>,
        language: Arc<LanguageConfig>,
        combination: Combination,
        page_size: u32,
        max_pages: u32,
        cancel: CancellationToken,
    ) -> Self {
        let pending = Some(PageRequest::first(combination.clone()));
        Self {
            fetcher,
            language,
            combination,
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
            cancel,
            pending,
            expected_last: None,
            stopped_early_at: None,
            cancelled: false,
        }
    }

    /// Fetches the next page
    ///
    /// # Returns
    ///
    /// * `Some(WalkStep)` - The next page, or the gap it left
    /// * `None` - The walk is over (exhausted, stopped early, or cancelled)
    pub async fn next(&mut self) -> Option<WalkStep> {
        let request = self.pending.take()?;

        if self.cancel.is_cancelled() {
            tracing::info!("{}: cancelled before page {}", self.combination, request.page());
            self.cancelled = true;
            return None;
        }

        let page = request.page();
        let url = match self
            .language
            .page_url(self.combination.source, &self.combination.letter, page)
        {
            Ok(url) => url,
            Err(e) => {
                // The template is fixed for the whole walk, so no later page can render either
                let error = FetchError::new(
                    FetchErrorKind::Permanent,
                    self.language.url_template.clone(),
                    0,
                    e.to_string(),
                );
                return Some(WalkStep::Failed { request, error });
            }
        };

        match self.fetcher.fetch(&request, &url).await {
            Ok(raw) => {
                let parsed = parse_page(&raw, &self.language);
                let summary = parsed.summary;

                if page == 1 {
                    self.expected_last = summary
                        .hint
                        .expected_last_page(self.page_size)
                        .map(|last| last.min(self.max_pages));
                    match self.expected_last {
                        Some(last) => tracing::debug!("{}: expecting {} page(s)", self.combination, last),
                        None => tracing::debug!("{}: no pagination hint, walking until empty", self.combination),
                    }
                }

                if summary.blocks == 0 {
                    if let Some(last) = self.expected_last.filter(|last| page < *last) {
                        tracing::warn!(
                            "{}: page {} is empty but {} page(s) were expected, stopping early",
                            self.combination,
                            page,
                            last
                        );
                        self.stopped_early_at = Some(page);
                    }
                } else if !self.is_last(page) {
                    self.pending = Some(request.next_page());
                }

                Some(WalkStep::Fetched {
                    raw,
                    extraction: parsed.extraction,
                })
            }
            Err(error) => {
                if page == 1 {
                    tracing::warn!(
                        "{}: first page failed, page count unknown: {}",
                        self.combination,
                        error
                    );
                } else {
                    tracing::warn!("{}: page {} failed: {}", self.combination, page, error);
                    if !self.is_last(page) {
                        self.pending = Some(request.next_page());
                    }
                }
                Some(WalkStep::Failed { request, error })
            }
        }
    }

    fn is_last(&self, page: u32) -> bool {
        page >= self.expected_last.unwrap_or(self.max_pages)
    }

    /// Expected last page from the first page's hint, once page 1 is fetched
    pub fn expected_last(&self) -> Option<u32> {
        self.expected_last
    }

    /// Page at which an unexpected empty page ended the walk
    pub fn stopped_early_at(&self) -> Option<u32> {
        self.stopped_early_at
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}
