use crate::crawler::{Extraction, FetchError, ParseError};
use crate::model::{Combination, DictionaryEntry};

/// A page that could not be fetched, recorded as a gap in the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPage {
    pub page: u32,
    pub error: String,
}

/// Aggregated output of one combination
///
/// Owned by the orchestrator task running the combination. Pages are merged
/// in increasing page-number order, so entry order is page-then-block.
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    pub combination: Combination,

    /// Entries in page-then-block order
    pub entries: Vec<DictionaryEntry>,

    /// Pages successfully fetched (including empty ones)
    pub pages_fetched: u32,

    /// Pages that failed permanently
    pub failed_pages: Vec<FailedPage>,

    /// Blocks dropped or partially parsed
    pub parse_failures: Vec<ParseError>,

    /// Expected last page as computed from the first page's hint
    pub expected_pages: Option<u32>,

    /// Page at which the walk ended before the expected last page
    pub stopped_early_at: Option<u32>,

    /// The run was cancelled while this combination was in progress
    pub cancelled: bool,

    last_merged_page: u32,
}

impl ScrapeResult {
    pub fn new(combination: Combination) -> Self {
        Self {
            combination,
            entries: Vec::new(),
            pages_fetched: 0,
            failed_pages: Vec::new(),
            parse_failures: Vec::new(),
            expected_pages: None,
            stopped_early_at: None,
            cancelled: false,
            last_merged_page: 0,
        }
    }

    /// Merges the extraction of one fetched page
    pub fn merge_page(&mut self, page: u32, extraction: Extraction) {
        if page <= self.last_merged_page {
            tracing::warn!(
                "{}: page {} merged after page {}",
                self.combination,
                page,
                self.last_merged_page
            );
        }
        self.last_merged_page = self.last_merged_page.max(page);
        self.pages_fetched += 1;
        self.entries.extend(extraction.entries);
        self.parse_failures.extend(extraction.failures);
    }

    /// Records a page that failed permanently
    pub fn record_failed_page(&mut self, page: u32, error: &FetchError) {
        self.last_merged_page = self.last_merged_page.max(page);
        self.failed_pages.push(FailedPage {
            page,
            error: error.to_string(),
        });
    }

    pub fn pages_failed(&self) -> u32 {
        self.failed_pages.len() as u32
    }

    pub fn incomplete_count(&self) -> usize {
        self.entries.iter().filter(|e| e.incomplete).count()
    }

    /// Returns true if at least one page was fetched, so the result is worth writing
    pub fn has_data(&self) -> bool {
        self.pages_fetched > 0
    }
}
