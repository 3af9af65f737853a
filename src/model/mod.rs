//! Data model for the scrape pipeline
//!
//! # Components
//!
//! - `SourceLanguage`, `Combination`, `PageRequest`, `RawPage`: the unit of crawl
//!   work and what a single fetch produces
//! - `DictionaryEntry`, `Translation`: normalized records extracted from pages
//! - `ScrapeResult`: per-combination aggregate filled in page order

mod entry;
mod page;
mod result;

pub use entry::{DictionaryEntry, Translation};
pub use page::{Combination, PageRequest, RawPage, SourceLanguage};
pub use result::{FailedPage, ScrapeResult};
