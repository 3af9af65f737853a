//! Entry extractor for dictionary browse pages
//!
//! This module turns a fetched browse page into:
//! - Normalized dictionary entries, one per `div.post` block
//! - Per-block parse failures that never abort the page
//! - A page summary (block count and pagination hint) for the walker

use crate::model::{DictionaryEntry, RawPage, Translation};
use crate::registry::LanguageConfig;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// A block-level extraction problem
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The block had no headword and was dropped
    #[error("page {page}, block {block}: missing headword")]
    MissingHeadword { page: u32, block: usize },

    /// Part of the block was unusable; the entry was kept
    #[error("page {page}, block {block}: {reason}")]
    MalformedBlock {
        page: u32,
        block: usize,
        reason: String,
    },
}

/// Entries and failures extracted from one page
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Entries in block order
    pub entries: Vec<DictionaryEntry>,
    pub failures: Vec<ParseError>,
}

/// How many pages a combination has, as advertised by its first page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationHint {
    /// From the pager's "Page N of M"
    pub total_pages: Option<u32>,

    /// From a `data-total-entries` attribute
    pub total_entries: Option<u32>,
}

impl PaginationHint {
    pub fn is_empty(&self) -> bool {
        self.total_pages.is_none() && self.total_entries.is_none()
    }

    /// Expected last page, preferring the explicit page count
    ///
    /// A hint of zero entries or pages still means the first page exists.
    pub fn expected_last_page(&self, page_size: u32) -> Option<u32> {
        if let Some(pages) = self.total_pages {
            return Some(pages.max(1));
        }
        self.total_entries
            .map(|entries| entries.div_ceil(page_size.max(1)).max(1))
    }
}

/// What the walker needs to know about a page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSummary {
    /// Number of entry blocks on the page
    pub blocks: usize,
    pub hint: PaginationHint,
}

/// Everything read from one fetched page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub summary: PageSummary,
    pub extraction: Extraction,
}

/// Selectors for the site's page structure
struct PageSelectors {
    block: Selector,
    headword: Selector,
    sense: Selector,
    sense_headword: Selector,
    link: Selector,
    anchor: Selector,
    part_of_speech: Selector,
    homograph: Selector,
    variant: Selector,
    page_info: Selector,
    total_entries: Selector,
}

impl PageSelectors {
    fn new() -> Option<Self> {
        Some(Self {
            block: Selector::parse("div.post").ok()?,
            headword: Selector::parse("span.reversalform").ok()?,
            sense: Selector::parse("span.sensesr").ok()?,
            sense_headword: Selector::parse("span.headword").ok()?,
            link: Selector::parse("a[href]").ok()?,
            anchor: Selector::parse("a").ok()?,
            part_of_speech: Selector::parse(".mlpartofspeech, .partofspeech").ok()?,
            homograph: Selector::parse(".homographnumber, .xhomographnumber").ok()?,
            variant: Selector::parse(".variantref, .variantform").ok()?,
            page_info: Selector::parse("#wp_page_numbers li.page_info").ok()?,
            total_entries: Selector::parse("[data-total-entries]").ok()?,
        })
    }

    /// Compiled once per process
    fn get() -> Option<&'static Self> {
        static SELECTORS: OnceLock<Option<PageSelectors>> = OnceLock::new();
        SELECTORS.get_or_init(Self::new).as_ref()
    }
}

/// Trims, collapses whitespace runs to one space, and composes to NFC
///
/// Diacritics and extended-Latin letters are kept as they are.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .nfc()
        .collect()
}

/// Parses a fetched page once and reads both its summary and its entries
///
/// # Arguments
///
/// * `page` - The fetched page; its request supplies letter and source language
/// * `language` - The target language; its code selects the vernacular spans
///
/// # Returns
///
/// The block count and pagination hint, plus the entries in block order and
/// one `ParseError` per dropped block or skipped sense
pub fn parse_page(page: &RawPage, language: &LanguageConfig) -> ParsedPage {
    let Some(selectors) = PageSelectors::get() else {
        return ParsedPage::default();
    };
    let document = Html::parse_document(&page.body);

    ParsedPage {
        summary: summarize(&document, selectors),
        extraction: extract_entries(&document, selectors, page, language),
    }
}

fn summarize(document: &Html, selectors: &PageSelectors) -> PageSummary {
    let blocks = document.select(&selectors.block).count();

    let total_pages = document
        .select(&selectors.page_info)
        .find_map(|el| parse_page_info(&el.text().collect::<String>()));

    let total_entries = document
        .select(&selectors.total_entries)
        .find_map(|el| el.value().attr("data-total-entries"))
        .and_then(|v| v.trim().parse::<u32>().ok());

    PageSummary {
        blocks,
        hint: PaginationHint {
            total_pages,
            total_entries,
        },
    }
}

/// Parses "Page N of M" and returns M
fn parse_page_info(text: &str) -> Option<u32> {
    let normalized = normalize_text(text);
    let tokens: Vec<&str> = normalized.split(' ').collect();
    tokens.windows(4).find_map(|w| {
        let is_pager = w[0].eq_ignore_ascii_case("page")
            && w[1].parse::<u32>().is_ok()
            && w[2].eq_ignore_ascii_case("of");
        if is_pager {
            w[3].parse::<u32>().ok()
        } else {
            None
        }
    })
}

fn extract_entries(
    document: &Html,
    selectors: &PageSelectors,
    page: &RawPage,
    language: &LanguageConfig,
) -> Extraction {
    let mut extraction = Extraction::default();
    let page_number = page.request.page();
    let combination = page.request.combination();

    for (index, block) in document.select(&selectors.block).enumerate() {
        let block_number = index + 1;

        let headword = block
            .select(&selectors.headword)
            .next()
            .map(|el| normalize_text(&text_excluding(el, &selectors.homograph)))
            .filter(|s| !s.is_empty());

        let Some(headword) = headword else {
            tracing::debug!("{}: block {} has no headword", page.request, block_number);
            extraction.failures.push(ParseError::MissingHeadword {
                page: page_number,
                block: block_number,
            });
            continue;
        };

        let mut translations = Vec::new();
        for (sense_index, sense) in block.select(&selectors.sense).enumerate() {
            match extract_translation(sense, selectors, &language.code) {
                Ok(translation) => translations.push(translation),
                Err(reason) => extraction.failures.push(ParseError::MalformedBlock {
                    page: page_number,
                    block: block_number,
                    reason: format!("'{}' sense {}: {}", headword, sense_index + 1, reason),
                }),
            }
        }

        let mut entry = DictionaryEntry::new(headword, translations, &language.code, combination);

        entry.part_of_speech = block
            .select(&selectors.part_of_speech)
            .map(|el| normalize_text(&el.text().collect::<String>()))
            .find(|s| !s.is_empty());

        entry.sense_index = block
            .select(&selectors.homograph)
            .find_map(|el| normalize_text(&el.text().collect::<String>()).parse::<u32>().ok())
            .or_else(|| {
                block
                    .select(&selectors.sense)
                    .next()
                    .and_then(|sense| homograph_marker(sense, selectors, &language.code))
            });

        for variant in block.select(&selectors.variant) {
            let lang = nearest_lang(variant);
            if lang.is_some_and(|l| l != language.code) {
                continue;
            }
            let text = normalize_text(&variant.text().collect::<String>());
            if !text.is_empty() && !entry.variants.contains(&text) {
                entry.variants.push(text);
            }
        }

        extraction.entries.push(entry);
    }

    tracing::debug!(
        "{}: {} entries, {} parse failures",
        page.request,
        extraction.entries.len(),
        extraction.failures.len()
    );

    extraction
}

/// The homograph number the site prints after a vernacular word
///
/// It is a numeric link inside the sense headword, tagged with another language.
fn homograph_marker(sense: ElementRef, selectors: &PageSelectors, code: &str) -> Option<u32> {
    let headword = sense.select(&selectors.sense_headword).next()?;
    headword
        .select(&selectors.anchor)
        .filter(|a| nearest_lang(*a) != Some(code))
        .find_map(|a| normalize_text(&a.text().collect::<String>()).parse::<u32>().ok())
}

/// Reads the vernacular word and link of one `span.sensesr`
fn extract_translation(
    sense: ElementRef,
    selectors: &PageSelectors,
    code: &str,
) -> Result<Translation, String> {
    let headword = sense
        .select(&selectors.sense_headword)
        .next()
        .ok_or_else(|| "no headword span".to_string())?;

    let word: String = headword
        .select(&selectors.anchor)
        .filter(|a| nearest_lang(*a) == Some(code))
        .map(|a| a.text().collect::<String>().trim().to_string())
        .collect();
    let word = normalize_text(&word);

    if word.is_empty() {
        return Err(format!("no {} word", code));
    }

    let link = headword
        .select(&selectors.link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty());

    Ok(Translation::new(word, link))
}

/// The `lang` attribute of the element or its closest ancestor that has one
fn nearest_lang(element: ElementRef) -> Option<&str> {
    if let Some(lang) = element.value().attr("lang") {
        return Some(lang);
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find_map(|el| el.value().attr("lang"))
}

/// Text content of an element, skipping descendants matched by `skip`
fn text_excluding(element: ElementRef, skip: &Selector) -> String {
    let mut out = String::new();
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if !skip.matches(&child_element) {
                out.push_str(&text_excluding(child_element, skip));
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Combination, PageRequest, SourceLanguage};

    fn test_language() -> LanguageConfig {
        LanguageConfig::webonary("ngiemboon", "Ngiemboon", "nnh")
    }

    fn raw_page(body: &str, page: u32) -> RawPage {
        let combo = Combination::new("ngiemboon", "a", SourceLanguage::English);
        RawPage {
            request: PageRequest::new(combo, page).unwrap(),
            url: "https://www.webonary.org/ngiemboon/browse/browse-english/?letter=a".to_string(),
            status: 200,
            body: body.to_string(),
        }
    }

    fn extract(body: &str, page: u32) -> Extraction {
        parse_page(&raw_page(body, page), &test_language()).extraction
    }

    fn summarize_html(body: &str) -> PageSummary {
        parse_page(&raw_page(body, 1), &test_language()).summary
    }

    const TWO_BLOCKS: &str = r#"
<html><body>
<div class="post">
  <span class="reversalform">abandon</span>
  <span class="sensesrs">
    <span class="sensecontent">
      <span class="sensesr">
        <span class="partofspeech">v</span>
        <span class="headword">
          <span lang="nnh"><a href="https://example.com/word1">ńnyé</a></span>
          <span lang="fr" style="font-weight:bold;"><a href="https://example.com/word1">2</a></span>
        </span>
      </span>
    </span>
    <span class="sensecontent">
      <span class="sensesr">
        <span class="headword"><span lang="nnh"><a href="https://example.com/word2">ńkʉ́e</a></span></span>
      </span>
    </span>
  </span>
</div>
<div class="post">
  <span class="reversalform">  able
     bodied <span class="xhomographnumber">2</span></span>
  <span class="variantref" lang="nnh">lə̀kə́</span>
</div>
</body></html>
"#;

    #[test]
    fn test_extracts_entries_in_block_order() {
        let extraction = extract(TWO_BLOCKS, 1);

        assert_eq!(extraction.entries.len(), 2);
        assert!(extraction.failures.is_empty());

        let first = &extraction.entries[0];
        assert_eq!(first.headword, "abandon");
        assert_eq!(first.words(), vec!["ńnyé", "ńkʉ́e"]);
        assert_eq!(
            first.translations[0].link.as_deref(),
            Some("https://example.com/word1")
        );
        assert_eq!(first.part_of_speech.as_deref(), Some("v"));
        assert_eq!(first.language, "nnh");
        assert!(!first.incomplete);

        let second = &extraction.entries[1];
        assert_eq!(second.headword, "able bodied");
        assert_eq!(second.sense_index, Some(2));
        assert_eq!(second.variants, vec!["lə̀kə́"]);
        assert!(second.incomplete);
        assert!(second.translations.is_empty());
    }

    // Block layout served by webonary.org for the ngiemboon reversal index
    const WEBONARY_BLOCK: &str = r#"
<div class="post">
    <div class="reversalindexentry" id="g0ec444a8-06f6-48f7-93e8-fcb27ac0c82d">
        <span class="reversalform">
            <span lang="en">abandon</span>
        </span>
        <span class="sensesrs">
            <span class="sensecontent">
                <span class="sensesr" entryguid="g8a5c2a0f-0af2-41ee-90a1-f06f2afa8fc9">
                    <span class="headword">
                        <span lang="nnh">
                            <span lang="nnh">
                                <a href="https://www.webonary.org/ngiemboon/g8a5c2a0f-0af2-41ee-90a1-f06f2afa8fc9?lang=en">ńnyé</a>
                            </span>
                            <span lang="fr" style="font-weight:bold;font-size:58%;">
                                <a href="https://www.webonary.org/ngiemboon/g8a5c2a0f-0af2-41ee-90a1-f06f2afa8fc9?lang=en">2</a>
                            </span>
                        </span>
                    </span>
                    <span class="morphosyntaxanalysis">
                        <span class="mlpartofspeech">
                            <span lang="en">v.t</span>
                        </span>
                    </span>
                </span>
            </span>
            <span class="sensecontent">
                <span class="sensesr" entryguid="g09949799-9d87-4613-9bf8-4bd5b9ca3bce">
                    <span class="headword">
                        <span lang="nnh">
                            <a href="https://www.webonary.org/ngiemboon/g09949799-9d87-4613-9bf8-4bd5b9ca3bce?lang=en">ńkʉ́e</a>
                        </span>
                    </span>
                </span>
            </span>
        </span>
    </div>
</div>
"#;

    #[test]
    fn test_webonary_block_metadata() {
        let extraction = extract(WEBONARY_BLOCK, 1);

        assert!(extraction.failures.is_empty());
        assert_eq!(extraction.entries.len(), 1);

        let entry = &extraction.entries[0];
        assert_eq!(entry.headword, "abandon");
        assert_eq!(entry.words(), vec![normalize_text("ńnyé"), normalize_text("ńkʉ́e")]);
        assert_eq!(entry.part_of_speech.as_deref(), Some("v.t"));
        assert_eq!(entry.sense_index, Some(2));
        assert_eq!(
            entry.translations[1].link.as_deref(),
            Some("https://www.webonary.org/ngiemboon/g09949799-9d87-4613-9bf8-4bd5b9ca3bce?lang=en")
        );
    }

    #[test]
    fn test_block_without_headword_is_dropped() {
        let html = r#"
<div class="post">
  <span class="sensesr"><span class="headword"><span lang="nnh"><a href="/w">mbə</a></span></span></span>
</div>
<div class="post">
  <span class="reversalform">about</span>
  <span class="sensesr"><span class="headword"><span lang="nnh"><a href="/w2">tɔ́</a></span></span></span>
</div>
"#;
        let extraction = extract(html, 3);

        assert_eq!(extraction.entries.len(), 1);
        assert_eq!(extraction.entries[0].headword, "about");
        assert_eq!(
            extraction.failures,
            vec![ParseError::MissingHeadword { page: 3, block: 1 }]
        );
    }

    #[test]
    fn test_sense_without_word_is_counted() {
        let html = r#"
<div class="post">
  <span class="reversalform">above</span>
  <span class="sensesr"><span class="headword"><span lang="fr"><a href="/x">dessus</a></span></span></span>
  <span class="sensesr"><span class="headword"><span lang="nnh"><a href="/y">tsə́</a></span></span></span>
</div>
"#;
        let extraction = extract(html, 1);

        assert_eq!(extraction.entries.len(), 1);
        assert_eq!(extraction.entries[0].words(), vec!["tsə́"]);
        assert_eq!(extraction.failures.len(), 1);
        assert!(matches!(
            extraction.failures[0],
            ParseError::MalformedBlock { page: 1, block: 1, .. }
        ));
    }

    #[test]
    fn test_word_split_across_links_is_joined() {
        let html = r#"
<div class="post">
  <span class="reversalform">absorb</span>
  <span class="sensesr"><span class="headword"><span lang="nnh"><a href="/a">lə</a><a href="/a">ŋwàʼ</a></span></span></span>
</div>
"#;
        let extraction = extract(html, 1);
        assert_eq!(extraction.entries[0].words(), vec!["ləŋwàʼ"]);
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  a \n\t b  "), "a b");
        // e + combining acute composes to é
        assert_eq!(normalize_text("e\u{0301}"), "\u{00e9}");
        // no ASCII folding
        assert_eq!(normalize_text("ŋgʉ̂"), "ŋgʉ̂".nfc().collect::<String>());
    }

    #[test]
    fn test_summary_reads_page_info() {
        let html = r#"
<div class="post"><span class="reversalform">a</span></div>
<div id="wp_page_numbers"><ul><li class="page_info">Page 1 of 16</li><li><a href="?pagenr=2">2</a></li></ul></div>
"#;
        let summary = summarize_html(html);
        assert_eq!(summary.blocks, 1);
        assert_eq!(summary.hint.total_pages, Some(16));
        assert_eq!(summary.hint.expected_last_page(20), Some(16));
    }

    #[test]
    fn test_summary_reads_entry_count() {
        let html = r#"<div id="results" data-total-entries="41"></div>"#;
        let summary = summarize_html(html);
        assert_eq!(summary.blocks, 0);
        assert_eq!(summary.hint.total_entries, Some(41));
        assert_eq!(summary.hint.expected_last_page(20), Some(3));
    }

    #[test]
    fn test_malformed_page_info_gives_no_hint() {
        let html = r#"<div id="wp_page_numbers"><li class="page_info">Some random text</li></div>"#;
        let summary = summarize_html(html);
        assert!(summary.hint.is_empty());
        assert_eq!(summary.hint.expected_last_page(20), None);
    }

    #[test]
    fn test_zero_hint_means_one_page() {
        let hint = PaginationHint {
            total_pages: None,
            total_entries: Some(0),
        };
        assert_eq!(hint.expected_last_page(20), Some(1));
    }
}
