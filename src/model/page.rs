use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language the dictionary is browsed from (the headword language)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceLanguage {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "fr")]
    French,
}

impl SourceLanguage {
    /// Returns every source language, English first
    pub fn all() -> [Self; 2] {
        [Self::English, Self::French]
    }

    /// Two-letter code used in query strings and output paths
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::French => "fr",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::French => "French",
        }
    }

    /// Site path segment of the reversal index for this source language
    pub fn browse_path(&self) -> &'static str {
        match self {
            Self::English => "browse/browse-english/",
            Self::French => "browse/francais/",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Self::English),
            "fr" | "french" => Some(Self::French),
            _ => None,
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for SourceLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| format!("unknown source language '{}' (expected en or fr)", s))
    }
}

/// One (language, letter, source language) unit of crawl work
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Combination {
    /// Registry identifier of the target language (e.g. "ngiemboon")
    pub language: String,

    /// Browse letter
    pub letter: String,

    /// Headword language
    pub source: SourceLanguage,
}

impl Combination {
    pub fn new(language: impl Into<String>, letter: impl Into<String>, source: SourceLanguage) -> Self {
        Self {
            language: language.into(),
            letter: letter.into(),
            source,
        }
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.language, self.source, self.letter)
    }
}

/// A request for one result page of a combination
///
/// Page numbers start at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    combination: Combination,
    page: u32,
}

impl PageRequest {
    /// Creates a request, returning None for page 0
    pub fn new(combination: Combination, page: u32) -> Option<Self> {
        if page == 0 {
            return None;
        }
        Some(Self { combination, page })
    }

    /// The first page of a combination
    pub fn first(combination: Combination) -> Self {
        Self {
            combination,
            page: 1,
        }
    }

    /// The request for the following page
    pub fn next_page(&self) -> Self {
        Self {
            combination: self.combination.clone(),
            page: self.page + 1,
        }
    }

    pub fn combination(&self) -> &Combination {
        &self.combination
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}

impl fmt::Display for PageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} page {}", self.combination, self.page)
    }
}

/// A fetched page, handed from the fetcher to the extractor and then dropped
#[derive(Debug, Clone)]
pub struct RawPage {
    /// The request that produced this page
    pub request: PageRequest,

    /// The URL that was fetched
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Response body
    pub body: String,
}
