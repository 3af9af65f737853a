use crate::model::SourceLanguage;
use crate::RegistryError;
use url::Url;

/// Placeholders a URL template may contain
const PLACEHOLDERS: [&str; 4] = ["{path}", "{letter}", "{source}", "{page}"];

/// Site configuration for one vernacular language
///
/// Immutable once the registry has been built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageConfig {
    /// Registry identifier, also the site's dictionary slug (e.g. "ngiemboon")
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// ISO 639-3 code (e.g. "nnh"), used to select vernacular spans in pages
    pub code: String,

    /// Browse URL template
    pub url_template: String,

    /// Letters the dictionary can be browsed by
    pub letters: Vec<String>,

    /// Source languages the dictionary has a reversal index for
    pub sources: Vec<SourceLanguage>,
}

impl LanguageConfig {
    /// Creates a config with letters `a`..`z` and both source languages
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        code: impl Into<String>,
        url_template: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: code.into(),
            url_template: url_template.into(),
            letters: default_letters(),
            sources: SourceLanguage::all().to_vec(),
        }
    }

    /// Config for a dictionary hosted on webonary.org under its id
    pub fn webonary(id: &str, name: &str, code: &str) -> Self {
        let template = format!(
            "https://www.webonary.org/{}/{{path}}?letter={{letter}}&key={{source}}&pagenr={{page}}&lang={{source}}",
            id
        );
        Self::new(id, name, code, template)
    }

    pub fn supports_letter(&self, letter: &str) -> bool {
        self.letters.iter().any(|l| l == letter)
    }

    pub fn supports_source(&self, source: SourceLanguage) -> bool {
        self.sources.contains(&source)
    }

    /// Renders the browse URL for one page
    ///
    /// # Arguments
    ///
    /// * `source` - Headword language of the reversal index
    /// * `letter` - Browse letter
    /// * `page` - Page number, starting at 1
    ///
    /// # Returns
    ///
    /// * `Ok(Url)` - The absolute URL, with the query percent-encoded
    /// * `Err(RegistryError::InvalidTemplate)` - The rendered template is not a valid http(s) URL
    pub fn page_url(&self, source: SourceLanguage, letter: &str, page: u32) -> Result<Url, RegistryError> {
        let rendered = self
            .url_template
            .replace("{path}", source.browse_path())
            .replace("{letter}", letter)
            .replace("{source}", source.code())
            .replace("{page}", &page.to_string());

        let url = Url::parse(&rendered).map_err(|e| self.invalid(format!("'{}' does not parse: {}", rendered, e)))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(self.invalid(format!("unsupported scheme '{}'", other))),
        }
    }

    /// Checks the invariants a registry entry must hold
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.id.is_empty() {
            return Err(self.invalid("language id cannot be empty"));
        }

        // Ids and letters name output directories and files
        if !is_path_component(&self.id) {
            return Err(self.invalid("language id must be a plain name without path separators"));
        }

        if self.code.is_empty() {
            return Err(self.invalid("language code cannot be empty"));
        }

        for required in ["{letter}", "{page}"] {
            if !self.url_template.contains(required) {
                return Err(self.invalid(format!("template is missing {}", required)));
            }
        }

        if let Some(unknown) = unknown_placeholder(&self.url_template) {
            return Err(self.invalid(format!("unknown placeholder {}", unknown)));
        }

        if self.letters.is_empty() {
            return Err(self.invalid("at least one letter is required"));
        }

        if let Some(letter) = self.letters.iter().find(|l| !is_path_component(l)) {
            return Err(self.invalid(format!("letter '{}' is not a plain name", letter)));
        }

        if self.sources.is_empty() {
            return Err(self.invalid("at least one source language is required"));
        }

        // Every supported variant must render for page 1
        for source in &self.sources {
            self.page_url(*source, &self.letters[0], 1)?;
        }

        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> RegistryError {
        RegistryError::InvalidTemplate {
            language: self.id.clone(),
            reason: reason.into(),
        }
    }
}

/// Letters `a` to `z`
pub fn default_letters() -> Vec<String> {
    ('a'..='z').map(|c| c.to_string()).collect()
}

/// Finds the first `{...}` group that is not a known placeholder
fn unknown_placeholder(template: &str) -> Option<String> {
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start..];
        let end = after.find('}')?;
        let candidate = &after[..=end];
        if !PLACEHOLDERS.contains(&candidate) {
            return Some(candidate.to_string());
        }
        rest = &after[end + 1..];
    }
    None
}

/// Returns true if `name` is usable as a single file or directory name
fn is_path_component(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name != "." && name != ".." && !name.contains(|c: char| c == '/' || c == '\\')
}
