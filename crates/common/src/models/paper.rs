//! Paper identity and metadata

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Normalized upstream accession id
///
/// OpenAlex ids are stored bare and upper-case (`W2741809807`), DOIs bare and
/// lower-case (`10.1038/nature14539`). Anything else is kept trimmed as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperId(String);

fn openalex_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:(?:https?://)?(?:www\.)?(?:api\.)?openalex\.org/(?:works/)?)?(w\d+)$")
            .expect("static OpenAlex id pattern")
    })
}

fn doi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:https?://(?:dx\.)?doi\.org/|doi:)?(10\.\d{4,9}/\S+)$")
            .expect("static DOI pattern")
    })
}

impl PaperId {
    /// Canonicalize a raw identifier. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(caps) = openalex_pattern().captures(trimmed) {
            if let Some(m) = caps.get(1) {
                return Some(Self(m.as_str().to_ascii_uppercase()));
            }
        }

        if let Some(m) = doi_pattern().captures(trimmed).and_then(|c| c.get(1)) {
            return Some(Self(m.as_str().to_ascii_lowercase()));
        }

        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaperId {
    /// Canonicalizing conversion; blank input keeps the empty string.
    fn from(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| Self(String::new()))
    }
}

/// Normalized paper record as held by a graph instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperNode {
    pub id: PaperId,

    pub title: String,

    /// Ordered author names, possibly empty
    pub authors: Vec<String>,

    pub venue: Option<String>,

    /// Publication year. When the upstream omitted it this holds the current
    /// year and `year_estimated` is set.
    pub year: i32,

    pub year_estimated: bool,

    pub citation_count: u32,

    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,

    pub url: Option<String>,
}

impl PaperNode {
    /// Minimal node with only an identity and a title
    pub fn new(id: PaperId, title: impl Into<String>, year: i32) -> Self {
        Self {
            id,
            title: title.into(),
            authors: Vec::new(),
            venue: None,
            year,
            year_estimated: false,
            citation_count: 0,
            abstract_text: None,
            url: None,
        }
    }

    /// Fold another version of the same paper into this one.
    ///
    /// Non-empty fields win over empty ones, a measured year wins over an
    /// estimated one and the larger citation count wins. Existing non-empty
    /// values are never replaced, so absorbing the same record twice is a no-op.
    /// Returns whether anything changed.
    pub fn absorb(&mut self, other: &PaperNode) -> bool {
        debug_assert_eq!(self.id, other.id);
        let before = self.clone();

        if self.title.trim().is_empty() && !other.title.trim().is_empty() {
            self.title = other.title.clone();
        }
        if self.authors.is_empty() && !other.authors.is_empty() {
            self.authors = other.authors.clone();
        }
        fill_text(&mut self.venue, &other.venue);
        fill_text(&mut self.abstract_text, &other.abstract_text);
        fill_text(&mut self.url, &other.url);

        if self.year_estimated && !other.year_estimated {
            self.year = other.year;
            self.year_estimated = false;
        }
        self.citation_count = self.citation_count.max(other.citation_count);

        *self != before
    }
}

fn fill_text(slot: &mut Option<String>, incoming: &Option<String>) {
    let empty = slot.as_deref().map_or(true, |s| s.trim().is_empty());
    if empty {
        if let Some(value) = incoming.as_deref().filter(|s| !s.trim().is_empty()) {
            *slot = Some(value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openalex_ids_are_canonicalized() {
        assert_eq!(PaperId::parse("https://openalex.org/W2741809807").unwrap().as_str(), "W2741809807");
        assert_eq!(PaperId::parse("w123").unwrap().as_str(), "W123");
        assert_eq!(PaperId::parse("  W55 ").unwrap().as_str(), "W55");
    }

    #[test]
    fn test_doi_ids_are_lowercased() {
        let id = PaperId::parse("https://doi.org/10.1038/Nature14539").unwrap();
        assert_eq!(id.as_str(), "10.1038/nature14539");
    }

    #[test]
    fn test_blank_id_is_rejected() {
        assert!(PaperId::parse("   ").is_none());
        assert_eq!(PaperId::parse("abc123").unwrap().as_str(), "abc123");
    }

    #[test]
    fn test_absorb_prefers_complete_values() {
        let mut base = PaperNode::new(PaperId::from("W1"), "", 2026);
        base.year_estimated = true;

        let mut richer = PaperNode::new(PaperId::from("W1"), "Attention", 2017);
        richer.authors = vec!["Vaswani".into()];
        richer.citation_count = 90_000;
        richer.venue = Some("NeurIPS".into());

        assert!(base.absorb(&richer));
        assert_eq!(base.title, "Attention");
        assert_eq!(base.year, 2017);
        assert!(!base.year_estimated);
        assert_eq!(base.authors, vec!["Vaswani".to_string()]);

        // Degenerate data never overwrites
        let degenerate = PaperNode::new(PaperId::from("W1"), "", 2026);
        assert!(!base.absorb(&degenerate));
        assert_eq!(base.title, "Attention");
        assert_eq!(base.citation_count, 90_000);
    }
}
