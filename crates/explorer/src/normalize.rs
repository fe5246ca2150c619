//! Result normalization
//!
//! Upstream endpoints disagree on record shape: citation rows may be wrapped
//! in `citingPaper`, reference rows in `citedPaper`, similarity rows in
//! `paper` next to a score, author-works rows in `work`, and field names
//! differ between providers. Everything is folded into `PaperNode`.
//!
//! Only a missing identifier is fatal for a record. Unknown fields are ignored.

use citegraph_common::errors::{AppError, Result};
use citegraph_common::models::{PaperId, PaperNode, RelationKind};
use citegraph_common::upstream::PaperRecord;
use serde_json::Value;
use tracing::debug;

const ID_FIELDS: &[&str] = &["id", "paperId", "paper_id", "openalex_id", "doi"];
const TITLE_FIELDS: &[&str] = &["title", "display_name"];
const YEAR_FIELDS: &[&str] = &["year", "publication_year"];
const CITATION_FIELDS: &[&str] = &["citationCount", "cited_by_count", "citation_count", "citations"];
const VENUE_POINTERS: &[&str] = &[
    "/venue",
    "/journal",
    "/primary_location/source/display_name",
    "/host_venue/display_name",
];
const URL_POINTERS: &[&str] = &["/url", "/landing_page_url", "/primary_location/landing_page_url"];

/// Records of one batch after normalization
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Unique papers in upstream order
    pub papers: Vec<PaperNode>,

    /// Records skipped for lack of an identifier
    pub failures: usize,
}

/// Converts raw upstream records into `PaperNode`s
#[derive(Debug, Clone, Copy)]
pub struct ResultNormalizer {
    current_year: i32,
}

impl ResultNormalizer {
    /// `current_year` is the sentinel stored when a record has no year
    pub fn new(current_year: i32) -> Self {
        Self { current_year }
    }

    /// Normalize one record produced by a `relation` lookup
    pub fn normalize(&self, record: &PaperRecord, relation: RelationKind) -> Result<PaperNode> {
        let body = unwrap_record(record.as_json(), wrappers_for(relation));
        self.normalize_value(body)
    }

    /// Normalize a record from a single-paper lookup
    pub fn normalize_paper(&self, record: &PaperRecord) -> Result<PaperNode> {
        self.normalize_value(record.as_json())
    }

    /// Normalize a whole result list, skipping and counting bad records.
    /// Repeated ids within the batch are folded into their first occurrence.
    pub fn normalize_batch(&self, records: &[PaperRecord], relation: RelationKind) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();

        for record in records {
            match self.normalize(record, relation) {
                Ok(paper) => {
                    if let Some(existing) = batch.papers.iter_mut().find(|p| p.id == paper.id) {
                        existing.absorb(&paper);
                    } else {
                        batch.papers.push(paper);
                    }
                }
                Err(e) => {
                    debug!(relation = %relation, error = %e, "Skipping upstream record");
                    batch.failures += 1;
                }
            }
        }

        batch
    }

    fn normalize_value(&self, body: &Value) -> Result<PaperNode> {
        let id = extract_id(body).ok_or_else(|| AppError::Normalization {
            message: "record has no identifier".to_string(),
        })?;

        let (year, year_estimated) = match extract_year(body) {
            Some(year) => (year, false),
            None => (self.current_year, true),
        };

        let url = first_text(body, URL_POINTERS)
            .or_else(|| doi_url(body))
            .or_else(|| openalex_url(&id));

        Ok(PaperNode {
            title: first_string(body, TITLE_FIELDS).unwrap_or_default(),
            authors: extract_authors(body),
            venue: first_text(body, VENUE_POINTERS),
            year,
            year_estimated,
            citation_count: extract_citation_count(body),
            abstract_text: extract_abstract(body),
            url,
            id,
        })
    }
}

fn wrappers_for(relation: RelationKind) -> &'static [&'static str] {
    match relation {
        RelationKind::Citations => &["citingPaper", "paper", "work"],
        RelationKind::References => &["citedPaper", "paper", "work"],
        RelationKind::Similar => &["paper", "work"],
        RelationKind::Authors => &["work", "paper"],
    }
}

fn unwrap_record<'a>(value: &'a Value, wrappers: &[&str]) -> &'a Value {
    wrappers
        .iter()
        .find_map(|key| value.get(*key).filter(|inner| inner.is_object()))
        .unwrap_or(value)
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn first_string(body: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|f| body.get(*f).and_then(Value::as_str).and_then(non_blank))
}

/// Text at the first pointer that holds a string or a `{name | display_name}` object
fn first_text(body: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|p| match body.pointer(p)? {
        Value::String(s) => non_blank(s),
        Value::Object(obj) => ["name", "display_name"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str).and_then(non_blank)),
        _ => None,
    })
}

fn extract_id(body: &Value) -> Option<PaperId> {
    ID_FIELDS.iter().find_map(|f| match body.get(*f)? {
        Value::String(s) => PaperId::parse(s),
        Value::Number(n) => PaperId::parse(&n.to_string()),
        _ => None,
    })
}

fn as_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().get(..4).and_then(|y| y.parse().ok()),
        _ => None,
    }
    .filter(|y| *y > 0)
}

fn extract_year(body: &Value) -> Option<i32> {
    YEAR_FIELDS
        .iter()
        .find_map(|f| body.get(*f).and_then(as_year))
        .or_else(|| body.get("publication_date").and_then(as_year))
}

fn extract_citation_count(body: &Value) -> u32 {
    CITATION_FIELDS
        .iter()
        .find_map(|f| match body.get(*f)? {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        })
        .map(|c| u32::try_from(c).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

fn author_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s),
        Value::Object(obj) => obj
            .get("name")
            .or_else(|| obj.get("display_name"))
            .or_else(|| obj.get("raw_author_name"))
            .and_then(Value::as_str)
            .and_then(non_blank)
            .or_else(|| obj.get("author").and_then(author_name)),
        _ => None,
    }
}

fn extract_authors(body: &Value) -> Vec<String> {
    for field in ["authors", "authorships"] {
        match body.get(field) {
            Some(Value::Array(items)) => {
                let names: Vec<String> = items.iter().filter_map(author_name).collect();
                if !names.is_empty() {
                    return names;
                }
            }
            Some(Value::String(s)) => {
                let names: Vec<String> = s.split(';').filter_map(non_blank).collect();
                if !names.is_empty() {
                    return names;
                }
            }
            _ => {}
        }
    }
    Vec::new()
}

fn extract_abstract(body: &Value) -> Option<String> {
    body.get("abstract")
        .and_then(Value::as_str)
        .and_then(non_blank)
        .or_else(|| body.get("abstract_inverted_index").and_then(rebuild_inverted_abstract))
}

/// Rebuild text from a `{word: [positions]}` inverted index
fn rebuild_inverted_abstract(index: &Value) -> Option<String> {
    let index = index.as_object()?;
    let mut words: Vec<(u64, &str)> = index
        .iter()
        .flat_map(|(word, positions)| {
            positions
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(Value::as_u64)
                .map(move |pos| (pos, word.as_str()))
        })
        .collect();
    if words.is_empty() {
        return None;
    }
    words.sort_by_key(|(pos, _)| *pos);
    Some(words.into_iter().map(|(_, w)| w).collect::<Vec<_>>().join(" "))
}

fn doi_url(body: &Value) -> Option<String> {
    let doi = body.get("doi").and_then(Value::as_str).and_then(non_blank)?;
    if doi.starts_with("http") {
        Some(doi)
    } else {
        Some(format!("https://doi.org/{}", doi.trim_start_matches("doi:")))
    }
}

fn openalex_url(id: &PaperId) -> Option<String> {
    let s = id.as_str();
    (s.len() > 1 && s.starts_with('W') && s[1..].bytes().all(|b| b.is_ascii_digit()))
        .then(|| format!("https://openalex.org/{}", s))
}
