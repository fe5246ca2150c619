//! Typed relationships between papers

use super::PaperId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of relationship kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    Cites,
    IsCitedBy,
    SimilarTo,
    CoAuthored,
    SameVenue,
    TopicRelated,
    CrossReference,
}

impl EdgeKind {
    /// Citation edges carry a direction; similarity-style edges do not
    pub fn is_directed(&self) -> bool {
        matches!(self, EdgeKind::Cites | EdgeKind::IsCitedBy | EdgeKind::CrossReference)
    }

    /// Kinds that encode "source cites target" in some form
    pub fn is_citation(&self) -> bool {
        matches!(self, EdgeKind::Cites | EdgeKind::IsCitedBy | EdgeKind::CrossReference)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Cites => "cites",
            EdgeKind::IsCitedBy => "is-cited-by",
            EdgeKind::SimilarTo => "similar-to",
            EdgeKind::CoAuthored => "co-authored",
            EdgeKind::SameVenue => "same-venue",
            EdgeKind::TopicRelated => "topic-related",
            EdgeKind::CrossReference => "cross-reference",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship edge between two papers of the same graph instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: PaperId,
    pub target: PaperId,
    pub kind: EdgeKind,
}

/// Deduplication key. Undirected kinds order their endpoints so that
/// `(A, B, k)` and `(B, A, k)` collapse to one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub a: PaperId,
    pub b: PaperId,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(source: PaperId, target: PaperId, kind: EdgeKind) -> Self {
        Self { source, target, kind }
    }

    pub fn is_directed(&self) -> bool {
        self.kind.is_directed()
    }

    pub fn key(&self) -> EdgeKey {
        let (a, b) = if self.kind.is_directed() || self.source <= self.target {
            (self.source.clone(), self.target.clone())
        } else {
            (self.target.clone(), self.source.clone())
        };
        EdgeKey { a, b, kind: self.kind }
    }

    pub fn touches(&self, id: &PaperId) -> bool {
        &self.source == id || &self.target == id
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}
