//! Relation types requested from the literature search

use super::EdgeKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upstream relation an exploration step asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Later work: papers citing the source
    Citations,
    /// Earlier work: papers the source cites
    References,
    /// Papers related by content
    Similar,
    /// Other works by the source's authors
    Authors,
}

impl RelationKind {
    pub const ALL: [RelationKind; 4] = [
        RelationKind::Citations,
        RelationKind::References,
        RelationKind::Similar,
        RelationKind::Authors,
    ];

    /// Documented fallback order for seeding a graph
    pub const DEFAULT_FALLBACK: [RelationKind; 3] = [
        RelationKind::Citations,
        RelationKind::References,
        RelationKind::Similar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Citations => "citations",
            RelationKind::References => "references",
            RelationKind::Similar => "similar",
            RelationKind::Authors => "authors",
        }
    }

    /// Edge kind synthesized between the source and each result
    pub fn edge_kind(&self) -> EdgeKind {
        match self {
            RelationKind::Citations => EdgeKind::IsCitedBy,
            RelationKind::References => EdgeKind::Cites,
            RelationKind::Similar => EdgeKind::SimilarTo,
            RelationKind::Authors => EdgeKind::CoAuthored,
        }
    }

    /// Whether synthesized edges point from the result into the source.
    /// Only later work does; earlier work points out of the source.
    pub fn points_into_source(&self) -> bool {
        matches!(self, RelationKind::Citations)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "citations" | "later-work" | "cited_by" => Ok(RelationKind::Citations),
            "references" | "earlier-work" | "cites" => Ok(RelationKind::References),
            "similar" | "related" => Ok(RelationKind::Similar),
            "authors" | "co-authors" => Ok(RelationKind::Authors),
            other => Err(format!("unknown relation kind: {}", other)),
        }
    }
}

/// Link discovery direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
    /// Papers the queried paper cites
    Outgoing,
    /// Papers citing the queried paper
    Incoming,
}

impl fmt::Display for LinkDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkDirection::Outgoing => f.write_str("outgoing"),
            LinkDirection::Incoming => f.write_str("incoming"),
        }
    }
}

/// Optional upstream filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    #[serde(default)]
    pub open_access_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_edge_semantics() {
        assert_eq!(RelationKind::Citations.edge_kind(), EdgeKind::IsCitedBy);
        assert!(RelationKind::Citations.points_into_source());
        assert!(!RelationKind::References.points_into_source());
    }

    #[test]
    fn test_relation_parsing_aliases() {
        assert_eq!("later-work".parse::<RelationKind>().unwrap(), RelationKind::Citations);
        assert_eq!("References".parse::<RelationKind>().unwrap(), RelationKind::References);
        assert!("bogus".parse::<RelationKind>().is_err());
    }
}
