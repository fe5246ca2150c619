//! Navigation trail
//!
//! A single linear history of expansions shared by every column. Navigating
//! back to an entry discards everything after it, whichever column produced
//! the later entries.

use crate::columns::ColumnId;
use chrono::{DateTime, Utc};
use citegraph_common::errors::{AppError, Result};
use citegraph_common::models::{PaperId, PaperNode, RelationKind};
use serde::Serialize;
use std::collections::VecDeque;

/// Default number of entries kept
pub const DEFAULT_TRAIL_MAX_LEN: usize = 100;

/// One completed expansion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplorationRecord {
    pub source: PaperId,
    pub relation: RelationKind,
    /// Normalized papers returned by the expansion, in upstream order
    pub results: Vec<PaperNode>,
    pub timestamp: DateTime<Utc>,
}

impl ExplorationRecord {
    pub fn new(source: PaperId, relation: RelationKind, results: Vec<PaperNode>) -> Self {
        Self {
            source,
            relation,
            results,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailEntry {
    pub column: ColumnId,
    #[serde(flatten)]
    pub record: ExplorationRecord,
}

#[derive(Debug, Clone)]
pub struct NavigationTrail {
    entries: VecDeque<TrailEntry>,
    max_len: usize,
}

impl Default for NavigationTrail {
    fn default() -> Self {
        Self::new(DEFAULT_TRAIL_MAX_LEN)
    }
}

impl NavigationTrail {
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_len: max_len.max(1),
        }
    }

    /// Append an entry, dropping the oldest one when full
    pub fn push(&mut self, column: ColumnId, record: ExplorationRecord) {
        if self.entries.len() == self.max_len {
            self.entries.pop_front();
        }
        self.entries.push_back(TrailEntry { column, record });
    }

    /// Keep entries up to and including `index`, returning that entry
    pub fn truncate_after(&mut self, index: usize) -> Result<TrailEntry> {
        let entry = self
            .entries
            .get(index)
            .cloned()
            .ok_or(AppError::TrailEntryNotFound { index })?;
        self.entries.truncate(index + 1);
        Ok(entry)
    }

    /// Forget the entries of a closed column
    pub fn remove_column(&mut self, column: ColumnId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.column != column);
        before - self.entries.len()
    }

    pub fn entries(&self) -> Vec<TrailEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Entries produced by one column, in trail order
    pub fn for_column(&self, column: ColumnId) -> Vec<TrailEntry> {
        self.entries
            .iter()
            .filter(|e| e.column == column)
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<&TrailEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str) -> ExplorationRecord {
        ExplorationRecord::new(PaperId::from(source), RelationKind::Citations, vec![])
    }

    fn sources(trail: &NavigationTrail) -> Vec<String> {
        trail.entries().iter().map(|e| e.record.source.to_string()).collect()
    }

    #[test]
    fn test_truncate_crosses_columns() {
        let left = ColumnId::new();
        let right = ColumnId::new();
        let mut trail = NavigationTrail::default();
        trail.push(left, record("A"));
        trail.push(right, record("B"));
        trail.push(left, record("C"));
        trail.push(right, record("D"));

        let entry = trail.truncate_after(1).unwrap();
        assert_eq!(entry.column, right);
        assert_eq!(sources(&trail), vec!["A", "B"]);
    }

    #[test]
    fn test_truncate_out_of_range() {
        let mut trail = NavigationTrail::default();
        trail.push(ColumnId::new(), record("A"));
        let err = trail.truncate_after(3).unwrap_err();
        assert!(matches!(err, AppError::TrailEntryNotFound { index: 3 }));
        assert_eq!(trail.len(), 1);
    }

    #[test]
    fn test_bound_drops_oldest() {
        let column = ColumnId::new();
        let mut trail = NavigationTrail::new(2);
        trail.push(column, record("A"));
        trail.push(column, record("B"));
        trail.push(column, record("C"));
        assert_eq!(sources(&trail), vec!["B", "C"]);
    }

    #[test]
    fn test_remove_column_keeps_order() {
        let left = ColumnId::new();
        let right = ColumnId::new();
        let mut trail = NavigationTrail::default();
        trail.push(left, record("A"));
        trail.push(right, record("B"));
        trail.push(left, record("C"));

        assert_eq!(trail.remove_column(right), 1);
        assert_eq!(sources(&trail), vec!["A", "C"]);
        assert_eq!(trail.for_column(left).len(), 2);
    }
}
