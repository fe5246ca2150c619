//! In-memory literature fixtures

use super::{LinkDiscovery, LiteratureSearch, PaperRecord};
use crate::errors::{AppError, Result};
use crate::models::{LinkDirection, PaperId, RelationKind, SearchFilter};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Fixture-backed implementation of both upstream traits
///
/// Built once with the `with_*` methods, then shared. Every call is counted
/// so tests can assert on upstream traffic.
#[derive(Default)]
pub struct MockLiterature {
    papers: HashMap<PaperId, PaperRecord>,
    related: HashMap<(PaperId, RelationKind), Vec<PaperRecord>>,
    links: HashMap<(PaperId, LinkDirection), Vec<PaperId>>,
    failing_relations: HashSet<(PaperId, RelationKind)>,
    failing_links: HashSet<PaperId>,
    latency: Option<Duration>,
    fetch_calls: AtomicUsize,
    link_calls: AtomicUsize,
    fetch_log: Mutex<Vec<(PaperId, RelationKind)>>,
}

impl MockLiterature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record returned by `fetch_paper`
    pub fn with_paper(mut self, id: &str, record: serde_json::Value) -> Self {
        self.papers.insert(PaperId::from(id), PaperRecord(record));
        self
    }

    /// Register the result list of one relation
    pub fn with_related(mut self, id: &str, relation: RelationKind, records: Vec<serde_json::Value>) -> Self {
        self.related.insert(
            (PaperId::from(id), relation),
            records.into_iter().map(PaperRecord).collect(),
        );
        self
    }

    /// Register `citing cites cited` for link discovery in both directions
    pub fn with_link(mut self, citing: &str, cited: &str) -> Self {
        let citing = PaperId::from(citing);
        let cited = PaperId::from(cited);
        self.links
            .entry((citing.clone(), LinkDirection::Outgoing))
            .or_default()
            .push(cited.clone());
        self.links
            .entry((cited, LinkDirection::Incoming))
            .or_default()
            .push(citing);
        self
    }

    /// Make `fetch_related(id, relation)` fail
    pub fn failing_relation(mut self, id: &str, relation: RelationKind) -> Self {
        self.failing_relations.insert((PaperId::from(id), relation));
        self
    }

    /// Make every link query for `id` fail
    pub fn failing_links_for(mut self, id: &str) -> Self {
        self.failing_links.insert(PaperId::from(id));
        self
    }

    /// Delay every call, to let tests overlap requests
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of `fetch_related` calls so far
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_links` calls so far
    pub fn link_calls(&self) -> usize {
        self.link_calls.load(Ordering::SeqCst)
    }

    /// `fetch_related` calls in order
    pub fn fetch_log(&self) -> Vec<(PaperId, RelationKind)> {
        self.fetch_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl LiteratureSearch for MockLiterature {
    async fn fetch_paper(&self, paper_id: &PaperId) -> Result<PaperRecord> {
        self.delay().await;
        self.papers
            .get(paper_id)
            .cloned()
            .ok_or_else(|| AppError::Upstream {
                message: format!("404 Not Found: {}", paper_id),
            })
    }

    async fn fetch_related(
        &self,
        paper_id: &PaperId,
        relation: RelationKind,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<PaperRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.fetch_log.lock() {
            log.push((paper_id.clone(), relation));
        }
        self.delay().await;

        if self.failing_relations.contains(&(paper_id.clone(), relation)) {
            return Err(AppError::Upstream {
                message: "503 Service Unavailable".to_string(),
            });
        }

        let records = self
            .related
            .get(&(paper_id.clone(), relation))
            .map(|records| {
                records
                    .iter()
                    .filter(|r| !filter.open_access_only || r.0.get("is_oa").and_then(|v| v.as_bool()).unwrap_or(false))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(records)
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

#[async_trait]
impl LinkDiscovery for MockLiterature {
    async fn fetch_links(&self, paper_id: &PaperId, direction: LinkDirection) -> Result<Vec<PaperId>> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        if self.failing_links.contains(paper_id) {
            return Err(AppError::Upstream {
                message: format!("link lookup failed for {}", paper_id),
            });
        }

        Ok(self
            .links
            .get(&(paper_id.clone(), direction))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_related_respects_limit_and_filter() {
        let mock = MockLiterature::new().with_related(
            "W1",
            RelationKind::Citations,
            vec![
                json!({"id": "W2", "is_oa": true}),
                json!({"id": "W3", "is_oa": false}),
                json!({"id": "W4", "is_oa": true}),
            ],
        );
        let id = PaperId::from("W1");

        let all = assert_ok!(mock.fetch_related(&id, RelationKind::Citations, 2, &SearchFilter::default()).await);
        assert_eq!(all.len(), 2);

        let oa = SearchFilter { open_access_only: true };
        let open = assert_ok!(mock.fetch_related(&id, RelationKind::Citations, 10, &oa).await);
        assert_eq!(open.len(), 2);
        assert_eq!(mock.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_links_are_registered_both_ways() {
        let mock = MockLiterature::new().with_link("A", "B");
        let out = mock.fetch_links(&PaperId::from("A"), LinkDirection::Outgoing).await.unwrap();
        let inc = mock.fetch_links(&PaperId::from("B"), LinkDirection::Incoming).await.unwrap();
        assert_eq!(out, vec![PaperId::from("B")]);
        assert_eq!(inc, vec![PaperId::from("A")]);
        assert_eq!(mock.link_calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_injected() {
        let mock = MockLiterature::new()
            .failing_relation("W1", RelationKind::Similar)
            .failing_links_for("W1");
        let id = PaperId::from("W1");
        assert_err!(mock.fetch_related(&id, RelationKind::Similar, 5, &SearchFilter::default()).await);
        assert_err!(mock.fetch_links(&id, LinkDirection::Incoming).await);
    }
}
