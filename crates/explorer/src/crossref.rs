//! Cross-reference resolution
//!
//! Finds citation links between papers that are already visible in a graph
//! but were not connected by the expansion that brought them in. Each queried
//! node costs two link-discovery calls, so the number of queried nodes is
//! capped per pass.

use crate::graph::has_citation_link;
use citegraph_common::errors::AppError;
use citegraph_common::metrics;
use citegraph_common::models::{Edge, EdgeKey, EdgeKind, LinkDirection, PaperId};
use citegraph_common::upstream::LinkDiscovery;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Default number of nodes queried per pass
pub const DEFAULT_MAX_NODES: usize = 10;

/// One failed link lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkFailure {
    pub paper_id: PaperId,
    pub direction: LinkDirection,
    pub message: String,
}

/// Result of one resolution pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrossReferenceReport {
    /// New `cites` edges between visible nodes
    pub edges: Vec<Edge>,
    /// Nodes whose links were queried
    pub checked: Vec<PaperId>,
    /// Link-discovery calls issued
    pub queries: usize,
    pub failures: Vec<LinkFailure>,
    /// Whether the node set exceeded the per-pass bound
    pub truncated: bool,
}

impl CrossReferenceReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct CrossReferenceResolver {
    links: Arc<dyn LinkDiscovery>,
    max_nodes: usize,
}

impl CrossReferenceResolver {
    pub fn new(links: Arc<dyn LinkDiscovery>, max_nodes: usize) -> Self {
        Self {
            links,
            max_nodes: max_nodes.max(1),
        }
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /// Resolve citation links among `node_ids`.
    ///
    /// `node_ids` is the visible set, ordered by query priority: only the
    /// first `max_nodes` entries are queried, but a link is accepted when its
    /// other end is anywhere in the set. Links already recorded in
    /// `existing` are skipped. A failed lookup is recorded and the pass
    /// continues.
    #[instrument(skip(self, node_ids, existing), fields(nodes = node_ids.len()))]
    pub async fn resolve(&self, node_ids: &[PaperId], existing: &HashSet<EdgeKey>) -> CrossReferenceReport {
        let visible: HashSet<&PaperId> = node_ids.iter().collect();

        let mut checked: Vec<PaperId> = Vec::new();
        for id in node_ids {
            if checked.len() == self.max_nodes {
                break;
            }
            if !checked.contains(id) {
                checked.push(id.clone());
            }
        }
        let truncated = visible.len() > checked.len();

        let lookups = checked.iter().flat_map(|id| {
            [LinkDirection::Outgoing, LinkDirection::Incoming]
                .into_iter()
                .map(move |direction| async move {
                    (id, direction, self.links.fetch_links(id, direction).await)
                })
        });
        let responses = join_all(lookups).await;

        let mut report = CrossReferenceReport {
            checked: checked.clone(),
            queries: responses.len(),
            truncated,
            ..Default::default()
        };
        let mut seen = existing.clone();

        for (id, direction, response) in responses {
            let linked = match response {
                Ok(linked) => linked,
                Err(e) => {
                    warn!(paper_id = %id, direction = %direction, error = %e, "Link lookup failed");
                    report.failures.push(failure(id, direction, &e));
                    continue;
                }
            };

            for other in linked {
                if &other == id || !visible.contains(&other) {
                    continue;
                }

                let (citing, cited) = match direction {
                    LinkDirection::Outgoing => (id.clone(), other),
                    LinkDirection::Incoming => (other, id.clone()),
                };
                if has_citation_link(&seen, &citing, &cited) {
                    continue;
                }

                let edge = Edge::new(citing, cited, EdgeKind::Cites);
                seen.insert(edge.key());
                report.edges.push(edge);
            }
        }

        metrics::record_crossref(report.queries, report.failures.len());
        debug!(
            checked = report.checked.len(),
            edges = report.edges.len(),
            failures = report.failures.len(),
            truncated = report.truncated,
            "Cross-reference pass finished"
        );

        report
    }
}

fn failure(id: &PaperId, direction: LinkDirection, error: &AppError) -> LinkFailure {
    LinkFailure {
        paper_id: id.clone(),
        direction,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citegraph_common::upstream::MockLiterature;

    fn ids(raw: &[&str]) -> Vec<PaperId> {
        raw.iter().map(|s| PaperId::from(*s)).collect()
    }

    fn resolver(mock: MockLiterature, max_nodes: usize) -> (CrossReferenceResolver, Arc<MockLiterature>) {
        let mock = Arc::new(mock);
        (CrossReferenceResolver::new(mock.clone(), max_nodes), mock)
    }

    #[tokio::test]
    async fn test_link_between_visible_nodes() {
        let (resolver, _) = resolver(MockLiterature::new().with_link("A", "B"), 10);
        let report = resolver.resolve(&ids(&["S", "A", "B"]), &HashSet::new()).await;

        assert_eq!(
            report.edges,
            vec![Edge::new(PaperId::from("A"), PaperId::from("B"), EdgeKind::Cites)]
        );
        assert_eq!(report.queries, 6);
        assert!(!report.truncated);
    }

    #[tokio::test]
    async fn test_link_to_invisible_node_is_ignored() {
        let (resolver, _) = resolver(MockLiterature::new().with_link("A", "B"), 10);
        let report = resolver.resolve(&ids(&["S", "A"]), &HashSet::new()).await;
        assert!(report.edges.is_empty());
    }

    #[tokio::test]
    async fn test_existing_citation_edges_are_skipped() {
        let (resolver, _) = resolver(MockLiterature::new().with_link("A", "S"), 10);
        let existing = HashSet::from([
            Edge::new(PaperId::from("A"), PaperId::from("S"), EdgeKind::IsCitedBy).key(),
        ]);
        let report = resolver.resolve(&ids(&["S", "A"]), &existing).await;
        assert!(report.edges.is_empty());
    }

    #[tokio::test]
    async fn test_query_count_is_bounded() {
        let (resolver, mock) = resolver(MockLiterature::new().with_link("N1", "N12"), 3);
        let nodes: Vec<PaperId> = (1..=12).map(|i| PaperId::from(format!("N{}", i).as_str())).collect();

        let report = resolver.resolve(&nodes, &HashSet::new()).await;

        assert_eq!(mock.link_calls(), 6);
        assert_eq!(report.checked, ids(&["N1", "N2", "N3"]));
        assert!(report.truncated);
        // N12 was not queried, but it is visible
        assert_eq!(report.edges.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_the_pass() {
        let (resolver, _) = resolver(
            MockLiterature::new()
                .with_link("A", "B")
                .with_link("C", "B")
                .failing_links_for("A"),
            10,
        );
        let report = resolver.resolve(&ids(&["A", "B", "C"]), &HashSet::new()).await;

        assert_eq!(report.failures.len(), 2);
        assert!(report.is_partial());
        // A's outgoing lookup failed, but B's incoming lookup still sees A
        let pairs: HashSet<(String, String)> = report
            .edges
            .iter()
            .map(|e| (e.source.to_string(), e.target.to_string()))
            .collect();
        assert_eq!(
            pairs,
            HashSet::from([("A".into(), "B".into()), ("C".into(), "B".into())])
        );
    }
}
