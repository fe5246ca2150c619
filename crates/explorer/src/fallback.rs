//! Fallback strategy selection
//!
//! A fresh graph is seeded by trying relation kinds in a declared order
//! until one yields at least one paper besides the seed. Running out of
//! kinds is an ordinary outcome.

use crate::controller::{ExpansionOutcome, ExpansionReport, Explorer};
use crate::graph::CitationGraph;
use citegraph_common::errors::{AppError, Result};
use citegraph_common::metrics;
use citegraph_common::models::{PaperId, RelationKind};
use serde::Serialize;
use std::sync::Weak;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

/// Ordered list of relation kinds to try
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackSelector {
    order: Vec<RelationKind>,
}

impl Default for FallbackSelector {
    fn default() -> Self {
        Self::new(RelationKind::DEFAULT_FALLBACK.to_vec())
    }
}

impl FallbackSelector {
    pub fn new(order: Vec<RelationKind>) -> Self {
        let mut deduped = Vec::with_capacity(order.len());
        for kind in order {
            if !deduped.contains(&kind) {
                deduped.push(kind);
            }
        }
        Self { order: deduped }
    }

    pub fn order(&self) -> &[RelationKind] {
        &self.order
    }

    /// Attempt order when the caller asked for `preferred`: that kind first,
    /// then the configured order without repeats
    pub fn plan(&self, preferred: Option<RelationKind>) -> Vec<RelationKind> {
        let mut plan: Vec<RelationKind> = preferred.into_iter().collect();
        for kind in &self.order {
            if !plan.contains(kind) {
                plan.push(*kind);
            }
        }
        plan
    }
}

/// Why one relation kind was passed over
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "message", rename_all = "snake_case")]
pub enum AttemptResult {
    /// Upstream returned nothing besides the seed
    Empty,
    /// An identical expansion was already running
    InFlight,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackAttempt {
    pub relation: RelationKind,
    #[serde(flatten)]
    pub result: AttemptResult,
}

#[derive(Debug, Clone)]
pub enum FallbackOutcome {
    Resolved {
        used_kind: RelationKind,
        /// Whether `used_kind` differs from the first kind tried
        fallback_used: bool,
        report: ExpansionReport,
        /// Kinds passed over before `used_kind`
        attempts: Vec<FallbackAttempt>,
    },
    /// No kind produced usable data
    Exhausted { attempts: Vec<FallbackAttempt> },
    /// The graph was closed while attempts were running
    Discarded,
}

impl FallbackOutcome {
    pub fn used_kind(&self) -> Option<RelationKind> {
        match self {
            FallbackOutcome::Resolved { used_kind, .. } => Some(*used_kind),
            _ => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, FallbackOutcome::Exhausted { .. })
    }
}

impl Explorer {
    /// Expand `seed` with each kind of `order` in turn and stop at the first
    /// that adds a paper. Fetch failures are recorded and the next kind is
    /// tried; only a missing seed is an error.
    #[instrument(skip_all, fields(seed = %seed))]
    pub async fn select_with_fallback(
        &self,
        graph: &Weak<RwLock<CitationGraph>>,
        seed: &PaperId,
        order: &[RelationKind],
    ) -> Result<FallbackOutcome> {
        let mut attempts = Vec::new();

        for &relation in order {
            let result = match self.expand(graph, seed, relation).await {
                Ok(ExpansionOutcome::Expanded(report)) if report.result_count() > 0 => {
                    let fallback_used = order.first() != Some(&relation);
                    if fallback_used {
                        info!(used = %relation, skipped = attempts.len(), "Seeded graph through fallback");
                    }
                    metrics::record_fallback(relation.as_str());
                    return Ok(FallbackOutcome::Resolved {
                        used_kind: relation,
                        fallback_used,
                        report,
                        attempts,
                    });
                }
                Ok(ExpansionOutcome::Expanded(_)) => AttemptResult::Empty,
                Ok(ExpansionOutcome::AlreadyInFlight) => AttemptResult::InFlight,
                Ok(ExpansionOutcome::Discarded) => return Ok(FallbackOutcome::Discarded),
                Err(e @ AppError::NodeNotFound { .. }) => return Err(e),
                Err(e) => {
                    warn!(relation = %relation, error = %e, "Fallback attempt failed");
                    AttemptResult::Failed(e.to_string())
                }
            };
            attempts.push(FallbackAttempt { relation, result });
        }

        info!(tried = attempts.len(), "Fallback exhausted");
        metrics::record_fallback("exhausted");
        Ok(FallbackOutcome::Exhausted { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ExplorerConfig, GraphHandle};
    use citegraph_common::collection::InMemoryCollection;
    use citegraph_common::models::PaperNode;
    use citegraph_common::upstream::{MockLiterature, Upstream};
    use serde_json::json;
    use std::sync::Arc;

    const ORDER: [RelationKind; 3] = RelationKind::DEFAULT_FALLBACK;

    async fn setup(mock: MockLiterature) -> (Explorer, GraphHandle) {
        let mock = Arc::new(mock);
        let upstream = Upstream {
            search: mock.clone(),
            links: mock,
        };
        let explorer = Explorer::new(
            upstream,
            Arc::new(InMemoryCollection::new()),
            ExplorerConfig::default(),
        )
        .with_reference_year(2025);
        let graph = explorer
            .create_graph(PaperNode::new(PaperId::from("S"), "Seed", 2020))
            .await;
        (explorer, graph)
    }

    #[test]
    fn test_plan_puts_preferred_first() {
        let selector = FallbackSelector::default();
        assert_eq!(
            selector.plan(Some(RelationKind::Similar)),
            vec![RelationKind::Similar, RelationKind::Citations, RelationKind::References]
        );
        assert_eq!(
            selector.plan(Some(RelationKind::Authors)),
            vec![
                RelationKind::Authors,
                RelationKind::Citations,
                RelationKind::References,
                RelationKind::Similar
            ]
        );
        assert_eq!(selector.plan(None), ORDER.to_vec());
    }

    #[test]
    fn test_duplicate_kinds_are_collapsed() {
        let selector = FallbackSelector::new(vec![
            RelationKind::Similar,
            RelationKind::Similar,
            RelationKind::Citations,
        ]);
        assert_eq!(selector.order(), &[RelationKind::Similar, RelationKind::Citations]);
    }

    #[tokio::test]
    async fn test_first_kind_with_data_wins() {
        let (explorer, graph) = setup(
            MockLiterature::new()
                .with_related("S", RelationKind::Citations, vec![json!({"id": "A"})])
                .with_related("S", RelationKind::Similar, vec![json!({"id": "B"})]),
        )
        .await;

        let outcome = explorer
            .select_with_fallback(&Arc::downgrade(&graph), &PaperId::from("S"), &ORDER)
            .await
            .unwrap();

        match outcome {
            FallbackOutcome::Resolved { used_kind, fallback_used, attempts, .. } => {
                assert_eq!(used_kind, RelationKind::Citations);
                assert!(!fallback_used);
                assert!(attempts.is_empty());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_kind_falls_through() {
        let (explorer, graph) = setup(
            MockLiterature::new()
                .failing_relation("S", RelationKind::Citations)
                .with_related("S", RelationKind::References, vec![json!({"id": "R"})]),
        )
        .await;

        let outcome = explorer
            .select_with_fallback(&Arc::downgrade(&graph), &PaperId::from("S"), &ORDER)
            .await
            .unwrap();

        match outcome {
            FallbackOutcome::Resolved { used_kind, fallback_used, attempts, .. } => {
                assert_eq!(used_kind, RelationKind::References);
                assert!(fallback_used);
                assert_eq!(attempts.len(), 1);
                assert!(matches!(attempts[0].result, AttemptResult::Failed(_)));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhaustion_is_an_outcome() {
        let (explorer, graph) = setup(MockLiterature::new()).await;

        let outcome = explorer
            .select_with_fallback(&Arc::downgrade(&graph), &PaperId::from("S"), &ORDER)
            .await
            .unwrap();

        assert!(outcome.is_exhausted());
        assert_eq!(outcome.used_kind(), None);
        if let FallbackOutcome::Exhausted { attempts } = outcome {
            assert_eq!(attempts.len(), 3);
            assert!(attempts.iter().all(|a| a.result == AttemptResult::Empty));
        }
        assert_eq!(graph.read().await.node_count(), 1);
    }

    #[tokio::test]
    async fn test_result_echoing_seed_is_not_usable() {
        let (explorer, graph) = setup(
            MockLiterature::new()
                .with_related("S", RelationKind::Citations, vec![json!({"id": "S"})])
                .with_related("S", RelationKind::Similar, vec![json!({"id": "B"})]),
        )
        .await;

        let outcome = explorer
            .select_with_fallback(&Arc::downgrade(&graph), &PaperId::from("S"), &ORDER)
            .await
            .unwrap();

        assert_eq!(outcome.used_kind(), Some(RelationKind::Similar));
    }

    #[test]
    fn test_attempt_serialization() {
        let attempt = FallbackAttempt {
            relation: RelationKind::Citations,
            result: AttemptResult::Failed("503".into()),
        };
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["relation"], "citations");
        assert_eq!(json["result"], "failed");
        assert_eq!(json["message"], "503");
    }
}
