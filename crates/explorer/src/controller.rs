//! Exploration controller
//!
//! Runs one "expand" step against a graph instance: fetch, normalize, merge,
//! then resolve cross-references among the visible nodes and merge those.
//!
//! Graphs are handed in as `Weak` handles. A column that closes while an
//! expansion is awaiting the network drops the last strong handle, and the
//! expansion then finishes as `Discarded` without touching anything.

use crate::crossref::{CrossReferenceReport, CrossReferenceResolver};
use crate::encoding::NodeEncoder;
use crate::fallback::FallbackSelector;
use crate::graph::{CitationGraph, MergeBatch, MergeReport};
use crate::normalize::ResultNormalizer;
use crate::trail::ExplorationRecord;
use citegraph_common::collection::CollectionMembership;
use citegraph_common::config::AppConfig;
use citegraph_common::errors::{AppError, Result};
use citegraph_common::metrics;
use citegraph_common::models::{Edge, PaperId, PaperNode, RelationKind, SearchFilter};
use citegraph_common::upstream::{LiteratureSearch, Upstream};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Shared ownership of one graph instance
pub type GraphHandle = Arc<RwLock<CitationGraph>>;

/// Engine settings
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    pub result_limit: usize,
    pub crossref_max_nodes: usize,
    pub fallback_order: Vec<RelationKind>,
    pub max_pending_edges: usize,
    pub filter: SearchFilter,
    pub min_node_size: f32,
    pub max_node_size: f32,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ExplorerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            result_limit: config.exploration.result_limit,
            crossref_max_nodes: config.exploration.crossref_max_nodes,
            fallback_order: config.exploration.fallback_order.clone(),
            max_pending_edges: config.exploration.max_pending_edges,
            filter: SearchFilter {
                open_access_only: config.upstream.open_access_only,
            },
            min_node_size: config.encoding.min_node_size,
            max_node_size: config.encoding.max_node_size,
        }
    }
}

/// What an expansion changed
#[derive(Debug, Clone, Serialize)]
pub struct ExpansionReport {
    pub source: PaperId,
    pub relation: RelationKind,
    pub nodes_added: Vec<PaperId>,
    /// Edges inserted by the primary merge and the cross-reference merge
    pub edges_added: usize,
    pub cross_reference_edges: usize,
    pub cross_reference_failures: usize,
    pub normalization_failures: usize,
    pub merge: MergeReport,
    pub record: ExplorationRecord,
}

impl ExpansionReport {
    /// Papers returned by upstream, excluding the source itself
    pub fn result_count(&self) -> usize {
        self.record.results.len()
    }
}

#[derive(Debug, Clone)]
pub enum ExpansionOutcome {
    Expanded(ExpansionReport),
    /// The same expansion was already running; nothing was fetched
    AlreadyInFlight,
    /// The graph was closed before the results could be merged
    Discarded,
}

type InFlightKey = (Uuid, PaperId, RelationKind);

/// Membership of one in-flight expansion, released on drop
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<InFlightKey>>,
    key: Option<InFlightKey>,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<InFlightKey>>, key: InFlightKey) -> Option<Self> {
        let mut in_flight = set.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(Self { set, key: Some(key) })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut in_flight = self.set.lock().unwrap_or_else(|e| e.into_inner());
            in_flight.remove(&key);
        }
    }
}

pub struct Explorer {
    search: Arc<dyn LiteratureSearch>,
    membership: Arc<dyn CollectionMembership>,
    resolver: CrossReferenceResolver,
    normalizer: ResultNormalizer,
    encoder: NodeEncoder,
    fallback: FallbackSelector,
    config: ExplorerConfig,
    in_flight: Mutex<HashSet<InFlightKey>>,
}

impl Explorer {
    pub fn new(upstream: Upstream, membership: Arc<dyn CollectionMembership>, config: ExplorerConfig) -> Self {
        let encoder = NodeEncoder::for_current_year()
            .with_size_bounds(config.min_node_size, config.max_node_size);

        Self {
            search: upstream.search,
            membership,
            resolver: CrossReferenceResolver::new(upstream.links, config.crossref_max_nodes),
            normalizer: ResultNormalizer::new(encoder.current_year()),
            encoder,
            fallback: FallbackSelector::new(config.fallback_order.clone()),
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Pin the reference year used for the unknown-year sentinel and the
    /// recency tiers
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.encoder = NodeEncoder::new(year)
            .with_size_bounds(self.config.min_node_size, self.config.max_node_size);
        self.normalizer = ResultNormalizer::new(year);
        self
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn encoder(&self) -> &NodeEncoder {
        &self.encoder
    }

    pub fn fallback(&self) -> &FallbackSelector {
        &self.fallback
    }

    /// Look up and normalize a single paper to seed a graph with
    #[instrument(skip_all, fields(paper_id = %paper_id))]
    pub async fn fetch_seed(&self, paper_id: &PaperId) -> Result<PaperNode> {
        let record = self.search.fetch_paper(paper_id).await?;
        self.normalizer.normalize_paper(&record)
    }

    /// Create a graph instance holding only `seed`
    pub async fn create_graph(&self, seed: PaperNode) -> GraphHandle {
        let seed_id = seed.id.clone();
        let mut graph = CitationGraph::new(seed_id.clone(), self.encoder)
            .with_max_pending(self.config.max_pending_edges);

        let mut batch = MergeBatch::new(vec![seed], vec![]);
        if let Some(members) = self.members_among(std::slice::from_ref(&seed_id)).await {
            batch = batch.with_members(members);
        }
        graph.merge(batch);

        debug!(graph_id = %graph.id(), seed = %seed_id, "Graph created");
        Arc::new(RwLock::new(graph))
    }

    /// Expand `source` by `relation`.
    ///
    /// An upstream failure leaves the graph untouched and is returned as
    /// `AppError::Fetch`. Bad records and failed cross-reference lookups are
    /// counted in the report instead.
    #[instrument(skip_all, fields(source = %source, relation = %relation))]
    pub async fn expand(
        &self,
        graph: &Weak<RwLock<CitationGraph>>,
        source: &PaperId,
        relation: RelationKind,
    ) -> Result<ExpansionOutcome> {
        let started = Instant::now();

        let graph_id = {
            let Some(handle) = graph.upgrade() else {
                return Ok(ExpansionOutcome::Discarded);
            };
            let graph = handle.read().await;
            if !graph.contains(source) {
                return Err(AppError::NodeNotFound {
                    id: source.to_string(),
                });
            }
            graph.id()
        };

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, (graph_id, source.clone(), relation)) else {
            debug!("Expansion already in flight");
            metrics::record_inflight_duplicate(relation.as_str());
            return Ok(ExpansionOutcome::AlreadyInFlight);
        };

        let records = match self
            .search
            .fetch_related(source, relation, self.config.result_limit, &self.config.filter)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                metrics::record_expansion(started.elapsed().as_secs_f64(), relation.as_str(), "error");
                return Err(e.into_fetch(relation));
            }
        };

        let normalized = self.normalizer.normalize_batch(&records, relation);
        metrics::record_normalization_failures(normalized.failures);

        let papers: Vec<PaperNode> = normalized
            .papers
            .into_iter()
            .filter(|p| &p.id != source)
            .collect();
        let edges = synthesize_edges(source, relation, &papers);
        let result_ids: Vec<PaperId> = papers.iter().map(|p| p.id.clone()).collect();

        let mut batch = MergeBatch::new(papers.clone(), edges);
        if let Some(members) = self.members_among(&result_ids).await {
            batch = batch.with_members(members);
        }

        let Some((merge, priority, existing)) = self
            .apply(graph, |g| {
                let report = g.merge(batch);
                let priority = crossref_priority(g, source, &report.nodes_added);
                (report, priority, g.edge_keys())
            })
            .await
        else {
            return Ok(self.discarded(started, relation));
        };

        let crossref = self.resolver.resolve(&priority, &existing).await;

        let Some(crossref_merge) = self
            .apply(graph, |g| g.merge(MergeBatch::edges_only(crossref.edges.clone())))
            .await
        else {
            return Ok(self.discarded(started, relation));
        };

        let report = self.report(
            source,
            relation,
            papers,
            normalized.failures,
            merge,
            crossref_merge,
            &crossref,
        );

        metrics::record_expansion(started.elapsed().as_secs_f64(), relation.as_str(), "success");
        info!(
            results = report.result_count(),
            nodes_added = report.nodes_added.len(),
            edges_added = report.edges_added,
            cross_references = report.cross_reference_edges,
            "Expansion merged"
        );

        Ok(ExpansionOutcome::Expanded(report))
    }

    /// Run `f` on the graph if it is still alive
    async fn apply<T>(
        &self,
        graph: &Weak<RwLock<CitationGraph>>,
        f: impl FnOnce(&mut CitationGraph) -> T,
    ) -> Option<T> {
        let handle = graph.upgrade()?;
        let mut graph = handle.write().await;
        Some(f(&mut graph))
    }

    async fn members_among(&self, ids: &[PaperId]) -> Option<HashSet<PaperId>> {
        match self.membership.members_among(ids).await {
            Ok(members) => Some(members),
            Err(e) => {
                warn!(error = %e, "Collection membership lookup failed");
                None
            }
        }
    }

    fn discarded(&self, started: Instant, relation: RelationKind) -> ExpansionOutcome {
        debug!("Graph closed during expansion, discarding results");
        metrics::record_expansion(started.elapsed().as_secs_f64(), relation.as_str(), "discarded");
        ExpansionOutcome::Discarded
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        source: &PaperId,
        relation: RelationKind,
        papers: Vec<PaperNode>,
        normalization_failures: usize,
        merge: MergeReport,
        crossref_merge: MergeReport,
        crossref: &CrossReferenceReport,
    ) -> ExpansionReport {
        metrics::record_pending_edges(
            merge.edges_deferred + crossref_merge.edges_deferred,
            merge.edges_promoted + crossref_merge.edges_promoted,
            merge.edges_dropped + crossref_merge.edges_dropped,
        );

        ExpansionReport {
            source: source.clone(),
            relation,
            nodes_added: merge.nodes_added.clone(),
            edges_added: merge.edges_inserted() + crossref_merge.edges_inserted(),
            cross_reference_edges: crossref_merge.edges_inserted(),
            cross_reference_failures: crossref.failures.len(),
            normalization_failures,
            merge,
            record: ExplorationRecord::new(source.clone(), relation, papers),
        }
    }
}

/// One edge per result, oriented by the relation: later work points into the
/// source, everything else points out of it
fn synthesize_edges(source: &PaperId, relation: RelationKind, papers: &[PaperNode]) -> Vec<Edge> {
    let kind = relation.edge_kind();
    papers
        .iter()
        .map(|paper| {
            if relation.points_into_source() {
                Edge::new(paper.id.clone(), source.clone(), kind)
            } else {
                Edge::new(source.clone(), paper.id.clone(), kind)
            }
        })
        .collect()
}

/// Every node of the graph, ordered for cross-reference querying: the
/// expanded node, then nodes this merge added, then older nodes newest first
fn crossref_priority(graph: &CitationGraph, source: &PaperId, added: &[PaperId]) -> Vec<PaperId> {
    let mut seen: HashSet<&PaperId> = HashSet::with_capacity(graph.node_count());
    let mut ordered = Vec::with_capacity(graph.node_count());

    for id in std::iter::once(source)
        .chain(added.iter())
        .chain(graph.node_ids().iter().rev())
    {
        if graph.contains(id) && seen.insert(id) {
            ordered.push(id.clone());
        }
    }

    ordered
}
