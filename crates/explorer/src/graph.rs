//! Citation graph instance
//!
//! One `CitationGraph` per open column. It only grows: every mutation goes
//! through `merge`, which upserts nodes first and edges second, so an edge in
//! a batch can always refer to a node introduced by the same batch.
//!
//! Edges whose endpoint is not yet known are parked in a bounded pending
//! buffer and promoted by the first merge that supplies the endpoint.

use crate::encoding::{Color, NodeClass, NodeEncoder};
use citegraph_common::models::{Edge, EdgeKey, EdgeKind, PaperId, PaperNode};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};
use uuid::Uuid;

/// Default capacity of the pending-edge buffer
pub const DEFAULT_MAX_PENDING_EDGES: usize = 500;

/// Lifecycle of a graph instance. There is no error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphState {
    Empty,
    Populated,
}

/// Paper plus its current encoding
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub paper: PaperNode,
    pub in_collection: bool,
    pub color: Color,
    pub class: NodeClass,
    pub size: f32,
}

impl GraphNode {
    fn new(paper: PaperNode, in_collection: bool, encoder: &NodeEncoder) -> Self {
        let mut node = Self {
            paper,
            in_collection,
            color: encoder.color_for(0, in_collection),
            class: encoder.class_for(in_collection),
            size: 0.0,
        };
        node.encode(encoder);
        node
    }

    fn encode(&mut self, encoder: &NodeEncoder) {
        self.color = encoder.color_for(self.paper.year, self.in_collection);
        self.class = encoder.class_for(self.in_collection);
        self.size = encoder.size_for(self.paper.citation_count);
    }
}

/// Nodes and edges applied together
#[derive(Debug, Clone, Default)]
pub struct MergeBatch {
    pub nodes: Vec<PaperNode>,
    pub edges: Vec<Edge>,

    /// Collection members among `nodes`. `None` keeps the flags of existing
    /// nodes and marks new ones as not collected.
    pub members: Option<HashSet<PaperId>>,
}

impl MergeBatch {
    pub fn new(nodes: Vec<PaperNode>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            members: None,
        }
    }

    pub fn edges_only(edges: Vec<Edge>) -> Self {
        Self::new(Vec::new(), edges)
    }

    pub fn with_members(mut self, members: HashSet<PaperId>) -> Self {
        self.members = Some(members);
        self
    }
}

/// What a merge changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Newly inserted node ids, in batch order
    pub nodes_added: Vec<PaperId>,
    /// Existing nodes whose metadata or membership changed
    pub nodes_updated: usize,
    /// Edges inserted from this batch
    pub edges_added: usize,
    /// Previously deferred edges inserted by this merge
    pub edges_promoted: usize,
    /// Edges parked waiting for an endpoint
    pub edges_deferred: usize,
    /// Edges with an unknown endpoint turned away because the buffer was full
    pub edges_dropped: usize,
    /// Edges already present (or already pending)
    pub duplicate_edges: usize,
    /// Edges from a node to itself, which are never stored
    pub self_loops: usize,
}

impl MergeReport {
    pub fn is_noop(&self) -> bool {
        self.nodes_added.is_empty()
            && self.nodes_updated == 0
            && self.edges_added == 0
            && self.edges_promoted == 0
            && self.edges_deferred == 0
    }

    /// Edges that became visible
    pub fn edges_inserted(&self) -> usize {
        self.edges_added + self.edges_promoted
    }
}

/// In-memory citation graph for one column
#[derive(Debug, Clone, PartialEq)]
pub struct CitationGraph {
    id: Uuid,
    seed: PaperId,
    encoder: NodeEncoder,
    nodes: HashMap<PaperId, GraphNode>,
    /// Insertion order of `nodes`
    order: Vec<PaperId>,
    edges: Vec<Edge>,
    edge_keys: HashSet<EdgeKey>,
    pending: VecDeque<Edge>,
    pending_keys: HashSet<EdgeKey>,
    max_pending: usize,
}

impl CitationGraph {
    /// Create an empty graph that will be built from `seed`
    pub fn new(seed: PaperId, encoder: NodeEncoder) -> Self {
        Self {
            id: Uuid::new_v4(),
            seed,
            encoder,
            nodes: HashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            edge_keys: HashSet::new(),
            pending: VecDeque::new(),
            pending_keys: HashSet::new(),
            max_pending: DEFAULT_MAX_PENDING_EDGES,
        }
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn seed(&self) -> &PaperId {
        &self.seed
    }

    pub fn encoder(&self) -> &NodeEncoder {
        &self.encoder
    }

    pub fn state(&self) -> GraphState {
        if self.nodes.is_empty() {
            GraphState::Empty
        } else {
            GraphState::Populated
        }
    }

    pub fn contains(&self, id: &PaperId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &PaperId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_ids(&self) -> &[PaperId] {
        &self.order
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn pending_edges(&self) -> impl Iterator<Item = &Edge> {
        self.pending.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_edge(&self, edge: &Edge) -> bool {
        self.edge_keys.contains(&edge.key())
    }

    /// Snapshot of edge keys, for deduplicating work done outside the graph
    pub fn edge_keys(&self) -> HashSet<EdgeKey> {
        self.edge_keys.clone()
    }

    /// Edges incident to `id`
    pub fn edges_of<'a>(&'a self, id: &'a PaperId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.touches(id))
    }

    /// Apply a batch: node upsert, then promotion of deferred edges, then
    /// edge upsert. Applying the same batch twice changes nothing.
    pub fn merge(&mut self, batch: MergeBatch) -> MergeReport {
        let mut report = MergeReport::default();

        for paper in batch.nodes {
            let in_collection = batch.members.as_ref().map(|m| m.contains(&paper.id));
            self.upsert_node(paper, in_collection, &mut report);
        }

        self.promote_pending(&mut report);

        for edge in batch.edges {
            self.upsert_edge(edge, &mut report);
        }

        if report.edges_deferred > 0 || report.edges_dropped > 0 {
            debug!(
                graph_id = %self.id,
                deferred = report.edges_deferred,
                dropped = report.edges_dropped,
                pending = self.pending.len(),
                "Edges waiting for endpoints"
            );
        }

        report
    }

    /// Flip the collection flag of one node. Returns whether the node exists
    /// and its encoding changed.
    pub fn set_membership(&mut self, id: &PaperId, in_collection: bool) -> bool {
        let encoder = self.encoder;
        match self.nodes.get_mut(id) {
            Some(node) if node.in_collection != in_collection => {
                node.in_collection = in_collection;
                node.encode(&encoder);
                true
            }
            _ => false,
        }
    }

    fn upsert_node(&mut self, paper: PaperNode, in_collection: Option<bool>, report: &mut MergeReport) {
        let encoder = self.encoder;

        if let Some(node) = self.nodes.get_mut(&paper.id) {
            let mut changed = node.paper.absorb(&paper);
            if let Some(flag) = in_collection {
                if node.in_collection != flag {
                    node.in_collection = flag;
                    changed = true;
                }
            }
            if changed {
                node.encode(&encoder);
                report.nodes_updated += 1;
            }
            return;
        }

        let id = paper.id.clone();
        let node = GraphNode::new(paper, in_collection.unwrap_or(false), &encoder);
        self.nodes.insert(id.clone(), node);
        self.order.push(id.clone());
        report.nodes_added.push(id);
    }

    fn upsert_edge(&mut self, edge: Edge, report: &mut MergeReport) {
        if edge.is_self_loop() {
            report.self_loops += 1;
            return;
        }

        let key = edge.key();
        if self.edge_keys.contains(&key) || self.pending_keys.contains(&key) {
            report.duplicate_edges += 1;
            return;
        }

        if self.contains(&edge.source) && self.contains(&edge.target) {
            self.edge_keys.insert(key);
            self.edges.push(edge);
            report.edges_added += 1;
        } else {
            self.defer(edge, key, report);
        }
    }

    fn defer(&mut self, edge: Edge, key: EdgeKey, report: &mut MergeReport) {
        // Full buffer keeps its contents; the incoming edge is turned away
        if self.pending.len() >= self.max_pending {
            warn!(
                graph_id = %self.id,
                source = %edge.source,
                target = %edge.target,
                kind = %edge.kind,
                capacity = self.max_pending,
                "Pending edge buffer full, dropping edge with unknown endpoint"
            );
            report.edges_dropped += 1;
            return;
        }

        self.pending_keys.insert(key);
        self.pending.push_back(edge);
        report.edges_deferred += 1;
    }

    fn promote_pending(&mut self, report: &mut MergeReport) {
        if self.pending.is_empty() {
            return;
        }

        let mut waiting = VecDeque::with_capacity(self.pending.len());
        while let Some(edge) = self.pending.pop_front() {
            if self.contains(&edge.source) && self.contains(&edge.target) {
                let key = edge.key();
                self.pending_keys.remove(&key);
                if self.edge_keys.insert(key) {
                    self.edges.push(edge);
                    report.edges_promoted += 1;
                }
            } else {
                waiting.push_back(edge);
            }
        }
        self.pending = waiting;
    }

    /// Whether a directed citation-family edge already records
    /// "`citing` cites `cited`"
    pub fn has_citation_link(&self, citing: &PaperId, cited: &PaperId) -> bool {
        has_citation_link(&self.edge_keys, citing, cited)
    }

    /// Serializable snapshot for the presentation layer
    pub fn view(&self) -> GraphView {
        GraphView {
            id: self.id,
            seed: self.seed.clone(),
            state: self.state(),
            nodes: self
                .nodes()
                .map(|n| NodeView {
                    paper: n.paper.clone(),
                    color: n.color,
                    class: n.class,
                    size: n.size,
                    in_collection: n.in_collection,
                    is_seed: n.paper.id == self.seed,
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|e| EdgeView {
                    source: e.source.clone(),
                    target: e.target.clone(),
                    kind: e.kind,
                    directed: e.is_directed(),
                })
                .collect(),
            pending_edges: self.pending.len(),
        }
    }
}

/// Citation-family lookup over a key set
pub fn has_citation_link(keys: &HashSet<EdgeKey>, citing: &PaperId, cited: &PaperId) -> bool {
    [EdgeKind::Cites, EdgeKind::IsCitedBy, EdgeKind::CrossReference]
        .into_iter()
        .any(|kind| {
            keys.contains(&EdgeKey {
                a: citing.clone(),
                b: cited.clone(),
                kind,
            })
        })
}

/// Graph snapshot
#[derive(Debug, Clone, Serialize)]
pub struct GraphView {
    pub id: Uuid,
    pub seed: PaperId,
    pub state: GraphState,
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
    pub pending_edges: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    #[serde(flatten)]
    pub paper: PaperNode,
    pub color: Color,
    pub class: NodeClass,
    pub size: f32,
    pub in_collection: bool,
    pub is_seed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeView {
    pub source: PaperId,
    pub target: PaperId,
    pub kind: EdgeKind,
    pub directed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{AgeTier, IN_COLLECTION_COLOR};

    fn paper(id: &str, year: i32) -> PaperNode {
        PaperNode::new(PaperId::from(id), format!("Paper {}", id), year)
    }

    fn edge(source: &str, target: &str, kind: EdgeKind) -> Edge {
        Edge::new(PaperId::from(source), PaperId::from(target), kind)
    }

    fn graph() -> CitationGraph {
        CitationGraph::new(PaperId::from("S"), NodeEncoder::new(2025))
    }

    fn assert_referential_integrity(g: &CitationGraph) {
        for e in g.edges() {
            assert!(g.contains(&e.source), "dangling source {}", e.source);
            assert!(g.contains(&e.target), "dangling target {}", e.target);
        }
    }

    #[test]
    fn test_empty_to_populated() {
        let mut g = graph();
        assert_eq!(g.state(), GraphState::Empty);

        g.merge(MergeBatch::new(vec![paper("S", 2023)], vec![]));
        assert_eq!(g.state(), GraphState::Populated);
    }

    #[test]
    fn test_nodes_before_edges_in_one_batch() {
        let mut g = graph();
        let report = g.merge(MergeBatch::new(
            vec![paper("S", 2023), paper("A", 2024)],
            vec![edge("A", "S", EdgeKind::IsCitedBy)],
        ));

        assert_eq!(report.nodes_added.len(), 2);
        assert_eq!(report.edges_added, 1);
        assert_eq!(g.pending_count(), 0);
        assert_referential_integrity(&g);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let batch = MergeBatch::new(
            vec![paper("S", 2023), paper("A", 2024), paper("B", 2010)],
            vec![
                edge("A", "S", EdgeKind::IsCitedBy),
                edge("S", "B", EdgeKind::Cites),
                edge("B", "X", EdgeKind::Cites),
            ],
        )
        .with_members(HashSet::from([PaperId::from("B")]));

        let mut once = graph();
        once.merge(batch.clone());

        let mut twice = once.clone();
        let report = twice.merge(batch);

        assert!(report.is_noop());
        assert_eq!(report.duplicate_edges, 3);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_duplicate_edge_is_noop() {
        let mut g = graph();
        g.merge(MergeBatch::new(vec![paper("S", 2023), paper("A", 2024)], vec![]));

        let first = g.merge(MergeBatch::edges_only(vec![edge("S", "A", EdgeKind::SimilarTo)]));
        let second = g.merge(MergeBatch::edges_only(vec![
            edge("S", "A", EdgeKind::SimilarTo),
            edge("A", "S", EdgeKind::SimilarTo),
        ]));

        assert_eq!(first.edges_added, 1);
        assert_eq!(second.edges_added, 0);
        assert_eq!(second.duplicate_edges, 2);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_same_pair_different_kind_is_distinct() {
        let mut g = graph();
        g.merge(MergeBatch::new(vec![paper("S", 2023), paper("A", 2024)], vec![]));
        g.merge(MergeBatch::edges_only(vec![
            edge("A", "S", EdgeKind::Cites),
            edge("A", "S", EdgeKind::SimilarTo),
        ]));
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn test_unknown_endpoint_is_deferred_then_promoted() {
        let mut g = graph();
        let report = g.merge(MergeBatch::new(
            vec![paper("S", 2023)],
            vec![edge("S", "Z", EdgeKind::Cites)],
        ));
        assert_eq!(report.edges_deferred, 1);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.pending_count(), 1);
        assert_referential_integrity(&g);

        let report = g.merge(MergeBatch::new(vec![paper("Z", 1999)], vec![]));
        assert_eq!(report.edges_promoted, 1);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.pending_count(), 0);
        assert_referential_integrity(&g);
    }

    #[test]
    fn test_full_pending_buffer_drops_newest() {
        let mut g = graph().with_max_pending(2);
        g.merge(MergeBatch::new(vec![paper("S", 2023)], vec![]));

        let batch = MergeBatch::edges_only(vec![
            edge("S", "X1", EdgeKind::Cites),
            edge("S", "X2", EdgeKind::Cites),
            edge("S", "X3", EdgeKind::Cites),
        ]);

        let report = g.merge(batch.clone());
        assert_eq!(report.edges_deferred, 2);
        assert_eq!(report.edges_dropped, 1);
        let pending: Vec<_> = g.pending_edges().map(|e| e.target.as_str().to_string()).collect();
        assert_eq!(pending, vec!["X1", "X2"]);

        // Replaying the overflowing batch changes nothing
        let before = g.clone();
        let replay = g.merge(batch);
        assert!(replay.is_noop());
        assert_eq!(replay.edges_deferred, 0);
        assert_eq!(replay.duplicate_edges, 2);
        assert_eq!(g, before);

        // Room frees up once an endpoint arrives
        g.merge(MergeBatch::new(vec![paper("X1", 2020)], vec![]));
        assert_eq!(g.pending_count(), 1);
        let report = g.merge(MergeBatch::edges_only(vec![edge("S", "X3", EdgeKind::Cites)]));
        assert_eq!(report.edges_deferred, 1);
        assert_eq!(g.pending_count(), 2);
    }

    #[test]
    fn test_self_loops_are_not_stored() {
        let mut g = graph();
        g.merge(MergeBatch::new(vec![paper("S", 2023)], vec![]));
        let report = g.merge(MergeBatch::edges_only(vec![edge("S", "S", EdgeKind::Cites)]));
        assert_eq!(report.self_loops, 1);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_node_metadata_is_not_degraded() {
        let mut g = graph();
        let mut rich = paper("A", 2020);
        rich.citation_count = 400;
        rich.authors = vec!["Hinton".into()];
        g.merge(MergeBatch::new(vec![rich], vec![]));

        let mut degenerate = PaperNode::new(PaperId::from("A"), "", 2025);
        degenerate.year_estimated = true;
        let report = g.merge(MergeBatch::new(vec![degenerate], vec![]));

        assert_eq!(report.nodes_updated, 0);
        let node = g.node(&PaperId::from("A")).unwrap();
        assert_eq!(node.paper.title, "Paper A");
        assert_eq!(node.paper.year, 2020);
        assert_eq!(node.paper.citation_count, 400);
        assert_eq!(node.color, AgeTier::UpToFiveYears.color());
    }

    #[test]
    fn test_membership_recolors_node() {
        let mut g = graph();
        g.merge(MergeBatch::new(vec![paper("A", 2024)], vec![]));
        let id = PaperId::from("A");
        assert_eq!(g.node(&id).unwrap().class, NodeClass::Suggested);

        assert!(g.set_membership(&id, true));
        assert_eq!(g.node(&id).unwrap().color, IN_COLLECTION_COLOR);
        assert!(!g.set_membership(&id, true));
        assert!(!g.set_membership(&PaperId::from("missing"), true));

        assert!(g.set_membership(&id, false));
        assert_eq!(g.node(&id).unwrap().color, AgeTier::UpToOneYear.color());
    }

    #[test]
    fn test_batch_without_membership_keeps_flags() {
        let mut g = graph();
        g.merge(
            MergeBatch::new(vec![paper("A", 2024)], vec![])
                .with_members(HashSet::from([PaperId::from("A")])),
        );
        g.merge(MergeBatch::new(vec![paper("A", 2024)], vec![]));
        assert!(g.node(&PaperId::from("A")).unwrap().in_collection);
    }

    #[test]
    fn test_citation_link_lookup_spans_citation_kinds() {
        let mut g = graph();
        g.merge(MergeBatch::new(
            vec![paper("S", 2023), paper("A", 2024)],
            vec![edge("A", "S", EdgeKind::IsCitedBy)],
        ));
        assert!(g.has_citation_link(&PaperId::from("A"), &PaperId::from("S")));
        assert!(!g.has_citation_link(&PaperId::from("S"), &PaperId::from("A")));
    }

    #[test]
    fn test_view_marks_seed_and_direction() {
        let mut g = graph();
        g.merge(MergeBatch::new(
            vec![paper("S", 2023), paper("A", 2024)],
            vec![edge("A", "S", EdgeKind::IsCitedBy), edge("S", "A", EdgeKind::SimilarTo)],
        ));
        let view = g.view();
        assert_eq!(view.nodes.len(), 2);
        assert!(view.nodes[0].is_seed);
        assert!(!view.nodes[1].is_seed);
        assert!(view.edges[0].directed);
        assert!(!view.edges[1].directed);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["state"], "populated");
        assert_eq!(json["edges"][0]["kind"], "is-cited-by");
        assert_eq!(json["nodes"][0]["id"], "S");
    }
}
