//! CiteGraph exploration engine
//!
//! Incrementally builds citation graphs from upstream literature lookups:
//! - `encoding`: deterministic node colors, classes and sizes
//! - `normalize`: heterogeneous upstream records into `PaperNode`s
//! - `graph`: additive, idempotent graph merging with deferred edges
//! - `crossref`: citation links among already visible nodes
//! - `controller`: single expansion steps with in-flight deduplication
//! - `fallback`: ordered relation kinds for seeding a graph
//! - `trail` / `columns`: side-by-side graphs sharing one navigation trail

pub mod columns;
pub mod controller;
pub mod crossref;
pub mod encoding;
pub mod fallback;
pub mod graph;
pub mod normalize;
pub mod trail;

pub use columns::{ColumnId, ColumnManager, ColumnManagerConfig, ColumnOpened, ColumnSummary, ColumnView};
pub use controller::{ExpansionOutcome, ExpansionReport, Explorer, ExplorerConfig, GraphHandle};
pub use crossref::{CrossReferenceReport, CrossReferenceResolver};
pub use encoding::{AgeTier, Color, NodeClass, NodeEncoder, IN_COLLECTION_COLOR};
pub use fallback::{AttemptResult, FallbackAttempt, FallbackOutcome, FallbackSelector};
pub use graph::{CitationGraph, GraphState, GraphView, MergeBatch, MergeReport};
pub use normalize::{NormalizedBatch, ResultNormalizer};
pub use trail::{ExplorationRecord, NavigationTrail, TrailEntry};
