//! Column manager
//!
//! Owns the open columns, each wrapping its own graph instance and
//! selection, and the single navigation trail they share.

use crate::controller::{ExpansionOutcome, Explorer, GraphHandle};
use crate::fallback::FallbackOutcome;
use crate::graph::GraphView;
use crate::trail::{NavigationTrail, TrailEntry};
use chrono::{DateTime, Utc};
use citegraph_common::collection::MembershipChange;
use citegraph_common::config::AppConfig;
use citegraph_common::errors::{AppError, Result};
use citegraph_common::metrics;
use citegraph_common::models::{PaperId, PaperNode, RelationKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(pub Uuid);

impl ColumnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ColumnId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ColumnId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct ColumnManagerConfig {
    pub max_columns: usize,
    pub trail_max_len: usize,
}

impl Default for ColumnManagerConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ColumnManagerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_columns: config.columns.max_columns,
            trail_max_len: config.columns.trail_max_len,
        }
    }
}

struct Column {
    id: ColumnId,
    title: String,
    /// Kind asked for when the column was opened
    relation: Option<RelationKind>,
    /// Kind that actually seeded the graph
    used_relation: Option<RelationKind>,
    graph: GraphHandle,
    selected: Option<PaperId>,
    opened_at: DateTime<Utc>,
}

/// Result of opening a column
#[derive(Debug, Clone)]
pub struct ColumnOpened {
    pub id: ColumnId,
    pub outcome: FallbackOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub id: ColumnId,
    pub title: String,
    pub relation: Option<RelationKind>,
    pub used_relation: Option<RelationKind>,
    pub selected: Option<PaperId>,
    pub nodes: usize,
    pub edges: usize,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnView {
    #[serde(flatten)]
    pub summary: ColumnSummary,
    pub graph: GraphView,
}

pub struct ColumnManager {
    explorer: Arc<Explorer>,
    config: ColumnManagerConfig,
    columns: RwLock<Vec<Column>>,
    trail: Mutex<NavigationTrail>,
}

impl ColumnManager {
    pub fn new(explorer: Arc<Explorer>, config: ColumnManagerConfig) -> Self {
        let trail = NavigationTrail::new(config.trail_max_len);
        Self {
            explorer,
            config,
            columns: RwLock::new(Vec::new()),
            trail: Mutex::new(trail),
        }
    }

    pub fn explorer(&self) -> &Arc<Explorer> {
        &self.explorer
    }

    /// Open a column around `seed` and populate it through the fallback
    /// selector, trying `relation` first when given. An exhausted fallback
    /// still leaves the column open with the seed alone.
    #[instrument(skip_all, fields(seed = %seed.id))]
    pub async fn open_column(
        &self,
        seed: PaperNode,
        relation: Option<RelationKind>,
        title: Option<String>,
    ) -> Result<ColumnOpened> {
        let seed_id = seed.id.clone();
        let title = title.unwrap_or_else(|| seed.title.clone());
        let graph = self.explorer.create_graph(seed).await;
        let weak = Arc::downgrade(&graph);
        let id = ColumnId::new();

        {
            let mut columns = self.columns.write().await;
            if columns.len() >= self.config.max_columns {
                return Err(AppError::ColumnLimitReached {
                    limit: self.config.max_columns,
                });
            }
            columns.push(Column {
                id,
                title,
                relation,
                used_relation: None,
                graph,
                selected: Some(seed_id.clone()),
                opened_at: Utc::now(),
            });
            metrics::set_columns_open(columns.len());
        }

        let plan = self.explorer.fallback().plan(relation);
        let outcome = self.explorer.select_with_fallback(&weak, &seed_id, &plan).await?;

        if let FallbackOutcome::Resolved { used_kind, report, .. } = &outcome {
            let mut columns = self.columns.write().await;
            if let Some(column) = columns.iter_mut().find(|c| c.id == id) {
                column.used_relation = Some(*used_kind);
                self.trail.lock().await.push(id, report.record.clone());
            }
        }

        info!(column_id = %id, used = ?outcome.used_kind(), "Column opened");
        Ok(ColumnOpened { id, outcome })
    }

    /// Fetch `seed_id` upstream, then open a column around it
    pub async fn open_column_for(
        &self,
        seed_id: &PaperId,
        relation: Option<RelationKind>,
        title: Option<String>,
    ) -> Result<ColumnOpened> {
        let seed = self.explorer.fetch_seed(seed_id).await?;
        self.open_column(seed, relation, title).await
    }

    /// Close a column. Its graph is dropped, so expansions still running
    /// against it finish as discarded, and its trail entries are forgotten.
    pub async fn close_column(&self, id: ColumnId) -> Result<()> {
        let mut columns = self.columns.write().await;
        let index = columns
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| column_not_found(id))?;
        let column = columns.remove(index);
        metrics::set_columns_open(columns.len());

        let removed = self.trail.lock().await.remove_column(id);
        drop(columns);
        drop(column);

        debug!(column_id = %id, trail_entries = removed, "Column closed");
        Ok(())
    }

    pub async fn select_node(&self, id: ColumnId, node_id: &PaperId) -> Result<()> {
        let mut columns = self.columns.write().await;
        let column = columns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| column_not_found(id))?;

        if !column.graph.read().await.contains(node_id) {
            return Err(AppError::NodeNotFound {
                id: node_id.to_string(),
            });
        }
        column.selected = Some(node_id.clone());
        Ok(())
    }

    pub async fn selected(&self, id: ColumnId) -> Result<Option<PaperId>> {
        let columns = self.columns.read().await;
        columns
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.selected.clone())
            .ok_or_else(|| column_not_found(id))
    }

    /// Expand a node of one column and record the step on the trail
    #[instrument(skip_all, fields(column_id = %id, node_id = %node_id, relation = %relation))]
    pub async fn expand(&self, id: ColumnId, node_id: &PaperId, relation: RelationKind) -> Result<ExpansionOutcome> {
        let graph = {
            let columns = self.columns.read().await;
            let column = columns
                .iter()
                .find(|c| c.id == id)
                .ok_or_else(|| column_not_found(id))?;
            Arc::downgrade(&column.graph)
        };

        let outcome = self.explorer.expand(&graph, node_id, relation).await?;

        if let ExpansionOutcome::Expanded(report) = &outcome {
            let columns = self.columns.read().await;
            if columns.iter().any(|c| c.id == id) {
                self.trail.lock().await.push(id, report.record.clone());
            }
        }

        Ok(outcome)
    }

    /// Go back to trail entry `index`: later entries are discarded across
    /// all columns and the entry's node becomes its column's selection
    pub async fn navigate_to(&self, index: usize) -> Result<TrailEntry> {
        let mut columns = self.columns.write().await;
        let entry = self.trail.lock().await.truncate_after(index)?;

        if let Some(column) = columns.iter_mut().find(|c| c.id == entry.column) {
            column.selected = Some(entry.record.source.clone());
        }

        debug!(index, column_id = %entry.column, "Navigated back");
        Ok(entry)
    }

    pub async fn trail(&self) -> Vec<TrailEntry> {
        self.trail.lock().await.entries()
    }

    pub async fn view(&self, id: ColumnId) -> Result<ColumnView> {
        let columns = self.columns.read().await;
        let column = columns
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| column_not_found(id))?;

        let graph = column.graph.read().await;
        Ok(ColumnView {
            summary: summarize(column, graph.node_count(), graph.edge_count()),
            graph: graph.view(),
        })
    }

    pub async fn summaries(&self) -> Vec<ColumnSummary> {
        let columns = self.columns.read().await;
        let mut summaries = Vec::with_capacity(columns.len());
        for column in columns.iter() {
            let graph = column.graph.read().await;
            summaries.push(summarize(column, graph.node_count(), graph.edge_count()));
        }
        summaries
    }

    pub async fn column_count(&self) -> usize {
        self.columns.read().await.len()
    }

    /// Recolor `paper_id` in every column after it was saved. Returns the
    /// number of columns whose graph changed.
    pub async fn on_node_added_to_collection(&self, paper_id: &PaperId) -> usize {
        self.set_membership(paper_id, true).await
    }

    pub async fn on_node_removed_from_collection(&self, paper_id: &PaperId) -> usize {
        self.set_membership(paper_id, false).await
    }

    async fn set_membership(&self, paper_id: &PaperId, in_collection: bool) -> usize {
        let columns = self.columns.read().await;
        let mut changed = 0;
        for column in columns.iter() {
            if column.graph.write().await.set_membership(paper_id, in_collection) {
                changed += 1;
            }
        }
        debug!(paper_id = %paper_id, in_collection, columns = changed, "Membership applied");
        changed
    }

    /// Apply membership changes from `changes` until the feed closes
    pub fn watch_membership(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<MembershipChange>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(MembershipChange::Added { paper_id }) => {
                        self.on_node_added_to_collection(&paper_id).await;
                    }
                    Ok(MembershipChange::Removed { paper_id }) => {
                        self.on_node_removed_from_collection(&paper_id).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Membership feed lagged, some recolors were missed");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Membership feed closed");
        })
    }
}

fn summarize(column: &Column, nodes: usize, edges: usize) -> ColumnSummary {
    ColumnSummary {
        id: column.id,
        title: column.title.clone(),
        relation: column.relation,
        used_relation: column.used_relation,
        selected: column.selected.clone(),
        nodes,
        edges,
        opened_at: column.opened_at,
    }
}

fn column_not_found(id: ColumnId) -> AppError {
    AppError::ColumnNotFound { id: id.to_string() }
}
