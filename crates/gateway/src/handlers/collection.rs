//! Collection membership handlers
//!
//! The gateway owns an in-memory collection. Every change is published on
//! its feed, and open columns are recolored right away as well so the
//! response reflects the new state.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::parse_paper_id;
use crate::AppState;
use citegraph_common::errors::Result;

#[derive(Serialize)]
pub struct CollectionResponse {
    pub paper_id: String,
    pub in_collection: bool,
    /// Whether the collection actually changed
    pub changed: bool,
    /// Open columns whose graph was recolored
    pub columns_updated: usize,
}

/// Save a paper to the collection
pub async fn add_to_collection(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<CollectionResponse>> {
    let paper_id = parse_paper_id(&paper_id, "paper_id")?;

    let changed = state.collection.add(paper_id.clone()).await;
    let columns_updated = state.columns.on_node_added_to_collection(&paper_id).await;

    tracing::debug!(paper_id = %paper_id, changed, columns_updated, "Added to collection");

    Ok(Json(CollectionResponse {
        paper_id: paper_id.to_string(),
        in_collection: true,
        changed,
        columns_updated,
    }))
}

/// Remove a paper from the collection
pub async fn remove_from_collection(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<CollectionResponse>> {
    let paper_id = parse_paper_id(&paper_id, "paper_id")?;

    let changed = state.collection.remove(&paper_id).await;
    let columns_updated = state.columns.on_node_removed_from_collection(&paper_id).await;

    tracing::debug!(paper_id = %paper_id, changed, columns_updated, "Removed from collection");

    Ok(Json(CollectionResponse {
        paper_id: paper_id.to_string(),
        in_collection: false,
        changed,
        columns_updated,
    }))
}
