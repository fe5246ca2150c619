//! Navigation trail handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::AppState;
use citegraph_common::errors::Result;
use citegraph_explorer::TrailEntry;

#[derive(Serialize)]
pub struct TrailResponse {
    pub entries: Vec<TrailEntry>,
}

#[derive(Serialize)]
pub struct NavigateResponse {
    /// The entry navigated to, now the last one
    pub entry: TrailEntry,
    pub entries: Vec<TrailEntry>,
}

/// Get the shared trail, oldest first
pub async fn get_trail(State(state): State<AppState>) -> Json<TrailResponse> {
    Json(TrailResponse {
        entries: state.columns.trail().await,
    })
}

/// Go back to an earlier entry, discarding later ones in every column
pub async fn navigate(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<NavigateResponse>> {
    let entry = state.columns.navigate_to(index).await?;
    Ok(Json(NavigateResponse {
        entry,
        entries: state.columns.trail().await,
    }))
}
