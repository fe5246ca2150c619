//! Column handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{parse_paper_id, validation_error};
use crate::AppState;
use citegraph_common::{errors::Result, models::RelationKind};
use citegraph_explorer::{
    ColumnId, ColumnSummary, ColumnView, ExpansionOutcome, ExpansionReport, FallbackAttempt,
    FallbackOutcome,
};

/// Request to open a column
#[derive(Debug, Deserialize, Validate)]
pub struct OpenColumnRequest {
    /// Seed paper: OpenAlex id or URL, or a DOI
    #[validate(length(min = 1, max = 512))]
    pub seed_id: String,

    /// Relation tried first; the configured fallback order follows
    pub relation: Option<RelationKind>,

    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct OpenColumnResponse {
    pub column: ColumnView,
    pub used_relation: Option<RelationKind>,
    pub fallback_used: bool,
    pub exhausted: bool,
    pub attempts: Vec<FallbackAttempt>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SelectNodeRequest {
    #[validate(length(min = 1, max = 512))]
    pub node_id: String,
}

#[derive(Serialize)]
pub struct SelectNodeResponse {
    pub column_id: ColumnId,
    pub selected: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExpandRequest {
    #[validate(length(min = 1, max = 512))]
    pub node_id: String,
    pub relation: RelationKind,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandStatus {
    Expanded,
    InFlight,
    Discarded,
}

#[derive(Serialize)]
pub struct ExpandResponse {
    pub status: ExpandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ExpansionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<ColumnView>,
}

/// Open a column seeded from an upstream paper
pub async fn open_column(
    State(state): State<AppState>,
    Json(request): Json<OpenColumnRequest>,
) -> Result<(StatusCode, Json<OpenColumnResponse>)> {
    request.validate().map_err(validation_error)?;
    let seed_id = parse_paper_id(&request.seed_id, "seed_id")?;

    let opened = state
        .columns
        .open_column_for(&seed_id, request.relation, request.title)
        .await?;
    let column = state.columns.view(opened.id).await?;
    let exhausted = opened.outcome.is_exhausted();

    let (fallback_used, attempts) = match opened.outcome {
        FallbackOutcome::Resolved { fallback_used, attempts, .. } => (fallback_used, attempts),
        FallbackOutcome::Exhausted { attempts } => (false, attempts),
        FallbackOutcome::Discarded => (false, Vec::new()),
    };

    tracing::info!(
        column_id = %opened.id,
        seed = %seed_id,
        nodes = column.graph.nodes.len(),
        "Column opened"
    );

    Ok((
        StatusCode::CREATED,
        Json(OpenColumnResponse {
            used_relation: column.summary.used_relation,
            exhausted,
            column,
            fallback_used,
            attempts,
        }),
    ))
}

/// List open columns
pub async fn list_columns(State(state): State<AppState>) -> Json<Vec<ColumnSummary>> {
    Json(state.columns.summaries().await)
}

/// Get one column with its graph
pub async fn get_column(
    State(state): State<AppState>,
    Path(column_id): Path<Uuid>,
) -> Result<Json<ColumnView>> {
    Ok(Json(state.columns.view(column_id.into()).await?))
}

/// Close a column and drop its graph
pub async fn close_column(
    State(state): State<AppState>,
    Path(column_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.columns.close_column(column_id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Select a node within a column
pub async fn select_node(
    State(state): State<AppState>,
    Path(column_id): Path<Uuid>,
    Json(request): Json<SelectNodeRequest>,
) -> Result<Json<SelectNodeResponse>> {
    request.validate().map_err(validation_error)?;
    let node_id = parse_paper_id(&request.node_id, "node_id")?;
    let column_id = ColumnId::from(column_id);

    state.columns.select_node(column_id, &node_id).await?;
    let selected = state.columns.selected(column_id).await?;

    Ok(Json(SelectNodeResponse {
        column_id,
        selected: selected.map(|id| id.to_string()),
    }))
}

/// Expand a node of a column by one relation
pub async fn expand(
    State(state): State<AppState>,
    Path(column_id): Path<Uuid>,
    Json(request): Json<ExpandRequest>,
) -> Result<Json<ExpandResponse>> {
    request.validate().map_err(validation_error)?;
    let node_id = parse_paper_id(&request.node_id, "node_id")?;
    let column_id = ColumnId::from(column_id);

    let outcome = state
        .columns
        .expand(column_id, &node_id, request.relation)
        .await?;

    let response = match outcome {
        ExpansionOutcome::Expanded(report) => ExpandResponse {
            status: ExpandStatus::Expanded,
            report: Some(report),
            column: state.columns.view(column_id).await.ok(),
        },
        ExpansionOutcome::AlreadyInFlight => ExpandResponse {
            status: ExpandStatus::InFlight,
            report: None,
            column: None,
        },
        ExpansionOutcome::Discarded => ExpandResponse {
            status: ExpandStatus::Discarded,
            report: None,
            column: None,
        },
    };

    Ok(Json(response))
}
