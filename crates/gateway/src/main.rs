//! CiteGraph API Gateway
//!
//! HTTP entry point for the presentation layer.
//! Handles:
//! - Column lifecycle, selection and expansion
//! - The shared navigation trail
//! - Collection membership changes
//! - Observability (logging, metrics)

mod handlers;

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use citegraph_common::{
    collection::InMemoryCollection,
    config::AppConfig,
    metrics::{self, UPSTREAM_BUCKETS},
    upstream::create_upstream,
};
use citegraph_explorer::{ColumnManager, ColumnManagerConfig, Explorer, ExplorerConfig};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub columns: Arc<ColumnManager>,
    pub collection: Arc<InMemoryCollection>,
}

impl AppState {
    /// Wire the engine from configuration
    pub fn from_config(config: AppConfig) -> citegraph_common::Result<Self> {
        let upstream = create_upstream(&config.upstream)?;
        let collection = Arc::new(InMemoryCollection::new());
        let explorer = Explorer::new(upstream, collection.clone(), ExplorerConfig::from(&config));
        let columns = ColumnManager::new(Arc::new(explorer), ColumnManagerConfig::from(&config));

        Ok(Self {
            config: Arc::new(config),
            columns: Arc::new(columns),
            collection,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    // Initialize tracing
    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        "Starting CiteGraph API Gateway v{}",
        citegraph_common::VERSION
    );

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .add_global_label("service", config.observability.service_name.clone())
            .set_buckets_for_metric(
                Matcher::Suffix("upstream_duration_seconds".to_string()),
                UPSTREAM_BUCKETS,
            )?
            .install()
            .context("failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }

    // Create app state
    let state = AppState::from_config(config)?;
    info!(
        provider = %state.config.upstream.provider,
        crossref_max_nodes = state.config.exploration.crossref_max_nodes,
        "Exploration engine ready"
    );

    // Recolor open columns whenever the collection changes
    let watcher = state
        .columns
        .clone()
        .watch_membership(state.collection.subscribe());

    // Build the router
    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .context("invalid server address")?;
    let app = create_router(state);

    // Start the server
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    watcher.abort();
    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Requests running past server.request_timeout_secs answer 408
    let timeout = TimeoutLayer::new(state.config.request_timeout());

    // API routes
    let api_routes = Router::new()
        // Columns
        .route(
            "/columns",
            post(handlers::columns::open_column).get(handlers::columns::list_columns),
        )
        .route(
            "/columns/{id}",
            get(handlers::columns::get_column).delete(handlers::columns::close_column),
        )
        .route("/columns/{id}/select", post(handlers::columns::select_node))
        .route("/columns/{id}/expand", post(handlers::columns::expand))

        // Navigation trail
        .route("/trail", get(handlers::trail::get_trail))
        .route("/trail/{index}/navigate", post(handlers::trail::navigate))

        // Collection membership (DOIs contain slashes)
        .route(
            "/collection/{*paper_id}",
            put(handlers::collection::add_to_collection)
                .delete(handlers::collection::remove_from_collection),
        );

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/v1", api_routes)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use citegraph_common::upstream::{MockLiterature, Upstream};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> (Router, AppState) {
        let mut config = AppConfig::default();
        config.upstream.provider = "mock".to_string();
        let state = AppState::from_config(config).unwrap();
        (create_router(state.clone()), state)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["columns_open"], 0);
    }

    #[tokio::test]
    async fn test_unknown_column_is_404() {
        let (app, _) = app();
        let uri = format!("/v1/columns/{}", uuid::Uuid::new_v4());
        let (status, body) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "COLUMN_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_blank_seed_is_rejected() {
        let (app, _) = app();
        let (status, _) = call(&app, "POST", "/v1/columns", Some(json!({"seed_id": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_seed_paper_is_upstream_error() {
        let (app, _) = app();
        let (status, body) = call(&app, "POST", "/v1/columns", Some(json!({"seed_id": "W1"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["retryable"], true);
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let mut config = AppConfig::default();
        config.server.request_timeout_secs = 1;

        let mock = Arc::new(MockLiterature::new().with_latency(Duration::from_secs(5)));
        let upstream = Upstream {
            search: mock.clone(),
            links: mock,
        };
        let collection = Arc::new(InMemoryCollection::new());
        let explorer = Explorer::new(upstream, collection.clone(), ExplorerConfig::from(&config));
        let columns = ColumnManager::new(Arc::new(explorer), ColumnManagerConfig::from(&config));
        let state = AppState {
            config: Arc::new(config),
            columns: Arc::new(columns),
            collection,
        };
        let app = create_router(state.clone());

        let (status, _) = call(&app, "POST", "/v1/columns", Some(json!({"seed_id": "W1"}))).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(state.columns.column_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_trail() {
        let (app, _) = app();
        let (status, body) = call(&app, "GET", "/v1/trail", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entries"], json!([]));

        let (status, _) = call(&app, "POST", "/v1/trail/0/navigate", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_collection_round_trip() {
        let (app, state) = app();
        let (status, body) = call(&app, "PUT", "/v1/collection/10.1038/NATURE14539", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["paper_id"], "10.1038/nature14539");
        assert_eq!(body["changed"], true);
        assert_eq!(state.collection.len().await, 1);

        let (_, body) = call(&app, "PUT", "/v1/collection/10.1038/nature14539", None).await;
        assert_eq!(body["changed"], false);

        let (status, body) = call(&app, "DELETE", "/v1/collection/10.1038/nature14539", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["in_collection"], false);
        assert_eq!(state.collection.len().await, 0);
    }
}
