//! Configuration management for CiteGraph
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use crate::models::RelationKind;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Literature search / link discovery upstream
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Exploration engine tuning
    #[serde(default)]
    pub exploration: ExplorationConfig,

    /// Column and trail limits
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Node size encoding bounds
    #[serde(default)]
    pub encoding: EncodingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Upstream provider: openalex, mock
    #[serde(default = "default_provider")]
    pub provider: String,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Contact address for the polite request pool
    pub mailto: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures
    #[serde(default = "default_upstream_retries")]
    pub max_retries: u32,

    /// Client-side request rate
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Restrict results to open-access works
    #[serde(default)]
    pub open_access_only: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExplorationConfig {
    /// Records requested per expansion
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,

    /// Upper bound on nodes queried by one cross-reference pass
    #[serde(default = "default_crossref_max_nodes")]
    pub crossref_max_nodes: usize,

    /// Relation kinds tried, in order, when seeding a graph
    #[serde(default = "default_fallback_order")]
    pub fallback_order: Vec<RelationKind>,

    /// Capacity of the per-graph buffer of edges waiting for an endpoint
    #[serde(default = "default_max_pending_edges")]
    pub max_pending_edges: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnsConfig {
    #[serde(default = "default_max_columns")]
    pub max_columns: usize,

    #[serde(default = "default_trail_max_len")]
    pub trail_max_len: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncodingConfig {
    #[serde(default = "default_min_node_size")]
    pub min_node_size: f32,

    #[serde(default = "default_max_node_size")]
    pub max_node_size: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name, attached to logs and exported metrics
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_provider() -> String { "openalex".to_string() }
fn default_base_url() -> String { "https://api.openalex.org".to_string() }
fn default_upstream_timeout() -> u64 { 30 }
fn default_upstream_retries() -> u32 { 3 }
fn default_requests_per_second() -> u32 { 10 }
fn default_result_limit() -> usize { 25 }
fn default_crossref_max_nodes() -> usize { 10 }
fn default_fallback_order() -> Vec<RelationKind> { RelationKind::DEFAULT_FALLBACK.to_vec() }
fn default_max_pending_edges() -> usize { 500 }
fn default_max_columns() -> usize { 6 }
fn default_trail_max_len() -> usize { 100 }
fn default_min_node_size() -> f32 { 4.0 }
fn default_max_node_size() -> f32 { 24.0 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_metrics_port() -> u16 { 0 }
fn default_service_name() -> String { "citegraph".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__EXPLORATION__CROSSREF_MAX_NODES=5
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exploration.crossref_max_nodes == 0 {
            return Err(ConfigError::Message(
                "exploration.crossref_max_nodes must be at least 1".to_string(),
            ));
        }
        if self.exploration.fallback_order.is_empty() {
            return Err(ConfigError::Message(
                "exploration.fallback_order must name at least one relation".to_string(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "server.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.upstream.requests_per_second == 0 {
            return Err(ConfigError::Message(
                "upstream.requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.encoding.min_node_size > self.encoding.max_node_size {
            return Err(ConfigError::Message(
                "encoding.min_node_size exceeds encoding.max_node_size".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            mailto: None,
            timeout_secs: default_upstream_timeout(),
            max_retries: default_upstream_retries(),
            requests_per_second: default_requests_per_second(),
            open_access_only: false,
        }
    }
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            result_limit: default_result_limit(),
            crossref_max_nodes: default_crossref_max_nodes(),
            fallback_order: default_fallback_order(),
            max_pending_edges: default_max_pending_edges(),
        }
    }
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            max_columns: default_max_columns(),
            trail_max_len: default_trail_max_len(),
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            min_node_size: default_min_node_size(),
            max_node_size: default_max_node_size(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            exploration: ExplorationConfig::default(),
            columns: ColumnsConfig::default(),
            encoding: EncodingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
