//! CiteGraph Common Library
//!
//! Shared code for the exploration engine and the gateway including:
//! - Paper, edge and relation models
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability
//! - Upstream literature clients
//! - Collection membership

pub mod collection;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod upstream;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use models::{Edge, EdgeKind, PaperId, PaperNode, RelationKind};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
