//! Upstream collaborator abstraction
//!
//! Provides the two remote interfaces the exploration engine depends on:
//! - `LiteratureSearch`: related-paper lookups (citations, references, similar, authors)
//! - `LinkDiscovery`: raw citation links used for cross-reference detection
//!
//! Implementations:
//! - OpenAlex over HTTP
//! - In-memory fixtures for tests and offline demos

mod mock;
mod openalex;

pub use mock::MockLiterature;
pub use openalex::OpenAlexClient;

use crate::config::UpstreamConfig;
use crate::errors::{AppError, Result};
use crate::models::{LinkDirection, PaperId, RelationKind, SearchFilter};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One upstream record, in whatever shape the producing endpoint uses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperRecord(pub serde_json::Value);

impl PaperRecord {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for PaperRecord {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Trait for related-paper lookups
#[async_trait]
pub trait LiteratureSearch: Send + Sync {
    /// Fetch a single paper by id
    async fn fetch_paper(&self, paper_id: &PaperId) -> Result<PaperRecord>;

    /// Fetch up to `limit` papers related to `paper_id` by `relation`
    async fn fetch_related(
        &self,
        paper_id: &PaperId,
        relation: RelationKind,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<PaperRecord>>;

    /// Provider name for logs
    fn provider_name(&self) -> &str;
}

/// Trait for citation-link lookups
#[async_trait]
pub trait LinkDiscovery: Send + Sync {
    /// Ids linked to `paper_id` in the given direction
    async fn fetch_links(&self, paper_id: &PaperId, direction: LinkDirection) -> Result<Vec<PaperId>>;
}

/// Pair of collaborators handed to the exploration engine
#[derive(Clone)]
pub struct Upstream {
    pub search: Arc<dyn LiteratureSearch>,
    pub links: Arc<dyn LinkDiscovery>,
}

/// Create upstream collaborators based on configuration
pub fn create_upstream(config: &UpstreamConfig) -> Result<Upstream> {
    match config.provider.as_str() {
        "openalex" => {
            let client = Arc::new(OpenAlexClient::new(config)?);
            Ok(Upstream {
                search: client.clone(),
                links: client,
            })
        }
        "mock" => {
            let mock = Arc::new(MockLiterature::new());
            Ok(Upstream {
                search: mock.clone(),
                links: mock,
            })
        }
        other => Err(AppError::Configuration {
            message: format!("unknown upstream provider: {}", other),
        }),
    }
}
