//! OpenAlex client
//!
//! `/works` endpoints cover every relation the explorer asks for:
//! - citations: `filter=cites:{id}`
//! - references: `filter=cited_by:{id}`
//! - similar: `filter=related_to:{id}`
//! - authors: `filter=author.id:{a1}|{a2}`

use super::{LinkDiscovery, LiteratureSearch, PaperRecord};
use crate::config::UpstreamConfig;
use crate::errors::{AppError, Result};
use crate::metrics::UpstreamTimer;
use crate::models::{LinkDirection, PaperId, RelationKind, SearchFilter};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound OpenAlex accepts for `per-page`
const MAX_PER_PAGE: usize = 200;

/// Authors considered when expanding by co-authorship
const MAX_AUTHORS: usize = 5;

/// OpenAlex works API client
pub struct OpenAlexClient {
    client: reqwest::Client,
    base_url: String,
    mailto: Option<String>,
    timeout: Duration,
    max_retries: u32,
    limiter: DefaultDirectRateLimiter,
}

impl OpenAlexClient {
    /// Create a new client from upstream configuration
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("citegraph/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let rps = NonZeroU32::new(config.requests_per_second).ok_or_else(|| AppError::Configuration {
            message: "upstream.requests_per_second must be at least 1".to_string(),
        })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mailto: config.mailto.clone(),
            timeout,
            max_retries: config.max_retries,
            limiter: RateLimiter::direct(Quota::per_second(rps)),
        })
    }

    /// GET a JSON document, retrying transient failures with exponential backoff
    async fn get_json(&self, endpoint: &'static str, path: &str, query: Vec<(&'static str, String)>) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        let mut query = query;
        if let Some(mailto) = &self.mailto {
            query.push(("mailto", mailto.clone()));
        }

        let attempts = AtomicU32::new(0);
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(5),
            max_elapsed_time: Some(self.timeout * (self.max_retries + 1)),
            ..ExponentialBackoff::default()
        };

        backoff::future::retry(policy, || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            self.limiter.until_ready().await;

            let timer = UpstreamTimer::start(endpoint);
            let result = self.send_once(&url, &query).await;
            timer.finish(result.is_ok());

            match result {
                Ok(value) => Ok(value),
                Err((error, transient)) if transient && attempt < self.max_retries => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %error,
                        "Upstream request failed, retrying"
                    );
                    Err(backoff::Error::transient(error))
                }
                Err((error, _)) => Err(backoff::Error::permanent(error)),
            }
        })
        .await
    }

    /// Single request. The flag tells whether a retry may help.
    async fn send_once(&self, url: &str, query: &[(&'static str, String)]) -> std::result::Result<Value, (AppError, bool)> {
        debug!(url = %url, "OpenAlex request");

        let response = self.client.get(url).query(query).send().await.map_err(|e| {
            if e.is_timeout() {
                (AppError::UpstreamTimeout { timeout_ms: self.timeout.as_millis() as u64 }, true)
            } else {
                let transient = e.is_connect() || e.is_request();
                (AppError::HttpClient(e), transient)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let transient = status.as_u16() == 429 || status.is_server_error();
            let error = if status.as_u16() == 429 {
                AppError::RateLimited { service: "openalex".to_string() }
            } else {
                AppError::Upstream {
                    message: format!("API error {}: {}", status, truncate(&body, 200)),
                }
            };
            return Err((error, transient));
        }

        response.json::<Value>().await.map_err(|e| {
            (AppError::Upstream { message: format!("Failed to parse response: {}", e) }, false)
        })
    }

    /// Path segment for a single work; DOIs use the `doi:` namespace
    fn work_path(paper_id: &PaperId) -> String {
        if paper_id.as_str().starts_with("10.") {
            format!("works/doi:{}", paper_id)
        } else {
            format!("works/{}", paper_id)
        }
    }

    /// Filters only accept OpenAlex work ids; resolve DOIs first
    async fn resolve_work(&self, paper_id: &PaperId) -> Result<(PaperId, Option<Value>)> {
        if is_openalex_work(paper_id) {
            return Ok((paper_id.clone(), None));
        }
        let work = self.get_json("work", &Self::work_path(paper_id), Vec::new()).await?;
        let id = work
            .get("id")
            .and_then(Value::as_str)
            .and_then(PaperId::parse)
            .ok_or_else(|| AppError::Upstream {
                message: format!("work {} has no OpenAlex id", paper_id),
            })?;
        Ok((id, Some(work)))
    }

    async fn list_works(&self, filter: String, limit: usize, select: Option<&str>) -> Result<Vec<Value>> {
        let mut query = vec![
            ("filter", filter),
            ("per-page", limit.clamp(1, MAX_PER_PAGE).to_string()),
            ("sort", "cited_by_count:desc".to_string()),
        ];
        if let Some(select) = select {
            query.push(("select", select.to_string()));
        }

        let page = self.get_json("works", "works", query).await?;
        Ok(page
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

fn is_openalex_work(paper_id: &PaperId) -> bool {
    let s = paper_id.as_str();
    s.starts_with('W') && s.len() > 1 && s[1..].bytes().all(|b| b.is_ascii_digit())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn with_filter(base: String, filter: &SearchFilter) -> String {
    if filter.open_access_only {
        format!("{},is_oa:true", base)
    } else {
        base
    }
}

/// Bare author ids (`A123`) from a work's authorships
fn author_ids(work: &Value) -> Vec<String> {
    work.get("authorships")
        .and_then(Value::as_array)
        .map(|authorships| {
            authorships
                .iter()
                .filter_map(|a| a.pointer("/author/id").and_then(Value::as_str))
                .filter_map(|id| id.rsplit('/').next())
                .filter(|id| !id.is_empty())
                .take(MAX_AUTHORS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl LiteratureSearch for OpenAlexClient {
    async fn fetch_paper(&self, paper_id: &PaperId) -> Result<PaperRecord> {
        let work = self.get_json("work", &Self::work_path(paper_id), Vec::new()).await?;
        Ok(PaperRecord(work))
    }

    async fn fetch_related(
        &self,
        paper_id: &PaperId,
        relation: RelationKind,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<PaperRecord>> {
        let (work_id, resolved) = self.resolve_work(paper_id).await?;

        let base = match relation {
            RelationKind::Citations => format!("cites:{}", work_id),
            RelationKind::References => format!("cited_by:{}", work_id),
            RelationKind::Similar => format!("related_to:{}", work_id),
            RelationKind::Authors => {
                let work = match resolved {
                    Some(work) => work,
                    None => self.get_json("work", &Self::work_path(&work_id), Vec::new()).await?,
                };
                let authors = author_ids(&work);
                if authors.is_empty() {
                    debug!(paper_id = %work_id, "Work lists no authors");
                    return Ok(Vec::new());
                }
                format!("author.id:{}", authors.join("|"))
            }
        };

        // One extra row so dropping the source itself still fills the limit
        let results = self.list_works(with_filter(base, filter), limit + 1, None).await?;
        Ok(results
            .into_iter()
            .filter(|w| {
                w.get("id")
                    .and_then(Value::as_str)
                    .and_then(PaperId::parse)
                    .map_or(true, |id| id != work_id)
            })
            .take(limit)
            .map(PaperRecord)
            .collect())
    }

    fn provider_name(&self) -> &str {
        "openalex"
    }
}

#[async_trait]
impl LinkDiscovery for OpenAlexClient {
    async fn fetch_links(&self, paper_id: &PaperId, direction: LinkDirection) -> Result<Vec<PaperId>> {
        match direction {
            LinkDirection::Outgoing => {
                let work = self
                    .get_json("work", &Self::work_path(paper_id), vec![("select", "id,referenced_works".to_string())])
                    .await?;
                Ok(work
                    .get("referenced_works")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_str).filter_map(PaperId::parse).collect())
                    .unwrap_or_default())
            }
            LinkDirection::Incoming => {
                let (work_id, _) = self.resolve_work(paper_id).await?;
                let results = self
                    .list_works(format!("cites:{}", work_id), MAX_PER_PAGE, Some("id"))
                    .await?;
                Ok(results
                    .iter()
                    .filter_map(|w| w.get("id").and_then(Value::as_str))
                    .filter_map(PaperId::parse)
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_work_path_for_doi() {
        let doi = PaperId::parse("https://doi.org/10.1038/nature14539").unwrap();
        assert_eq!(OpenAlexClient::work_path(&doi), "works/doi:10.1038/nature14539");
        assert_eq!(OpenAlexClient::work_path(&PaperId::from("W42")), "works/W42");
    }

    #[test]
    fn test_open_access_filter_is_appended() {
        let oa = SearchFilter { open_access_only: true };
        assert_eq!(with_filter("cites:W1".into(), &oa), "cites:W1,is_oa:true");
        assert_eq!(with_filter("cites:W1".into(), &SearchFilter::default()), "cites:W1");
    }

    #[test]
    fn test_author_ids_are_bare() {
        let work = json!({
            "authorships": [
                {"author": {"id": "https://openalex.org/A5023888391", "display_name": "Y. LeCun"}},
                {"author": {"display_name": "anonymous"}}
            ]
        });
        assert_eq!(author_ids(&work), vec!["A5023888391".to_string()]);
    }

    #[test]
    fn test_work_id_detection() {
        assert!(is_openalex_work(&PaperId::from("W123")));
        assert!(!is_openalex_work(&PaperId::from("10.1/abc")));
    }

    #[test]
    fn test_client_requires_positive_rate() {
        let config = UpstreamConfig {
            requests_per_second: 0,
            ..UpstreamConfig::default()
        };
        assert!(OpenAlexClient::new(&config).is_err());
    }
}
