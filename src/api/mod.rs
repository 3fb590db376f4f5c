//! Request and response shapes for a service fronting the registry
//!
//! A crawl request names one source id or the `"all"` sentinel. Responses
//! carry a string status code, one JSON record per article, and any
//! per-source failures so a partial success never hides an error.

use crate::crawler::{CrawlOrchestrator, SourceOutcome};
use crate::platform::MpClient;
use crate::registry::SourceRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Source value meaning every registered source
pub const ALL_SOURCES: &str = "all";

/// Crawl one registered source, or all of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub source: String,
}

impl CrawlRequest {
    pub fn all() -> Self {
        Self {
            source: ALL_SOURCES.to_string(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.source == ALL_SOURCES
    }
}

/// Fetch a single article link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleRequest {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResponse {
    #[serde(default = "ok_code")]
    pub code: String,
    pub data: Vec<Value>,
    /// Source id to failure message
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default = "bad_request_code")]
    pub code: String,
}

impl ErrorResponse {
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: bad_request_code(),
        }
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: "404".to_string(),
        }
    }
}

fn ok_code() -> String {
    "200".to_string()
}

fn bad_request_code() -> String {
    "400".to_string()
}

/// Runs a crawl request against the registry
///
/// # Arguments
///
/// * `registry` - Registered sources; records are copied before dispatch
/// * `orchestrator` - Runs the fetches
/// * `request` - A source id or `"all"`
///
/// # Returns
///
/// Every fetched article tagged with its `source_id`, plus failures in
/// `errors`. An empty or unknown source id is rejected before any fetch.
pub async fn handle_crawl_request(
    registry: &SourceRegistry,
    orchestrator: &CrawlOrchestrator,
    request: &CrawlRequest,
) -> Result<CrawlResponse, ErrorResponse> {
    let source = request.source.trim();
    if source.is_empty() {
        return Err(ErrorResponse::bad_request("source must not be empty"));
    }

    let ids = if source == ALL_SOURCES {
        registry.ids()
    } else if registry.contains(source) {
        vec![source.to_string()]
    } else {
        return Err(ErrorResponse::not_found(format!(
            "unknown source: {}",
            source
        )));
    };

    let report = orchestrator.run(registry, &ids).await;

    let mut data = Vec::new();
    let mut errors = BTreeMap::new();
    for (id, outcome) in report.outcomes {
        match outcome {
            SourceOutcome::Fetched { articles } => {
                for article in articles {
                    data.push(json!({
                        "source_id": id,
                        "aid": article.aid,
                        "title": article.title,
                        "link": article.link,
                        "digest": article.digest,
                        "cover": article.cover,
                        "published_at": article.published_at,
                    }));
                }
            }
            SourceOutcome::Failed { error } => {
                errors.insert(id, error);
            }
        }
    }

    Ok(CrawlResponse {
        code: ok_code(),
        data,
        errors,
    })
}

/// Fetches one article link into a single-record response
pub async fn handle_single_request(
    client: &MpClient,
    request: &SingleRequest,
) -> Result<CrawlResponse, ErrorResponse> {
    let detail = client
        .fetch_article(&request.url)
        .await
        .map_err(|e| ErrorResponse::bad_request(e.to_string()))?;

    Ok(CrawlResponse {
        code: ok_code(),
        data: vec![json!({
            "url": detail.url,
            "title": detail.title,
            "account": detail.account,
            "content": detail.content,
        })],
        errors: BTreeMap::new(),
    })
}
