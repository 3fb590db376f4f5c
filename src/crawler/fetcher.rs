//! Timeout and retry policy for a single source fetch

use crate::config::CrawlSettings;
use crate::platform::{Article, ArticleFetcher};
use crate::registry::SourceRecord;
use crate::{Result, WxError};
use std::time::Duration;

/// Bounds applied to every fetch collaborator invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Upper bound on one attempt
    pub request_timeout: Duration,
    /// Attempts after the first one
    pub max_retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl From<&CrawlSettings> for FetchPolicy {
    fn from(settings: &CrawlSettings) -> Self {
        Self {
            request_timeout: settings.request_timeout(),
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay(),
        }
    }
}

/// Fetches a source's articles, retrying failed or timed-out attempts
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Attempt exceeds `request_timeout` | Counted as a failed attempt |
/// | Any fetch error | Retry after `retry_delay` |
/// | `max_retries` retries exhausted | `WxError::FetchFailed` with the last error |
///
/// # Arguments
///
/// * `fetcher` - The fetch collaborator
/// * `source` - The registered source to fetch
/// * `policy` - Timeout and retry bounds
pub async fn fetch_with_retry(
    fetcher: &dyn ArticleFetcher,
    source: &SourceRecord,
    policy: &FetchPolicy,
) -> Result<Vec<Article>> {
    let attempts = policy.max_retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = match tokio::time::timeout(policy.request_timeout, fetcher.fetch(source)).await
        {
            Ok(result) => result,
            Err(_) => Err(WxError::Timeout {
                seconds: policy.request_timeout.as_secs(),
            }),
        };

        match result {
            Ok(articles) => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}", source.id, attempt);
                }
                return Ok(articles);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    "Attempt {}/{} for {} failed: {}",
                    attempt,
                    attempts,
                    source.id,
                    e
                );
                tokio::time::sleep(policy.retry_delay).await;
            }
            Err(e) => {
                return Err(WxError::FetchFailed {
                    source_id: source.id.clone(),
                    message: format!("{} (after {} attempts)", e, attempt),
                });
            }
        }
    }
}
