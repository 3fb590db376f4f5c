//! Crawl orchestrator - per-source dispatch with failure isolation
//!
//! Every requested source is fetched in its own task. Each task produces an
//! isolated [`SourceOutcome`]; outcomes are only combined once every task has
//! finished, so a failing source can neither abort nor leak into its
//! siblings' results.

use crate::config::CrawlSettings;
use crate::crawler::fetcher::{fetch_with_retry, FetchPolicy};
use crate::platform::{Article, ArticleFetcher};
use crate::registry::{SourceRecord, SourceRegistry};
use crate::storage::{ArticleSink, CrawlRunRecord, CrawlTrigger};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Result of crawling one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// The full article list returned by the fetcher
    Fetched { articles: Vec<Article> },

    /// The source could not be crawled this pass
    Failed { error: String },
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fetched { .. })
    }

    /// Number of items fetched, for successful outcomes
    pub fn item_count(&self) -> Option<usize> {
        match self {
            Self::Fetched { articles } => Some(articles.len()),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Fetched { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }
}

/// Complete set of per-source outcomes for one crawl pass
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub trigger: CrawlTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: BTreeMap<String, SourceOutcome>,
}

impl CrawlReport {
    pub fn get(&self, source_id: &str) -> Option<&SourceOutcome> {
        self.outcomes.get(source_id)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn to_run_record(&self) -> CrawlRunRecord {
        CrawlRunRecord {
            id: None,
            trigger: self.trigger,
            started_at: self.started_at,
            finished_at: self.finished_at,
            succeeded: self.succeeded() as u32,
            failed: self.failed() as u32,
        }
    }
}

/// Dispatches fetches for a set of sources and collects every outcome
pub struct CrawlOrchestrator {
    fetcher: Arc<dyn ArticleFetcher>,
    sink: Option<Arc<dyn ArticleSink>>,
    policy: FetchPolicy,
    max_concurrent: usize,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator
    ///
    /// # Arguments
    ///
    /// * `fetcher` - The fetch collaborator
    /// * `policy` - Per-request timeout and retry bounds
    pub fn new(fetcher: Arc<dyn ArticleFetcher>, policy: FetchPolicy) -> Self {
        Self {
            fetcher,
            sink: None,
            policy,
            max_concurrent: 4,
        }
    }

    /// Creates an orchestrator using the crawl settings' limits
    pub fn from_settings(fetcher: Arc<dyn ArticleFetcher>, settings: &CrawlSettings) -> Self {
        Self::new(fetcher, FetchPolicy::from(settings)).with_max_concurrent(settings.max_concurrent)
    }

    /// Stores fetched articles and crawl runs in `sink`
    pub fn with_sink(mut self, sink: Arc<dyn ArticleSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Crawls the given ids on demand
    ///
    /// Records are copied out of the registry before any fetch starts.
    pub async fn run(&self, registry: &SourceRegistry, ids: &[String]) -> CrawlReport {
        self.run_selected(registry.select(ids), CrawlTrigger::Manual)
            .await
    }

    /// Crawls already-selected sources
    ///
    /// Ids without a record get a failed outcome. Duplicate ids are crawled
    /// once.
    pub async fn run_selected(
        &self,
        targets: Vec<(String, Option<SourceRecord>)>,
        trigger: CrawlTrigger,
    ) -> CrawlReport {
        let started_at = Utc::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut outcomes = BTreeMap::new();
        let mut seen = HashSet::new();
        let mut handles = Vec::new();

        tracing::info!("Starting {:?} crawl of {} sources", trigger, targets.len());

        for (id, record) in targets {
            if !seen.insert(id.clone()) {
                continue;
            }

            let Some(record) = record else {
                tracing::warn!("Source {} is not registered", id);
                outcomes.insert(
                    id,
                    SourceOutcome::Failed {
                        error: "source is not registered".to_string(),
                    },
                );
                continue;
            };

            let fetcher = Arc::clone(&self.fetcher);
            let sink = self.sink.clone();
            let semaphore = Arc::clone(&semaphore);
            let policy = self.policy;

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                crawl_source(fetcher.as_ref(), sink.as_deref(), &record, &policy).await
            });
            handles.push((id, handle));
        }

        for (id, handle) in handles {
            let outcome = handle.await.unwrap_or_else(|e| SourceOutcome::Failed {
                error: format!("fetch task aborted: {}", e),
            });

            match &outcome {
                SourceOutcome::Fetched { articles } => {
                    tracing::info!("Fetched {} articles for {}", articles.len(), id)
                }
                SourceOutcome::Failed { error } => {
                    tracing::warn!("Crawl of {} failed: {}", id, error)
                }
            }
            outcomes.insert(id, outcome);
        }

        let report = CrawlReport {
            trigger,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.record_run(&report.to_run_record()) {
                tracing::warn!("Could not record crawl run: {}", e);
            }
        }

        tracing::info!(
            "Crawl finished: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );

        report
    }
}

async fn crawl_source(
    fetcher: &dyn ArticleFetcher,
    sink: Option<&dyn ArticleSink>,
    record: &SourceRecord,
    policy: &FetchPolicy,
) -> SourceOutcome {
    let articles = match fetch_with_retry(fetcher, record, policy).await {
        Ok(articles) => articles,
        Err(e) => {
            return SourceOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    if let Some(sink) = sink {
        match sink.record_articles(&record.id, &articles) {
            Ok(inserted) => tracing::debug!("{} new articles stored for {}", inserted, record.id),
            Err(e) => {
                return SourceOutcome::Failed {
                    error: format!("storing articles failed: {}", e),
                }
            }
        }
    }

    SourceOutcome::Fetched { articles }
}
