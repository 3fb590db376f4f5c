//! Crawler module for per-source article retrieval
//!
//! This module contains the crawl orchestration logic, including:
//! - Timeout and retry policy around each source fetch
//! - Concurrent dispatch with per-source failure isolation
//! - A recurring, single-flight scheduler over the whole registry

mod fetcher;
mod orchestrator;
mod scheduler;

pub use fetcher::{fetch_with_retry, FetchPolicy};
pub use orchestrator::{CrawlOrchestrator, CrawlReport, SourceOutcome};
pub use scheduler::{CrawlScheduler, TriggerOutcome};
