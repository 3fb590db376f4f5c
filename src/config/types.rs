use crate::registry::{CreatedAtPolicy, SourceOrdering};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level runtime settings for wechat-sources
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub crawl: CrawlSettings,
    pub paths: PathSettings,
    pub registry: RegistrySettings,
    pub platform: PlatformSettings,
}

/// Crawl scheduling and per-request limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    /// Seconds between scheduled passes over every registered source
    #[serde(rename = "interval-secs")]
    pub interval_secs: u64,

    /// Upper bound on a single fetch attempt (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Retries after the first failed attempt
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Pause between retries (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Number of sources fetched at the same time
    #[serde(rename = "max-concurrent")]
    pub max_concurrent: usize,

    /// Whether the recurring scheduler runs at all
    #[serde(rename = "auto-crawl-enabled")]
    pub auto_crawl_enabled: bool,

    /// Whether crawled items are handed to the vector index
    #[serde(rename = "vector-sync-enabled")]
    pub vector_sync_enabled: bool,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            request_timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
            max_concurrent: 4,
            auto_crawl_enabled: true,
            vector_sync_enabled: true,
        }
    }
}

impl CrawlSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// JSON document holding the session and registered sources
    #[serde(rename = "registry-path")]
    pub registry_path: PathBuf,

    /// Session file written after an interactive login
    #[serde(rename = "credential-path")]
    pub credential_path: PathBuf,

    /// SQLite database for crawled articles
    #[serde(rename = "database-path")]
    pub database_path: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from("config/sources/wechat.json"),
            credential_path: PathBuf::from("cfg/cookies.json"),
            database_path: PathBuf::from("data/crawler.db"),
        }
    }
}

/// Registry merge and serialization policies
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    #[serde(rename = "created-at")]
    pub created_at: CreatedAtPolicy,

    #[serde(rename = "ordering")]
    pub ordering: SourceOrdering,
}

/// Upstream platform endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    #[serde(rename = "base-url")]
    pub base_url: String,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            base_url: "https://mp.weixin.qq.com".to_string(),
        }
    }
}
