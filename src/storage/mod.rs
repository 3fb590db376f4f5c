//! Storage module for crawled articles
//!
//! This module persists what the crawler retrieves:
//! - SQLite database initialization and schema management
//! - Article upserts keyed by a hash of the article link
//! - Crawl run bookkeeping (trigger, timing, per-source success counts)

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{ArticleSink, StoreError, StoreResult};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Opens or creates the article database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file; parent directories are created
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully initialized storage
/// * `Err(StoreError)` - Failed to initialize storage
pub fn open_store(path: &Path) -> StoreResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Stable storage key for an article: hex SHA-256 of its link
pub fn article_key(link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(link.as_bytes());
    hex::encode(hasher.finalize())
}

/// An article row as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArticle {
    pub key: String,
    pub source_id: String,
    pub aid: String,
    pub title: String,
    pub link: String,
    pub digest: String,
    pub cover: Option<String>,
    pub published_at: i64,
    pub first_seen_at: String,
    pub last_seen_at: String,
}

/// What started a crawl pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlTrigger {
    Manual,
    Scheduled,
}

impl CrawlTrigger {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "scheduled" => Some(Self::Scheduled),
            _ => None,
        }
    }
}

/// A finished crawl pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRunRecord {
    pub id: Option<i64>,
    pub trigger: CrawlTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: u32,
    pub failed: u32,
}
