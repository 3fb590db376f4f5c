//! Storage traits and error types

use crate::platform::Article;
use crate::storage::CrawlRunRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Destination for crawl output
///
/// Implementations must be safe to call from concurrent fetch tasks.
pub trait ArticleSink: Send + Sync {
    /// Upserts a source's articles, returning how many were new
    fn record_articles(&self, source_id: &str, articles: &[Article]) -> StoreResult<usize>;

    /// Records a finished crawl pass, returning its id
    fn record_run(&self, run: &CrawlRunRecord) -> StoreResult<i64>;
}
