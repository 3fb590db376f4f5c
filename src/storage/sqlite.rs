//! SQLite storage implementation

use crate::platform::Article;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ArticleSink, StoreError, StoreResult};
use crate::storage::{article_key, CrawlRunRecord, CrawlTrigger, StoredArticle};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
///
/// The connection sits behind a mutex so concurrent fetch tasks can share
/// one store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Counts stored articles, optionally for one source
    pub fn count_articles(&self, source_id: Option<&str>) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = match source_id {
            Some(id) => conn.query_row(
                "SELECT COUNT(*) FROM articles WHERE source_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    /// Most recently published articles of a source
    pub fn recent_articles(&self, source_id: &str, limit: u32) -> StoreResult<Vec<StoredArticle>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, source_id, aid, title, link, digest, cover, published_at,
             first_seen_at, last_seen_at
             FROM articles WHERE source_id = ?1
             ORDER BY published_at DESC, key LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![source_id, limit], article_from_row)?;

        let mut articles = Vec::new();
        for row in rows {
            articles.push(row?);
        }
        Ok(articles)
    }

    /// The most recently recorded crawl run
    pub fn latest_run(&self) -> StoreResult<Option<CrawlRunRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, trigger_kind, started_at, finished_at, succeeded, failed
                 FROM crawl_runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, u32>(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, trigger, started_at, finished_at, succeeded, failed)| {
            run_from_columns(id, &trigger, &started_at, &finished_at, succeeded, failed)
        })
        .transpose()
    }
}

impl ArticleSink for SqliteStore {
    fn record_articles(&self, source_id: &str, articles: &[Article]) -> StoreResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut inserted = 0;

        for article in articles {
            let key = article_key(&article.link);
            let changed = tx.execute(
                "INSERT OR IGNORE INTO articles
                 (key, source_id, aid, title, link, digest, cover, published_at, first_seen_at, last_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    key,
                    source_id,
                    article.aid,
                    article.title,
                    article.link,
                    article.digest,
                    article.cover,
                    article.published_at,
                    now
                ],
            )?;

            if changed == 1 {
                inserted += 1;
            } else {
                tx.execute(
                    "UPDATE articles SET title = ?1, digest = ?2, cover = ?3, last_seen_at = ?4
                     WHERE key = ?5",
                    params![article.title, article.digest, article.cover, now, key],
                )?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn record_run(&self, run: &CrawlRunRecord) -> StoreResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO crawl_runs (trigger_kind, started_at, finished_at, succeeded, failed)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run.trigger.to_db_string(),
                run.started_at.to_rfc3339(),
                run.finished_at.to_rfc3339(),
                run.succeeded,
                run.failed
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

fn article_from_row(row: &Row<'_>) -> rusqlite::Result<StoredArticle> {
    Ok(StoredArticle {
        key: row.get(0)?,
        source_id: row.get(1)?,
        aid: row.get(2)?,
        title: row.get(3)?,
        link: row.get(4)?,
        digest: row.get(5)?,
        cover: row.get(6)?,
        published_at: row.get(7)?,
        first_seen_at: row.get(8)?,
        last_seen_at: row.get(9)?,
    })
}

fn run_from_columns(
    id: i64,
    trigger: &str,
    started_at: &str,
    finished_at: &str,
    succeeded: u32,
    failed: u32,
) -> StoreResult<CrawlRunRecord> {
    Ok(CrawlRunRecord {
        id: Some(id),
        trigger: CrawlTrigger::from_db_string(trigger)
            .ok_or_else(|| StoreError::CorruptRow(format!("trigger '{}'", trigger)))?,
        started_at: parse_timestamp(started_at)?,
        finished_at: parse_timestamp(finished_at)?,
        succeeded,
        failed,
    })
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow(format!("timestamp '{}': {}", value, e)))
}
