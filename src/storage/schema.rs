//! Database schema definitions

/// SQL schema for the article database
pub const SCHEMA_SQL: &str = r#"
-- Articles seen for registered sources
CREATE TABLE IF NOT EXISTS articles (
    key TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    aid TEXT NOT NULL,
    title TEXT NOT NULL,
    link TEXT NOT NULL,
    digest TEXT NOT NULL DEFAULT '',
    cover TEXT,
    published_at INTEGER NOT NULL,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_articles_source ON articles(source_id, published_at);

-- Finished crawl passes
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trigger_kind TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    succeeded INTEGER NOT NULL,
    failed INTEGER NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
