//! Document repository: the append-only fetch log.
//!
//! Documents are deduplicated by URL. A document is pending while its fetch
//! timestamp is unset, available once fetched, and purged when its content
//! has been invalidated. Consumers read exclusively through
//! [`DocumentRepository::fetched_since`], ordered by fetch timestamp.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, SubsecRound, Utc};
use rusqlite::{params, Connection, Row, Transaction};

use super::{
    connect, format_date, format_timestamp, parse_timestamp, row_date, row_timestamp_opt,
    to_option, RepositoryError, Result,
};
use crate::models::Document;

/// Schema shared by the feed and document repositories (both live in
/// `fetcher.db`).
pub(crate) const FETCHER_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS feeds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url_template TEXT NOT NULL UNIQUE,
        pattern TEXT NOT NULL,
        pattern_group INTEGER NOT NULL,
        earliest_date_limit TEXT NOT NULL,

        earliest_date TEXT,
        earliest_timestamp TEXT,
        latest_date TEXT,
        latest_timestamp TEXT
    );

    CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        feed_id INTEGER NOT NULL REFERENCES feeds (id),
        url TEXT NOT NULL UNIQUE,
        date TEXT NOT NULL,
        fetch_timestamp TEXT,
        purge_timestamp TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_documents_fetch ON documents (fetch_timestamp);
    CREATE INDEX IF NOT EXISTS idx_documents_purge ON documents (purge_timestamp);
    CREATE INDEX IF NOT EXISTS idx_documents_feed_fetch ON documents (feed_id, fetch_timestamp);
    CREATE INDEX IF NOT EXISTS idx_documents_date_purge ON documents (date, purge_timestamp);
"#;

const COLUMNS: &str = "id, feed_id, url, date, fetch_timestamp, purge_timestamp";

/// Per-status document totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DocumentCounts {
    pub pending: u64,
    pub available: u64,
    pub purged: u64,
}

/// SQLite-backed document repository.
pub struct DocumentRepository {
    db_path: PathBuf,
}

impl DocumentRepository {
    /// Open (and if needed create) the document log at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        self.connect()?.execute_batch(FETCHER_SCHEMA)?;
        Ok(())
    }

    /// Enqueue a discovered URL. Returns false when the URL is already known.
    pub fn enqueue(&self, feed_id: i64, url: &str, date: NaiveDate) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        require_feed(&tx, feed_id)?;
        let inserted = insert_document(&tx, feed_id, url, date)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Get a document by ID.
    pub fn document(&self, id: i64) -> Result<Document> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM documents WHERE id = ?"))?;
        to_option(stmt.query_row(params![id], row_to_document))?
            .ok_or_else(|| RepositoryError::not_found("document", id))
    }

    /// Pending documents, oldest enqueued first.
    pub fn unfetched(&self, limit: usize) -> Result<Vec<Document>> {
        self.query(
            &format!(
                "SELECT {COLUMNS} FROM documents
                 WHERE fetch_timestamp IS NULL
                 ORDER BY id ASC
                 LIMIT ?"
            ),
            params![limit as i64],
        )
    }

    /// Available documents fetched strictly after `since`, in fetch order.
    pub fn fetched_since(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Document>> {
        self.query(
            &format!(
                "SELECT {COLUMNS} FROM documents
                 WHERE fetch_timestamp > ? AND purge_timestamp IS NULL
                 ORDER BY fetch_timestamp ASC
                 LIMIT ?"
            ),
            params![format_timestamp(since), limit as i64],
        )
    }

    /// Available documents fetched before `before`, oldest fetch first.
    pub fn earliest_fetched(&self, before: DateTime<Utc>, limit: usize) -> Result<Vec<Document>> {
        self.query(
            &format!(
                "SELECT {COLUMNS} FROM documents
                 WHERE fetch_timestamp < ? AND purge_timestamp IS NULL
                 ORDER BY fetch_timestamp ASC
                 LIMIT ?"
            ),
            params![format_timestamp(before), limit as i64],
        )
    }

    /// Purged documents with `id >= min_id`, in id order.
    pub fn purged(&self, min_id: i64, limit: usize) -> Result<Vec<Document>> {
        self.query(
            &format!(
                "SELECT {COLUMNS} FROM documents
                 WHERE id >= ? AND purge_timestamp IS NOT NULL
                 ORDER BY id ASC
                 LIMIT ?"
            ),
            params![min_id, limit as i64],
        )
    }

    /// Record a successful fetch now. See [`Self::mark_fetched_at`].
    pub fn mark_fetched(&self, id: i64) -> Result<DateTime<Utc>> {
        self.mark_fetched_at(id, Utc::now())
    }

    /// Record a successful fetch and clear any purge mark.
    ///
    /// Fetch timestamps are unique and strictly increasing: when `now` is not
    /// past the newest recorded fetch, the newest one plus a microsecond is
    /// used instead. Returns the stored timestamp.
    pub fn mark_fetched_at(&self, id: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        require_document(&tx, id)?;

        let newest: Option<String> =
            tx.query_row("SELECT MAX(fetch_timestamp) FROM documents", [], |row| {
                row.get(0)
            })?;
        let mut fetched_at = now.trunc_subsecs(6);
        if let Some(newest) = newest {
            let newest = parse_timestamp(&newest)?;
            if fetched_at <= newest {
                fetched_at = newest + Duration::microseconds(1);
            }
        }

        tx.execute(
            "UPDATE documents SET fetch_timestamp = ?, purge_timestamp = NULL WHERE id = ?",
            params![format_timestamp(fetched_at), id],
        )?;
        tx.commit()?;
        Ok(fetched_at)
    }

    /// Invalidate a document's content. Returns false if it was already purged.
    pub fn purge(&self, id: i64) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        require_document(&tx, id)?;
        let affected = tx.execute(
            "UPDATE documents SET purge_timestamp = ? WHERE id = ? AND purge_timestamp IS NULL",
            params![format_timestamp(Utc::now()), id],
        )?;
        tx.commit()?;
        Ok(affected == 1)
    }

    /// Make a purged document pending again. Returns false if the document is
    /// not purged or already pending.
    pub fn reenqueue(&self, id: i64) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        require_document(&tx, id)?;
        let affected = tx.execute(
            "UPDATE documents SET fetch_timestamp = NULL
             WHERE id = ? AND purge_timestamp IS NOT NULL AND fetch_timestamp IS NOT NULL",
            params![id],
        )?;
        tx.commit()?;
        Ok(affected == 1)
    }

    /// Reenqueue every purged document dated within `[start, end]`.
    pub fn reenqueue_range(&self, start: NaiveDate, end: NaiveDate) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let affected = tx.execute(
            "UPDATE documents SET fetch_timestamp = NULL
             WHERE date >= ? AND date <= ?
             AND purge_timestamp IS NOT NULL AND fetch_timestamp IS NOT NULL",
            params![format_date(start), format_date(end)],
        )?;
        tx.commit()?;
        Ok(affected)
    }

    /// Pending documents belonging to one feed.
    pub fn count_unfetched(&self, feed_id: i64) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE feed_id = ? AND fetch_timestamp IS NULL",
            params![feed_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Totals per status across the whole log.
    pub fn counts(&self) -> Result<DocumentCounts> {
        let conn = self.connect()?;
        let counts = conn.query_row(
            r#"
            SELECT
                SUM(CASE WHEN fetch_timestamp IS NULL THEN 1 ELSE 0 END),
                SUM(CASE WHEN fetch_timestamp IS NOT NULL AND purge_timestamp IS NULL
                    THEN 1 ELSE 0 END),
                SUM(CASE WHEN fetch_timestamp IS NOT NULL AND purge_timestamp IS NOT NULL
                    THEN 1 ELSE 0 END)
            FROM documents
            "#,
            [],
            |row| {
                Ok(DocumentCounts {
                    pending: row.get::<_, Option<i64>>(0)?.unwrap_or(0) as u64,
                    available: row.get::<_, Option<i64>>(1)?.unwrap_or(0) as u64,
                    purged: row.get::<_, Option<i64>>(2)?.unwrap_or(0) as u64,
                })
            },
        )?;
        Ok(counts)
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Document>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let documents = stmt
            .query_map(params, row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(documents)
    }
}

/// Insert-if-absent by URL. Returns whether a row was created.
pub(crate) fn insert_document(
    tx: &Transaction,
    feed_id: i64,
    url: &str,
    date: NaiveDate,
) -> Result<bool> {
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO documents (feed_id, url, date) VALUES (?, ?, ?)",
        params![feed_id, url, format_date(date)],
    )?;
    Ok(inserted > 0)
}

pub(crate) fn require_feed(tx: &Transaction, id: i64) -> Result<()> {
    let exists: bool = tx.query_row(
        "SELECT EXISTS (SELECT 1 FROM feeds WHERE id = ?)",
        params![id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(RepositoryError::not_found("feed", id))
    }
}

fn require_document(tx: &Transaction, id: i64) -> Result<()> {
    let exists: bool = tx.query_row(
        "SELECT EXISTS (SELECT 1 FROM documents WHERE id = ?)",
        params![id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(RepositoryError::not_found("document", id))
    }
}

fn row_to_document(row: &Row) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get("id")?,
        feed_id: row.get("feed_id")?,
        url: row.get("url")?,
        date: row_date(row, "date")?,
        fetch_timestamp: row_timestamp_opt(row, "fetch_timestamp")?,
        purge_timestamp: row_timestamp_opt(row, "purge_timestamp")?,
    })
}
