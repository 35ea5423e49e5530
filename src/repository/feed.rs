//! Feed repository: registered index sources and their crawl cursors.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use rusqlite::{params, Connection, Row, Transaction};

use super::document::{insert_document, require_feed, FETCHER_SCHEMA};
use super::{
    connect, format_date, format_timestamp, row_date, row_date_opt, row_timestamp_opt, to_option,
    RepositoryError, Result,
};
use crate::models::{Cursor, Direction, Feed, NewFeed};

/// SQLite-backed feed repository.
pub struct FeedRepository {
    db_path: PathBuf,
}

impl FeedRepository {
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

    /// Register a feed. Both cursors start unset.
    ///
    /// The template must contain exactly one date placeholder, the pattern
    /// must compile and the group must exist in it.
    pub fn add_feed(&self, feed: &NewFeed) -> Result<i64> {
        let placeholders = feed.placeholder_count();
        if placeholders != 1 {
            return Err(RepositoryError::InvalidData(format!(
                "url template must contain exactly one date placeholder, found {placeholders}"
            )));
        }
        let pattern = Regex::new(&feed.pattern)
            .map_err(|e| RepositoryError::InvalidData(format!("bad pattern: {e}")))?;
        if feed.pattern_group >= pattern.captures_len() {
            return Err(RepositoryError::InvalidData(format!(
                "pattern has no capture group {}",
                feed.pattern_group
            )));
        }

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO feeds (url_template, pattern, pattern_group, earliest_date_limit)
             VALUES (?, ?, ?, ?)",
            params![
                feed.url_template,
                feed.pattern,
                feed.pattern_group as i64,
                format_date(feed.earliest_date_limit),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All feeds in id order.
    pub fn feeds(&self) -> Result<Vec<Feed>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM feeds ORDER BY id")?;
        let feeds = stmt
            .query_map([], row_to_feed)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(feeds)
    }

    pub fn feed(&self, id: i64) -> Result<Feed> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM feeds WHERE id = ?")?;
        to_option(stmt.query_row(params![id], row_to_feed))?
            .ok_or_else(|| RepositoryError::not_found("feed", id))
    }

    /// Commit the result of one index probe: enqueue every discovered link
    /// dated `date` and move the `direction` cursor to `date` at `at`.
    ///
    /// Returns the number of links that were not already known.
    pub fn record_probe(
        &self,
        feed_id: i64,
        direction: Direction,
        date: NaiveDate,
        links: &[String],
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        require_feed(&tx, feed_id)?;

        let mut enqueued = 0;
        for link in links {
            if insert_document(&tx, feed_id, link, date)? {
                enqueued += 1;
            }
        }
        update_cursor(&tx, feed_id, direction, date, at)?;

        tx.commit()?;
        Ok(enqueued)
    }

    /// Move one cursor without enqueuing anything.
    pub fn set_cursor(
        &self,
        feed_id: i64,
        direction: Direction,
        date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        require_feed(&tx, feed_id)?;
        update_cursor(&tx, feed_id, direction, date, at)?;
        tx.commit()?;
        Ok(())
    }
}

fn update_cursor(
    tx: &Transaction,
    feed_id: i64,
    direction: Direction,
    date: NaiveDate,
    at: DateTime<Utc>,
) -> Result<()> {
    let sql = match direction {
        Direction::Earliest => {
            "UPDATE feeds SET earliest_date = ?, earliest_timestamp = ? WHERE id = ?"
        }
        Direction::Latest => "UPDATE feeds SET latest_date = ?, latest_timestamp = ? WHERE id = ?",
    };
    tx.execute(sql, params![format_date(date), format_timestamp(at), feed_id])?;
    Ok(())
}

fn row_to_feed(row: &Row) -> rusqlite::Result<Feed> {
    Ok(Feed {
        id: row.get("id")?,
        url_template: row.get("url_template")?,
        pattern: row.get("pattern")?,
        pattern_group: row.get::<_, i64>("pattern_group")? as usize,
        earliest_date_limit: row_date(row, "earliest_date_limit")?,
        earliest: Cursor {
            date: row_date_opt(row, "earliest_date")?,
            timestamp: row_timestamp_opt(row, "earliest_timestamp")?,
        },
        latest: Cursor {
            date: row_date_opt(row, "latest_date")?,
            timestamp: row_timestamp_opt(row, "latest_timestamp")?,
        },
    })
}
