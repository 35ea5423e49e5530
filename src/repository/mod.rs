//! Repository layer for SQLite persistence.
//!
//! Every repository holds a database path and opens a short-lived connection
//! per operation. Mutations run inside a single transaction so a failure never
//! leaves partial state behind.

pub mod document;
pub mod feed;
pub mod offset;
pub mod phrase;
pub mod thank;

pub use document::{DocumentCounts, DocumentRepository};
pub use feed::FeedRepository;
pub use offset::OffsetStore;
pub use phrase::{PhraseRepository, PhraseTotal, RegisteredEntries};
pub use thank::ThankRepository;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, Transaction};
use thiserror::Error;

use crate::models::Document;

/// Errors raised by the repository layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("nonexistent {entity}: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// True for the "missing entity" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Date format used for logical document dates and feed cursors.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Open a connection with the pragmas every repository expects.
pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

/// Map `QueryReturnedNoRows` to `None`.
pub(crate) fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Format a timestamp as fixed-width RFC 3339 so text order equals time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::InvalidData(format!("bad timestamp '{s}': {e}")))
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| RepositoryError::InvalidData(format!("bad date '{s}': {e}")))
}

/// Read a required date column.
pub(crate) fn row_date(row: &Row, column: &str) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(column)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Read a nullable date column.
pub(crate) fn row_date_opt(row: &Row, column: &str) -> rusqlite::Result<Option<NaiveDate>> {
    row.get::<_, Option<String>>(column)?
        .map(|text| {
            NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
        })
        .transpose()
}

/// Read a nullable timestamp column.
pub(crate) fn row_timestamp_opt(
    row: &Row,
    column: &str,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(column)?
        .map(|text| {
            DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
        })
        .transpose()
}

/// Resolve `value` to the id of its row in a `(id, <column> UNIQUE)` table,
/// inserting it when absent. Lookups are memoized for the transaction.
pub(crate) fn intern(
    tx: &Transaction,
    table: &str,
    column: &str,
    value: &str,
    cache: &mut HashMap<String, i64>,
) -> Result<i64> {
    if let Some(id) = cache.get(value) {
        return Ok(*id);
    }

    tx.execute(
        &format!("INSERT OR IGNORE INTO {table} ({column}) VALUES (?1)"),
        params![value],
    )?;
    let id: i64 = tx.query_row(
        &format!("SELECT id FROM {table} WHERE {column} = ?1"),
        params![value],
        |row| row.get(0),
    )?;

    cache.insert(value.to_string(), id);
    Ok(id)
}

/// Claim `document`'s current fetch in an analyzer's `files` table.
///
/// Returns false when this fetch (or a later one) is already recorded. When
/// only an older fetch is recorded, rows of `dependents` for the document are
/// deleted so the caller writes them afresh in the same transaction.
pub(crate) fn claim_file(
    tx: &Transaction,
    document: &Document,
    dependents: &[&str],
) -> Result<bool> {
    let fetched = document.fetch_timestamp.ok_or_else(|| {
        RepositoryError::InvalidData(format!("document {} has no fetch timestamp", document.id))
    })?;
    let fetched = format_timestamp(fetched);

    let recorded: Option<String> = to_option(tx.query_row(
        "SELECT fetch_timestamp FROM files WHERE id = ?",
        params![document.id],
        |row| row.get(0),
    ))?;
    match recorded {
        Some(recorded) if recorded >= fetched => return Ok(false),
        Some(_) => {
            for table in dependents {
                tx.execute(
                    &format!("DELETE FROM {table} WHERE file_id = ?"),
                    params![document.id],
                )?;
            }
        }
        None => {}
    }

    tx.execute(
        "INSERT INTO files (id, date, fetch_timestamp) VALUES (?, ?, ?)
         ON CONFLICT (id) DO UPDATE
         SET date = excluded.date, fetch_timestamp = excluded.fetch_timestamp",
        params![document.id, format_date(document.date), fetched],
    )?;
    Ok(true)
}
