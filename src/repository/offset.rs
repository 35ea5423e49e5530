//! Consumer offset: one analyzer's watermark over the fetch log.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{connect, format_timestamp, parse_timestamp, to_option, Result};

/// Watermark stored in a single-row table inside an analyzer's database.
pub struct OffsetStore {
    db_path: PathBuf,
}

impl OffsetStore {
    pub fn new(db_path: &Path) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        self.connect()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS consumer_offset (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                watermark TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// The last consumed fetch timestamp, or the epoch if nothing was consumed.
    pub fn current(&self) -> Result<DateTime<Utc>> {
        let conn = self.connect()?;
        let stored: Option<String> = to_option(conn.query_row(
            "SELECT watermark FROM consumer_offset WHERE id = 1",
            [],
            |row| row.get(0),
        ))?;
        match stored {
            Some(text) => parse_timestamp(&text),
            None => Ok(DateTime::UNIX_EPOCH),
        }
    }

    /// Set the watermark. Callers only ever move it forward.
    pub fn advance(&self, watermark: DateTime<Utc>) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO consumer_offset (id, watermark) VALUES (1, ?)
             ON CONFLICT (id) DO UPDATE SET watermark = excluded.watermark",
            params![format_timestamp(watermark)],
        )?;
        Ok(())
    }
}
