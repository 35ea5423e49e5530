//! Document models for the content-addressed fetch log.
//!
//! A document is one discovered URL. Its payload lives on disk under a path
//! derived from the URL hash; the row only records when it was fetched and
//! whether that content has since been invalidated.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a document, derived from its timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Not fetched yet (or reenqueued after a purge).
    Pending,
    /// Fetched and not purged; visible to consumers.
    Available,
    /// Fetched content invalidated; eligible for reenqueue.
    Purged,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Available => "available",
            Self::Purged => "purged",
        }
    }
}

/// A discovered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Database row ID, increasing in enqueue order.
    pub id: i64,
    /// Feed whose index page linked to this document.
    pub feed_id: i64,
    /// Globally unique source URL.
    pub url: String,
    /// Logical date of the index page the link was found on.
    pub date: NaiveDate,
    /// When the payload was last stored.
    pub fetch_timestamp: Option<DateTime<Utc>>,
    /// When the payload was invalidated.
    pub purge_timestamp: Option<DateTime<Utc>>,
}

impl Document {
    pub fn status(&self) -> DocumentStatus {
        match (self.fetch_timestamp, self.purge_timestamp) {
            (None, _) => DocumentStatus::Pending,
            (Some(_), Some(_)) => DocumentStatus::Purged,
            (Some(_), None) => DocumentStatus::Available,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status() == DocumentStatus::Pending
    }
}
