//! Scheduler configuration, outcomes and errors.

use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::Direction;
use crate::repository::RepositoryError;
use crate::scrapers::FetchError;

/// Tuning for [`super::Scheduler`].
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Pending documents tried per tick before giving up.
    pub lookahead: usize,
    /// Days behind today the latest cursor must stay.
    pub grace_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead: 10,
            grace_days: 7,
        }
    }
}

/// What a feed probe will do, decided from the feed's cursors alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePlan {
    /// Fetch the index page for `date` and move `direction` there.
    Fetch { direction: Direction, date: NaiveDate },
    /// The direction hit its bound; refresh the cursor at `cursor`.
    Exhausted {
        direction: Direction,
        cursor: NaiveDate,
    },
    /// Nothing is probeable yet (the date limit lies inside the grace window).
    Waiting,
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A pending document was downloaded.
    Fetched { document_id: i64, url: String },
    /// An index page was scraped.
    Probed {
        feed_id: i64,
        direction: Direction,
        date: NaiveDate,
        enqueued: usize,
    },
    /// A cursor reached its bound; no fetch was performed.
    Exhausted { feed_id: i64, direction: Direction },
    /// No pending documents and no probeable feed.
    Idle,
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetched { document_id, url } => {
                write!(f, "fetched document {document_id} ({url})")
            }
            Self::Probed {
                feed_id,
                direction,
                date,
                enqueued,
            } => write!(
                f,
                "feed {feed_id} {} {date}: enqueued {enqueued} document(s)",
                direction.as_str()
            ),
            Self::Exhausted { feed_id, direction } => {
                write!(f, "feed {feed_id} {} cursor is drained", direction.as_str())
            }
            Self::Idle => write!(f, "nothing to do"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("invalid pattern for feed {feed_id}: {source}")]
    Pattern {
        feed_id: i64,
        #[source]
        source: regex::Error,
    },

    #[error("payload I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("all {attempted} pending document fetch(es) failed")]
    AllFetchesFailed { attempted: usize },
}
