//! Feed definitions and their two crawl cursors.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::repository::format_date;

/// Placeholders accepted in a feed URL template.
pub const DATE_PLACEHOLDERS: [&str; 2] = ["%s", "{date}"];

/// Which cursor a probe advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Walk backwards in time towards the feed's date limit.
    Earliest,
    /// Walk forwards in time towards the grace horizon.
    Latest,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

/// One crawl cursor: the last probed date and when it was recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub date: Option<NaiveDate>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A date-parameterized index page source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    /// URL with exactly one date placeholder (`%s` or `{date}`).
    pub url_template: String,
    /// Regex locating document links on the index page.
    pub pattern: String,
    /// Capture group of `pattern` holding the link.
    pub pattern_group: usize,
    /// The earliest cursor never moves before this date.
    pub earliest_date_limit: NaiveDate,
    pub earliest: Cursor,
    pub latest: Cursor,
}

impl Feed {
    /// Index page URL for a given date.
    pub fn url_for(&self, date: NaiveDate) -> String {
        let date = format_date(date);
        for placeholder in DATE_PLACEHOLDERS {
            if self.url_template.contains(placeholder) {
                return self.url_template.replacen(placeholder, &date, 1);
            }
        }
        self.url_template.clone()
    }

    pub fn cursor(&self, direction: Direction) -> &Cursor {
        match direction {
            Direction::Earliest => &self.earliest,
            Direction::Latest => &self.latest,
        }
    }

    /// The direction whose cursor was refreshed least recently.
    ///
    /// An unset timestamp sorts before any set one; ties go to `Latest`.
    pub fn next_direction(&self) -> Direction {
        if self.earliest.timestamp < self.latest.timestamp {
            Direction::Earliest
        } else {
            Direction::Latest
        }
    }
}

/// Parameters for registering a feed.
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub url_template: String,
    pub pattern: String,
    pub pattern_group: usize,
    pub earliest_date_limit: NaiveDate,
}

impl NewFeed {
    /// Number of date placeholders in the template.
    pub fn placeholder_count(&self) -> usize {
        DATE_PLACEHOLDERS
            .iter()
            .map(|p| self.url_template.matches(p).count())
            .sum()
    }
}
