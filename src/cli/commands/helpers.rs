//! Shared helper functions for CLI commands.

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::Settings;
use crate::repository::{format_date, format_timestamp, DocumentRepository, FeedRepository};

/// Placeholder for unset values in reports.
const UNSET: &str = "NONE";

pub fn format_date_opt(date: Option<NaiveDate>) -> String {
    date.map(format_date).unwrap_or_else(|| UNSET.to_string())
}

pub fn format_timestamp_opt(ts: Option<DateTime<Utc>>) -> String {
    ts.map(format_timestamp).unwrap_or_else(|| UNSET.to_string())
}

/// Truncate a string to at most `max` characters, marking the cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Open both fetcher repositories.
pub fn fetcher_repositories(
    settings: &Settings,
) -> anyhow::Result<(FeedRepository, DocumentRepository)> {
    let db_path = settings.fetcher_db_path();
    Ok((
        FeedRepository::new(&db_path)?,
        DocumentRepository::new(&db_path)?,
    ))
}
