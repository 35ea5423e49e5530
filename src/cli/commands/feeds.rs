//! Feed management commands.

use chrono::NaiveDate;
use console::style;

use crate::config::Settings;
use crate::models::NewFeed;
use crate::repository::format_date;

use super::helpers::{fetcher_repositories, truncate};

/// Register a feed.
pub async fn cmd_feed_add(
    settings: &Settings,
    url_template: String,
    pattern: String,
    pattern_group: usize,
    earliest_date_limit: NaiveDate,
) -> anyhow::Result<()> {
    let (feed_repo, _) = fetcher_repositories(settings)?;
    let id = feed_repo.add_feed(&NewFeed {
        url_template,
        pattern,
        pattern_group,
        earliest_date_limit,
    })?;
    println!("{} Added feed {}", style("✓").green(), id);
    Ok(())
}

/// List registered feeds.
pub async fn cmd_feed_list(settings: &Settings) -> anyhow::Result<()> {
    let (feed_repo, _) = fetcher_repositories(settings)?;
    let feeds = feed_repo.feeds()?;

    if feeds.is_empty() {
        println!("{} No feeds registered.", style("!").yellow());
        return Ok(());
    }

    println!("{:<5} {:<12} {:<50} Pattern (group)", "ID", "Limit", "Template");
    for feed in feeds {
        println!(
            "{:<5} {:<12} {:<50} {} ({})",
            feed.id,
            format_date(feed.earliest_date_limit),
            truncate(&feed.url_template, 49),
            feed.pattern,
            feed.pattern_group
        );
    }
    Ok(())
}
