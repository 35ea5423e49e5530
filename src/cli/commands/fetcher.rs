//! Fetcher commands: status, single tick and the fetch loop.

use anyhow::Context;
use console::style;
use tracing::info;

use crate::config::Settings;
use crate::repository::format_date;
use crate::scrapers::HttpClient;
use crate::services::{Scheduler, SchedulerConfig};

use super::helpers::{fetcher_repositories, format_date_opt, format_timestamp_opt, truncate};

fn scheduler(settings: &Settings) -> anyhow::Result<Scheduler<HttpClient>> {
    let (feeds, documents) = fetcher_repositories(settings)?;
    let client = HttpClient::new(
        settings.fetcher.user_agent.as_deref(),
        settings.fetcher.request_timeout,
    )
    .context("Failed to build HTTP client")?;

    Ok(Scheduler::new(
        feeds,
        documents,
        &settings.data_dir,
        client,
        SchedulerConfig {
            lookahead: settings.fetcher.lookahead,
            grace_days: settings.fetcher.grace_days,
        },
    ))
}

/// Print feed cursors and document totals.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let (feed_repo, doc_repo) = fetcher_repositories(settings)?;
    let feeds = feed_repo.feeds()?;

    println!("\n{}", style("Feeds").bold());
    println!("{}", "-".repeat(100));
    println!(
        "{:<5} {:<40} {:<12} {:<12} {:<12} {:>8}",
        "ID", "Template", "Limit", "Earliest", "Latest", "Pending"
    );
    println!("{}", "-".repeat(100));
    for feed in &feeds {
        println!(
            "{:<5} {:<40} {:<12} {:<12} {:<12} {:>8}",
            feed.id,
            truncate(&feed.url_template, 39),
            format_date(feed.earliest_date_limit),
            format_date_opt(feed.earliest.date),
            format_date_opt(feed.latest.date),
            doc_repo.count_unfetched(feed.id)?
        );
        println!(
            "      earliest probed {}, latest probed {}",
            style(format_timestamp_opt(feed.earliest.timestamp)).dim(),
            style(format_timestamp_opt(feed.latest.timestamp)).dim()
        );
    }
    if feeds.is_empty() {
        println!(
            "{} No feeds registered. Run 'tmine feeds add' first.",
            style("!").yellow()
        );
    }

    let counts = doc_repo.counts()?;
    println!("\n{}", style("Documents").bold());
    println!("  Pending:   {}", counts.pending);
    println!("  Available: {}", counts.available);
    println!("  Purged:    {}", counts.purged);
    Ok(())
}

/// Run one scheduler tick.
pub async fn cmd_fetch(settings: &Settings) -> anyhow::Result<()> {
    let outcome = scheduler(settings)?.tick().await?;
    println!("{} {}", style("✓").green(), outcome);
    Ok(())
}

/// Tick forever with the configured pause in between.
pub async fn cmd_loop(settings: &Settings) -> anyhow::Result<()> {
    info!(
        "Fetching into {} every {:?}",
        settings.data_dir.display(),
        settings.fetcher.sleep
    );
    scheduler(settings)?
        .run_loop(settings.fetcher.sleep)
        .await
        .context("Fetch loop stopped")
}
