//! Document inspection and recovery commands.

use anyhow::Context;
use chrono::NaiveDate;
use console::style;

use crate::config::Settings;
use crate::repository::format_date;
use crate::scrapers::transcript;
use crate::storage::document_contents;

use super::helpers::fetcher_repositories;

/// Print date, id and extracted transcript of each document.
pub async fn cmd_show(settings: &Settings, ids: &[i64]) -> anyhow::Result<()> {
    let (_, doc_repo) = fetcher_repositories(settings)?;
    for &id in ids {
        let document = doc_repo.document(id)?;
        let content = document_contents(&settings.data_dir, &document)
            .with_context(|| format!("No contents for document {id}"))?;

        println!(
            "{}",
            style(format!("{},{}", format_date(document.date), document.id)).bold()
        );
        for line in transcript::extract(&content) {
            println!("{line}");
        }
        println!();
    }
    Ok(())
}

pub async fn cmd_purge(settings: &Settings, id: i64) -> anyhow::Result<()> {
    let (_, doc_repo) = fetcher_repositories(settings)?;
    if doc_repo.purge(id)? {
        println!("{} Purged document {}", style("✓").green(), id);
    } else {
        println!(
            "{} Document {} was already purged",
            style("!").yellow(),
            id
        );
    }
    Ok(())
}

pub async fn cmd_reenqueue(settings: &Settings, id: i64) -> anyhow::Result<()> {
    let (_, doc_repo) = fetcher_repositories(settings)?;
    if doc_repo.reenqueue(id)? {
        println!("{} Document {} is pending again", style("✓").green(), id);
    } else {
        println!("{} Document {} is not purged", style("!").yellow(), id);
    }
    Ok(())
}

pub async fn cmd_reenqueue_range(
    settings: &Settings,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<()> {
    let (_, doc_repo) = fetcher_repositories(settings)?;
    let count = doc_repo.reenqueue_range(start, end)?;
    println!(
        "{} Re-enqueued {} purged document(s) dated {} to {}",
        style("✓").green(),
        count,
        start,
        end
    );
    Ok(())
}
