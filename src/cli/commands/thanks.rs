//! Thank-you analyzer commands.

use console::style;

use crate::analysis::{Consumer, ThankAnalyzer};
use crate::config::Settings;
use crate::repository::{format_timestamp, DocumentRepository, OffsetStore, ThankRepository};

pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let db_path = settings.thank_db_path();
    let offsets = OffsetStore::new(&db_path)?;
    let repo = ThankRepository::new(&db_path)?;

    println!("\n{}", style("Thank-you analysis").bold());
    println!("  Watermark: {}", format_timestamp(offsets.current()?));
    println!("  Documents analyzed: {}", repo.file_count()?);
    println!("  Responses recorded: {}", repo.response_count()?);
    Ok(())
}

/// Record responses in documents fetched since the watermark.
pub async fn cmd_collect(settings: &Settings) -> anyhow::Result<()> {
    let db_path = settings.thank_db_path();
    let documents = DocumentRepository::new(&settings.fetcher_db_path())?;
    let consumer = Consumer::new(&documents, OffsetStore::new(&db_path)?, &settings.data_dir);
    let mut analyzer = ThankAnalyzer::new(
        ThankRepository::new(&db_path)?,
        settings.thanks.first_words,
    );
    let summary = consumer.run(&mut analyzer, settings.thanks.collect_count)?;

    println!(
        "{} Analyzed {} document(s), skipped {} already analyzed",
        style("✓").green(),
        summary.processed,
        summary.skipped
    );
    if summary.exhausted {
        println!("  Caught up with the fetcher.");
    }
    Ok(())
}
