//! Phrase analyzer commands.

use std::collections::BTreeSet;

use console::style;
use tracing::info;

use crate::analysis::{Consumer, PhraseAnalyzer};
use crate::config::Settings;
use crate::models::PhraseDictionary;
use crate::repository::{
    format_timestamp, DocumentRepository, OffsetStore, PhraseRepository, PhraseTotal,
};

/// Entries in `left` but not in `right`, after normalization.
fn missing_from(left: &[String], right: &[String]) -> Vec<String> {
    let right: BTreeSet<String> = right.iter().map(|e| PhraseDictionary::normalize(e)).collect();
    left.iter()
        .map(|e| PhraseDictionary::normalize(e))
        .filter(|e| !e.is_empty() && !right.contains(e))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn print_list(label: &str, entries: &[String]) {
    if !entries.is_empty() {
        println!("  {}: {}", label, style(entries.join(", ")).yellow());
    }
}

/// Print the watermark and how configuration matches the registered dictionary.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let db_path = settings.phrase_db_path();
    let offsets = OffsetStore::new(&db_path)?;
    let repo = PhraseRepository::new(&db_path)?;
    let registered = repo.registered()?;
    let config = &settings.phrases;

    println!("\n{}", style("Phrase analysis").bold());
    println!("  Watermark: {}", format_timestamp(offsets.current()?));
    println!("  Documents counted: {}", repo.file_count()?);
    println!(
        "  Registered: {} phrase(s), {} preface(s)",
        registered.phrases.len(),
        registered.prefaces.len()
    );
    print_list(
        "Configured phrases not registered",
        &missing_from(&config.phrases, &registered.phrases),
    );
    print_list(
        "Registered phrases not configured",
        &missing_from(&registered.phrases, &config.phrases),
    );
    print_list(
        "Configured prefaces not registered",
        &missing_from(&config.prefaces, &registered.prefaces),
    );
    print_list(
        "Registered prefaces not configured",
        &missing_from(&registered.prefaces, &config.prefaces),
    );
    Ok(())
}

/// Count phrases in documents fetched since the watermark.
pub async fn cmd_collect(settings: &Settings) -> anyhow::Result<()> {
    let db_path = settings.phrase_db_path();
    let repo = PhraseRepository::new(&db_path)?;
    let dictionary = repo.register_dictionary(&settings.phrases.phrases, &settings.phrases.prefaces)?;
    if dictionary.is_empty() {
        println!("{} No phrases or prefaces configured.", style("!").yellow());
        return Ok(());
    }
    let (phrases, prefaces) = dictionary.sizes();
    info!("Collecting {} phrase(s) and {} preface(s)", phrases, prefaces);

    let documents = DocumentRepository::new(&settings.fetcher_db_path())?;
    let consumer = Consumer::new(&documents, OffsetStore::new(&db_path)?, &settings.data_dir);
    let mut analyzer = PhraseAnalyzer::new(repo, dictionary, settings.phrases.max_words);
    let summary = consumer.run(&mut analyzer, settings.phrases.collect_count)?;

    println!(
        "{} Counted {} document(s), skipped {} already counted",
        style("✓").green(),
        summary.processed,
        summary.skipped
    );
    if summary.exhausted {
        println!("  Caught up with the fetcher.");
    }
    Ok(())
}

fn print_totals(title: &str, totals: &[PhraseTotal]) {
    println!("\n{}", style(title).bold());
    if totals.is_empty() {
        println!("  (none)");
        return;
    }
    println!("{:>8}  {:<30} Speaker", "Count", "Entry");
    for total in totals {
        println!("{:>8}  {:<30} {}", total.count, total.entry, total.speaker);
    }
}

/// Print phrase and preface totals per speaker.
pub async fn cmd_report(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let repo = PhraseRepository::new(&settings.phrase_db_path())?;
    let phrases = repo.phrase_totals()?;
    let prefaces = repo.preface_totals()?;

    if json {
        let report = serde_json::json!({ "phrases": phrases, "prefaces": prefaces });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    print_totals("Phrases", &phrases);
    print_totals("Prefaces", &prefaces);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_from_normalizes() {
        let configured = strings(&["You Know", "bucket list", "  "]);
        let registered = strings(&["you know", "perfect storm"]);
        assert_eq!(missing_from(&configured, &registered), vec!["bucket list"]);
        assert_eq!(missing_from(&registered, &configured), vec!["perfect storm"]);
    }
}
