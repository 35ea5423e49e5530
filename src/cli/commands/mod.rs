//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod feeds;
mod fetcher;
mod files;
mod helpers;
mod phrases;
mod thanks;

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::config::{Overrides, Settings};

#[derive(Parser)]
#[command(name = "tmine")]
#[command(about = "Transcript fetcher and speech-pattern analyzers")]
#[command(version)]
pub struct Cli {
    /// Data directory holding databases, config files and payloads
    #[arg(long, global = true, env = "TMINE_DIR")]
    dir: Option<PathBuf>,

    /// Fetcher config file (defaults to <dir>/fetcher.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Pause between fetcher ticks, e.g. "15s" or "500ms"
    #[arg(long, global = true)]
    fetcher_sleep: Option<String>,

    /// Documents analyzed per phrase `collect`
    #[arg(long, global = true)]
    phrase_collect_count: Option<usize>,

    /// Documents analyzed per thanks `collect`
    #[arg(long, global = true)]
    thank_collect_count: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch feed index pages and documents (loops when no subcommand is given)
    Fetcher {
        #[command(subcommand)]
        command: Option<FetcherCommands>,
    },

    /// Manage feeds
    Feeds {
        #[command(subcommand)]
        command: FeedCommands,
    },

    /// Inspect and repair stored documents
    Files {
        #[command(subcommand)]
        command: FileCommands,
    },

    /// Phrase and preface analysis (collects when no subcommand is given)
    Phrases {
        #[command(subcommand)]
        command: Option<PhraseCommands>,
    },

    /// Responses to "thank you" (collects when no subcommand is given)
    Thanks {
        #[command(subcommand)]
        command: Option<ThankCommands>,
    },
}

#[derive(Subcommand)]
enum FetcherCommands {
    /// Show feed cursors and document totals
    Status,
    /// Run a single tick
    Fetch,
}

#[derive(Subcommand)]
enum FeedCommands {
    /// Register a feed
    Add {
        /// Index URL with one date placeholder (%s or {date})
        template: String,
        /// Regex matching document links on the index page
        pattern: String,
        /// Capture group holding the link
        group: usize,
        /// Earliest date to walk back to (YYYY-MM-DD)
        earliest: NaiveDate,
    },
    /// List registered feeds
    List,
}

#[derive(Subcommand)]
enum FileCommands {
    /// Print the extracted transcript of documents
    Show {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Mark a document's payload as stale
    Purge { id: i64 },
    /// Make a purged document pending again
    Reenqueue { id: i64 },
    /// Make purged documents dated within a range pending again
    ReenqueueRange {
        /// First date, inclusive (YYYY-MM-DD)
        start: NaiveDate,
        /// Last date, inclusive (YYYY-MM-DD)
        end: NaiveDate,
    },
}

#[derive(Subcommand)]
enum PhraseCommands {
    /// Show the watermark and dictionary registration
    Status,
    /// Analyze newly fetched documents
    Collect,
    /// Print totals per speaker
    Report {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ThankCommands {
    /// Show the watermark and response totals
    Status,
    /// Analyze newly fetched documents
    Collect,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        data_dir: cli.dir,
        fetcher_config: cli.config,
        fetcher_sleep: cli.fetcher_sleep,
        phrase_collect_count: cli.phrase_collect_count,
        thank_collect_count: cli.thank_collect_count,
    };
    let settings = Settings::load(&overrides).context("Failed to load configuration")?;
    settings.ensure_data_dir()?;

    match cli.command {
        Commands::Fetcher { command } => match command {
            Some(FetcherCommands::Status) => fetcher::cmd_status(&settings).await,
            Some(FetcherCommands::Fetch) => fetcher::cmd_fetch(&settings).await,
            None => fetcher::cmd_loop(&settings).await,
        },
        Commands::Feeds { command } => match command {
            FeedCommands::Add {
                template,
                pattern,
                group,
                earliest,
            } => feeds::cmd_feed_add(&settings, template, pattern, group, earliest).await,
            FeedCommands::List => feeds::cmd_feed_list(&settings).await,
        },
        Commands::Files { command } => match command {
            FileCommands::Show { ids } => files::cmd_show(&settings, &ids).await,
            FileCommands::Purge { id } => files::cmd_purge(&settings, id).await,
            FileCommands::Reenqueue { id } => files::cmd_reenqueue(&settings, id).await,
            FileCommands::ReenqueueRange { start, end } => {
                files::cmd_reenqueue_range(&settings, start, end).await
            }
        },
        Commands::Phrases { command } => match command {
            Some(PhraseCommands::Status) => phrases::cmd_status(&settings).await,
            Some(PhraseCommands::Report { json }) => phrases::cmd_report(&settings, json).await,
            Some(PhraseCommands::Collect) | None => phrases::cmd_collect(&settings).await,
        },
        Commands::Thanks { command } => match command {
            Some(ThankCommands::Status) => thanks::cmd_status(&settings).await,
            Some(ThankCommands::Collect) | None => thanks::cmd_collect(&settings).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_subcommands_parse() {
        let cli = Cli::try_parse_from(["tmine", "phrases"]).unwrap();
        assert!(matches!(cli.command, Commands::Phrases { command: None }));

        let cli = Cli::try_parse_from(["tmine", "--dir", "/tmp/x", "fetcher"]).unwrap();
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(cli.command, Commands::Fetcher { command: None }));
    }

    #[test]
    fn test_feed_add_parses_date() {
        let cli = Cli::try_parse_from([
            "tmine",
            "feeds",
            "add",
            "https://example.com/%s",
            "href=\"([^\"]+)\"",
            "1",
            "2020-01-31",
        ])
        .unwrap();
        match cli.command {
            Commands::Feeds {
                command: FeedCommands::Add {
                    group, earliest, ..
                },
            } => {
                assert_eq!(group, 1);
                assert_eq!(earliest, NaiveDate::from_ymd_opt(2020, 1, 31).unwrap());
            }
            _ => panic!("expected feeds add"),
        }
        assert!(Cli::try_parse_from(["tmine", "feeds", "add", "t", "p", "1", "soon"]).is_err());
    }
}
