//! Fetch scheduler.
//!
//! Each tick does at most one unit of network work: it downloads the oldest
//! pending document, or, when nothing is pending, probes one feed's index
//! page in one direction. Feeds are walked day by day both backwards (towards
//! their date limit) and forwards (towards today minus a grace period), the
//! staler cursor going first.

mod types;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, Utc};
use regex::Regex;
use tracing::{debug, info, warn};
use url::Url;

use crate::models::{Direction, Document, Feed};
use crate::repository::{DocumentRepository, FeedRepository};
use crate::scrapers::PageFetcher;
use crate::storage::write_payload;

pub use types::{ProbePlan, SchedulerConfig, SchedulerError, TickOutcome};

/// Drives fetching for every registered feed.
pub struct Scheduler<F: PageFetcher> {
    feeds: FeedRepository,
    documents: DocumentRepository,
    data_dir: PathBuf,
    fetcher: F,
    config: SchedulerConfig,
}

impl<F: PageFetcher> Scheduler<F> {
    pub fn new(
        feeds: FeedRepository,
        documents: DocumentRepository,
        data_dir: &Path,
        fetcher: F,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            feeds,
            documents,
            data_dir: data_dir.to_path_buf(),
            fetcher,
            config,
        }
    }

    /// Run one tick against the current time.
    pub async fn tick(&self) -> Result<TickOutcome, SchedulerError> {
        self.tick_at(Utc::now()).await
    }

    /// Run one tick as if it were `now`.
    ///
    /// Failures leave feed cursors untouched so the same work is retried by
    /// the next call.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickOutcome, SchedulerError> {
        let pending = self.documents.unfetched(self.config.lookahead)?;
        if !pending.is_empty() {
            return self.fetch_pending(&pending).await;
        }

        let mut feeds = self.feeds.feeds()?;
        feeds.sort_by_key(|feed| (feed.earliest.timestamp, feed.id));

        let today = now.date_naive();
        for feed in &feeds {
            match plan_probe(feed, today, self.config.grace_days) {
                ProbePlan::Waiting => {
                    debug!("Feed {} has nothing to probe yet", feed.id);
                }
                ProbePlan::Exhausted { direction, cursor } => {
                    self.feeds.set_cursor(feed.id, direction, cursor, now)?;
                    return Ok(TickOutcome::Exhausted {
                        feed_id: feed.id,
                        direction,
                    });
                }
                ProbePlan::Fetch { direction, date } => {
                    return self.probe(feed, direction, date, now).await;
                }
            }
        }

        Ok(TickOutcome::Idle)
    }

    /// Tick repeatedly, sleeping `interval` in between, until a tick fails
    /// or the process is interrupted.
    pub async fn run_loop(&self, interval: Duration) -> Result<(), SchedulerError> {
        loop {
            let outcome = self.tick().await?;
            info!("{}", outcome);

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping fetch loop");
                    return Ok(());
                }
            }
        }
    }

    async fn fetch_pending(&self, pending: &[Document]) -> Result<TickOutcome, SchedulerError> {
        for document in pending {
            let content = match self.fetcher.fetch(&document.url).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Failed to fetch document {}: {}", document.id, e);
                    continue;
                }
            };

            // Payload first: a row marked fetched always has a file behind it.
            if let Err(e) = write_payload(&self.data_dir, &document.url, &content) {
                warn!("Failed to store document {}: {}", document.id, e);
                continue;
            }
            self.documents.mark_fetched(document.id)?;

            return Ok(TickOutcome::Fetched {
                document_id: document.id,
                url: document.url.clone(),
            });
        }

        Err(SchedulerError::AllFetchesFailed {
            attempted: pending.len(),
        })
    }

    async fn probe(
        &self,
        feed: &Feed,
        direction: Direction,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, SchedulerError> {
        let pattern = Regex::new(&feed.pattern).map_err(|source| SchedulerError::Pattern {
            feed_id: feed.id,
            source,
        })?;

        let index_url = feed.url_for(date);
        let page = self.fetcher.fetch(&index_url).await?;
        let links = extract_links(&pattern, feed.pattern_group, &index_url, &page);

        let enqueued = self
            .feeds
            .record_probe(feed.id, direction, date, &links, now)?;

        Ok(TickOutcome::Probed {
            feed_id: feed.id,
            direction,
            date,
            enqueued,
        })
    }
}

/// Decide the next probe for a feed.
///
/// The staler cursor moves one day further from the other. A cursor with no
/// date starts from the other cursor's date, and a feed never probed starts
/// at the grace horizon (`today - grace_days`). The earliest cursor never
/// passes the feed's date limit and the latest never passes the horizon;
/// reaching either bound pins the cursor at the last probeable date.
pub fn plan_probe(feed: &Feed, today: NaiveDate, grace_days: i64) -> ProbePlan {
    let direction = feed.next_direction();
    let horizon = today
        .checked_sub_days(Days::new(grace_days.max(0).unsigned_abs()))
        .unwrap_or(NaiveDate::MIN);
    let other = match direction {
        Direction::Earliest => Direction::Latest,
        Direction::Latest => Direction::Earliest,
    };

    let Some(base) = feed
        .cursor(direction)
        .date
        .or(feed.cursor(other).date)
    else {
        if horizon < feed.earliest_date_limit {
            return ProbePlan::Waiting;
        }
        return ProbePlan::Fetch {
            direction,
            date: horizon,
        };
    };

    match direction {
        Direction::Earliest => match base.checked_sub_days(Days::new(1)) {
            Some(date) if date >= feed.earliest_date_limit => ProbePlan::Fetch { direction, date },
            _ => ProbePlan::Exhausted {
                direction,
                cursor: base,
            },
        },
        Direction::Latest => match base.checked_add_days(Days::new(1)) {
            Some(date) if date <= horizon => ProbePlan::Fetch { direction, date },
            _ => ProbePlan::Exhausted {
                direction,
                cursor: base,
            },
        },
    }
}

/// Links captured by `pattern`, resolved against the index page URL.
fn extract_links(pattern: &Regex, group: usize, index_url: &str, page: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(page);
    let base = Url::parse(index_url).ok();

    pattern
        .captures_iter(&text)
        .filter_map(|caps| caps.get(group))
        .filter_map(|m| {
            let link = m.as_str();
            let resolved = match &base {
                Some(base) => base.join(link).map(String::from),
                None => Url::parse(link).map(String::from),
            };
            match resolved {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Skipping unusable link {:?}: {}", link, e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cursor, NewFeed};
    use crate::scrapers::FetchError;
    use crate::storage::read_payload;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    /// Serves canned pages; unknown URLs get `fallback` or a 404.
    #[derive(Default)]
    struct MemoryFetcher {
        pages: HashMap<String, Vec<u8>>,
        fallback: Option<Vec<u8>>,
        requested: Mutex<Vec<String>>,
    }

    impl MemoryFetcher {
        fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.as_bytes().to_vec());
            self
        }

        fn with_fallback(mut self, body: &str) -> Self {
            self.fallback = Some(body.as_bytes().to_vec());
            self
        }
    }

    #[async_trait]
    impl PageFetcher for MemoryFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .or(self.fallback.as_ref())
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: StatusCode::NOT_FOUND,
                })
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(day: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, minute, 0).unwrap()
    }

    fn setup(limit: NaiveDate, fetcher: MemoryFetcher) -> (TempDir, Scheduler<MemoryFetcher>, i64) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("fetcher.db");
        let feeds = FeedRepository::new(&db_path).unwrap();
        let feed_id = feeds
            .add_feed(&NewFeed {
                url_template: "https://news.example/day/%s/".to_string(),
                pattern: r#"<a class="show" href="([^"]+)">"#.to_string(),
                pattern_group: 1,
                earliest_date_limit: limit,
            })
            .unwrap();
        let documents = DocumentRepository::new(&db_path).unwrap();
        let scheduler = Scheduler::new(
            feeds,
            documents,
            dir.path(),
            fetcher,
            SchedulerConfig::default(),
        );
        (dir, scheduler, feed_id)
    }

    fn feed_with(earliest: Cursor, latest: Cursor) -> Feed {
        Feed {
            id: 1,
            url_template: "https://news.example/%s".to_string(),
            pattern: "(x)".to_string(),
            pattern_group: 1,
            earliest_date_limit: date(2024, 1, 1),
            earliest,
            latest,
        }
    }

    fn cursor(date: NaiveDate, ts: DateTime<Utc>) -> Cursor {
        Cursor {
            date: Some(date),
            timestamp: Some(ts),
        }
    }

    #[test]
    fn test_plan_first_probe_is_latest_at_horizon() {
        let feed = feed_with(Cursor::default(), Cursor::default());
        assert_eq!(
            plan_probe(&feed, date(2024, 2, 10), 7),
            ProbePlan::Fetch {
                direction: Direction::Latest,
                date: date(2024, 2, 3)
            }
        );

        // Limit inside the grace window: nothing to probe.
        assert_eq!(plan_probe(&feed, date(2024, 1, 5), 7), ProbePlan::Waiting);
        // A horizon before any representable date waits instead of panicking.
        assert_eq!(
            plan_probe(&feed, date(2024, 2, 10), i64::MAX),
            ProbePlan::Waiting
        );
    }

    #[test]
    fn test_plan_earliest_starts_from_latest_cursor() {
        let feed = feed_with(
            Cursor::default(),
            cursor(date(2024, 2, 3), at(10, 0)),
        );
        assert_eq!(
            plan_probe(&feed, date(2024, 2, 10), 7),
            ProbePlan::Fetch {
                direction: Direction::Earliest,
                date: date(2024, 2, 2)
            }
        );
    }

    #[test]
    fn test_plan_bounds_pin_cursors() {
        // Earliest already at the limit.
        let feed = feed_with(
            cursor(date(2024, 1, 1), at(10, 0)),
            cursor(date(2024, 2, 3), at(10, 5)),
        );
        assert_eq!(
            plan_probe(&feed, date(2024, 2, 10), 7),
            ProbePlan::Exhausted {
                direction: Direction::Earliest,
                cursor: date(2024, 1, 1)
            }
        );

        // Latest already at the horizon.
        let feed = feed_with(
            cursor(date(2024, 1, 20), at(10, 5)),
            cursor(date(2024, 2, 3), at(10, 0)),
        );
        assert_eq!(
            plan_probe(&feed, date(2024, 2, 10), 7),
            ProbePlan::Exhausted {
                direction: Direction::Latest,
                cursor: date(2024, 2, 3)
            }
        );

        // A day later the horizon has moved and latest can advance again.
        assert_eq!(
            plan_probe(&feed, date(2024, 2, 11), 7),
            ProbePlan::Fetch {
                direction: Direction::Latest,
                date: date(2024, 2, 4)
            }
        );
    }

    #[tokio::test]
    async fn test_probe_enqueues_resolved_links() {
        let page = r#"
            <a class="show" href="/shows/2024/01/13/alpha">Alpha</a>
            <a class="show" href="https://news.example/shows/beta">Beta</a>
            <a class="other" href="/ignored">x</a>
        "#;
        let fetcher =
            MemoryFetcher::default().with_page("https://news.example/day/2024-01-13/", page);
        let (_dir, scheduler, feed_id) = setup(date(2024, 1, 1), fetcher);

        let outcome = scheduler.tick_at(at(20, 0)).await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Probed {
                feed_id,
                direction: Direction::Latest,
                date: date(2024, 1, 13),
                enqueued: 2
            }
        );

        let pending = scheduler.documents.unfetched(10).unwrap();
        let urls: Vec<_> = pending.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://news.example/shows/2024/01/13/alpha",
                "https://news.example/shows/beta"
            ]
        );
        assert!(pending.iter().all(|d| d.date == date(2024, 1, 13)));

        let feed = scheduler.feeds.feed(feed_id).unwrap();
        assert_eq!(feed.latest.date, Some(date(2024, 1, 13)));
        assert_eq!(feed.earliest, Cursor::default());
    }

    #[tokio::test]
    async fn test_pending_documents_come_before_probes() {
        let fetcher = MemoryFetcher::default()
            .with_page("https://news.example/shows/b", "<html>b</html>");
        let (dir, scheduler, feed_id) = setup(date(2024, 1, 1), fetcher);
        let docs = &scheduler.documents;
        docs.enqueue(feed_id, "https://news.example/shows/a", date(2024, 1, 5))
            .unwrap();
        docs.enqueue(feed_id, "https://news.example/shows/b", date(2024, 1, 5))
            .unwrap();

        // First document fails, the second in the window is fetched instead.
        let outcome = scheduler.tick_at(at(20, 0)).await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Fetched {
                document_id: 2,
                url: "https://news.example/shows/b".to_string()
            }
        );
        assert!(docs.document(1).unwrap().is_pending());
        assert!(!docs.document(2).unwrap().is_pending());
        assert_eq!(
            read_payload(dir.path(), "https://news.example/shows/b").unwrap(),
            b"<html>b</html>"
        );

        // Only the failing document is left and it fails alone.
        let err = scheduler.tick_at(at(20, 1)).await.unwrap_err();
        assert!(matches!(err, SchedulerError::AllFetchesFailed { attempted: 1 }));

        // No probe happened while documents were pending.
        let requested = scheduler.fetcher.requested.lock().unwrap().clone();
        assert!(requested.iter().all(|u| u.contains("/shows/")));
        assert_eq!(scheduler.feeds.feed(feed_id).unwrap().latest, Cursor::default());
    }

    #[tokio::test]
    async fn test_unstorable_document_does_not_block_the_window() {
        // Its base64 file name is longer than a file name may be.
        let long_url = format!("https://news.example/shows/{}", "x".repeat(212));
        let fetcher = MemoryFetcher::default().with_fallback("<html>page</html>");
        let (dir, scheduler, feed_id) = setup(date(2024, 1, 1), fetcher);
        let docs = &scheduler.documents;
        docs.enqueue(feed_id, &long_url, date(2024, 1, 5)).unwrap();
        docs.enqueue(feed_id, "https://news.example/shows/ok", date(2024, 1, 5))
            .unwrap();

        let outcome = scheduler.tick_at(at(20, 0)).await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Fetched {
                document_id: 2,
                url: "https://news.example/shows/ok".to_string()
            }
        );
        assert!(docs.document(1).unwrap().is_pending());
        assert_eq!(
            read_payload(dir.path(), "https://news.example/shows/ok").unwrap(),
            b"<html>page</html>"
        );

        let err = scheduler.tick_at(at(20, 1)).await.unwrap_err();
        assert!(matches!(err, SchedulerError::AllFetchesFailed { attempted: 1 }));
        assert!(docs.document(1).unwrap().is_pending());
    }

    #[tokio::test]
    async fn test_invalid_pattern_leaves_feed_untouched() {
        let (dir, scheduler, feed_id) = setup(date(2024, 1, 1), MemoryFetcher::default());
        rusqlite::Connection::open(dir.path().join("fetcher.db"))
            .unwrap()
            .execute(
                "UPDATE feeds SET pattern = '(unclosed' WHERE id = ?",
                rusqlite::params![feed_id],
            )
            .unwrap();
        let before = scheduler.feeds.feed(feed_id).unwrap();

        let err = scheduler.tick_at(at(20, 0)).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Pattern { feed_id: id, .. } if id == feed_id));

        let after = scheduler.feeds.feed(feed_id).unwrap();
        assert_eq!(after.earliest, before.earliest);
        assert_eq!(after.latest, before.latest);
        assert!(scheduler.fetcher.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_probe_keeps_cursor() {
        let (_dir, scheduler, feed_id) = setup(date(2024, 1, 1), MemoryFetcher::default());

        let err = scheduler.tick_at(at(20, 0)).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Fetch(_)));

        let feed = scheduler.feeds.feed(feed_id).unwrap();
        assert_eq!(feed.earliest, Cursor::default());
        assert_eq!(feed.latest, Cursor::default());

        // Retried on the same date.
        let _ = scheduler.tick_at(at(20, 1)).await;
        let requested = scheduler.fetcher.requested.lock().unwrap().clone();
        assert_eq!(requested, vec![
            "https://news.example/day/2024-01-13/".to_string(),
            "https://news.example/day/2024-01-13/".to_string(),
        ]);
    }

    #[tokio::test]
    async fn test_earliest_walk_stops_at_limit() {
        let fetcher = MemoryFetcher::default().with_fallback("<html>no links</html>");
        let (_dir, scheduler, feed_id) = setup(date(2024, 1, 10), fetcher);

        let mut earliest_dates = Vec::new();
        for minute in 0..20 {
            if let TickOutcome::Probed {
                direction: Direction::Earliest,
                date,
                ..
            } = scheduler.tick_at(at(20, minute)).await.unwrap()
            {
                earliest_dates.push(date);
            }
        }

        assert_eq!(
            earliest_dates,
            vec![date(2024, 1, 12), date(2024, 1, 11), date(2024, 1, 10)]
        );
        let feed = scheduler.feeds.feed(feed_id).unwrap();
        assert_eq!(feed.earliest.date, Some(date(2024, 1, 10)));
        assert_eq!(feed.latest.date, Some(date(2024, 1, 13)));

        // Drained: further ticks do not move either date.
        for minute in 20..26 {
            let outcome = scheduler.tick_at(at(20, minute)).await.unwrap();
            assert!(matches!(outcome, TickOutcome::Exhausted { .. }));
        }
        let again = scheduler.feeds.feed(feed_id).unwrap();
        assert_eq!(again.earliest.date, feed.earliest.date);
        assert_eq!(again.latest.date, feed.latest.date);
    }

    #[tokio::test]
    async fn test_feed_never_probed_backwards_goes_first() {
        let fetcher = MemoryFetcher::default().with_fallback("<html></html>");
        let (_dir, scheduler, first) = setup(date(2024, 1, 1), fetcher);
        let second = scheduler
            .feeds
            .add_feed(&NewFeed {
                url_template: "https://other.example/{date}".to_string(),
                pattern: "href=\"([^\"]+)\"".to_string(),
                pattern_group: 1,
                earliest_date_limit: date(2024, 1, 1),
            })
            .unwrap();

        scheduler
            .feeds
            .set_cursor(first, Direction::Earliest, date(2024, 1, 12), at(19, 0))
            .unwrap();

        match scheduler.tick_at(at(20, 0)).await.unwrap() {
            TickOutcome::Probed { feed_id, .. } => assert_eq!(feed_id, second),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_extract_links_skips_unparseable() {
        let pattern = Regex::new(r#"href="([^"]*)""#).unwrap();
        let links = extract_links(
            &pattern,
            1,
            "https://news.example/day/2024-01-01/",
            br#"<a href="../x">x</a><a href="http://[::1">bad</a>"#,
        );
        assert_eq!(links, vec!["https://news.example/day/x".to_string()]);
    }
}
