//! Incremental analyzers over the fetch log.
//!
//! Each analyzer owns a database with its own [`OffsetStore`]. A [`Consumer`]
//! pulls documents fetched after the analyzer's watermark in fetch order,
//! extracts their transcripts, hands them to the analyzer, and advances the
//! watermark only once the analyzer's writes are committed.

pub mod phraser;
pub mod phrases;
pub mod thanks;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Document, TranscriptLine};
use crate::repository::{DocumentRepository, OffsetStore, RepositoryError};
use crate::scrapers::transcript;
use crate::storage::document_contents;

pub use phraser::{Phraser, Window};
pub use phrases::{count_phrases, PhraseAnalyzer};
pub use thanks::{find_responses, response_phrases, ThankAnalyzer};

/// Documents requested from the log per query.
const BATCH_SIZE: usize = 50;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("payload error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document {0} has no fetch timestamp")]
    Unfetched(i64),
}

/// One analysis over extracted transcripts.
pub trait DocumentAnalyzer {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Record the results for one document in a single transaction.
    ///
    /// Returns false when the document had already been recorded.
    fn analyze(
        &mut self,
        document: &Document,
        lines: &[TranscriptLine],
    ) -> Result<bool, AnalysisError>;
}

/// Totals for one [`Consumer::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumeSummary {
    /// Documents whose results were recorded.
    pub processed: usize,
    /// Documents already recorded before (redelivered after a crash).
    pub skipped: usize,
    /// The log had no more documents past the watermark.
    pub exhausted: bool,
}

/// Feeds newly fetched documents to an analyzer.
pub struct Consumer<'a> {
    documents: &'a DocumentRepository,
    offsets: OffsetStore,
    data_dir: PathBuf,
}

impl<'a> Consumer<'a> {
    pub fn new(documents: &'a DocumentRepository, offsets: OffsetStore, data_dir: &Path) -> Self {
        Self {
            documents,
            offsets,
            data_dir: data_dir.to_path_buf(),
        }
    }

    pub fn offsets(&self) -> &OffsetStore {
        &self.offsets
    }

    /// Analyze up to `limit` documents past the watermark.
    pub fn run<A: DocumentAnalyzer>(
        &self,
        analyzer: &mut A,
        limit: usize,
    ) -> Result<ConsumeSummary, AnalysisError> {
        let mut summary = ConsumeSummary::default();
        let mut remaining = limit;

        while remaining > 0 {
            let watermark = self.offsets.current()?;
            let batch = self
                .documents
                .fetched_since(watermark, remaining.min(BATCH_SIZE))?;
            if batch.is_empty() {
                summary.exhausted = true;
                break;
            }

            for document in &batch {
                let fetched_at = document
                    .fetch_timestamp
                    .ok_or(AnalysisError::Unfetched(document.id))?;
                let content = document_contents(&self.data_dir, document)?;
                let lines = transcript::extract(&content);

                if analyzer.analyze(document, &lines)? {
                    summary.processed += 1;
                    debug!(
                        "{}: document {} ({} lines)",
                        analyzer.name(),
                        document.id,
                        lines.len()
                    );
                } else {
                    summary.skipped += 1;
                    debug!(
                        "{}: document {} already recorded",
                        analyzer.name(),
                        document.id
                    );
                }
                self.offsets.advance(fetched_at)?;
            }
            remaining -= batch.len();
        }

        if summary.exhausted {
            info!("{}: no more documents", analyzer.name());
        }
        Ok(summary)
    }
}
