//! Phrase and preface counting per speaker.

use tracing::debug;

use super::phraser::Phraser;
use super::{AnalysisError, DocumentAnalyzer};
use crate::models::{Document, PhraseCounts, PhraseDictionary, TranscriptLine};
use crate::repository::PhraseRepository;

/// Count dictionary phrases in every window of every line, and dictionary
/// prefaces in the first window of each line only.
pub fn count_phrases(
    lines: &[TranscriptLine],
    dictionary: &PhraseDictionary,
    max_words: usize,
) -> (PhraseCounts, PhraseCounts) {
    let mut phrases = PhraseCounts::new();
    let mut prefaces = PhraseCounts::new();

    for line in lines {
        for (position, window) in Phraser::new(&line.text, max_words).enumerate() {
            for phrase in window.phrases() {
                if position == 0 && dictionary.preface_id(&phrase).is_some() {
                    *prefaces
                        .entry((line.name.clone(), phrase.clone()))
                        .or_default() += 1;
                }
                if dictionary.phrase_id(&phrase).is_some() {
                    *phrases.entry((line.name.clone(), phrase)).or_default() += 1;
                }
            }
        }
    }

    (phrases, prefaces)
}

/// Analyzer persisting phrase and preface counts.
pub struct PhraseAnalyzer {
    repo: PhraseRepository,
    dictionary: PhraseDictionary,
    max_words: usize,
}

impl PhraseAnalyzer {
    pub fn new(repo: PhraseRepository, dictionary: PhraseDictionary, max_words: usize) -> Self {
        Self {
            repo,
            dictionary,
            max_words,
        }
    }
}

impl DocumentAnalyzer for PhraseAnalyzer {
    fn name(&self) -> &'static str {
        "phrases"
    }

    fn analyze(
        &mut self,
        document: &Document,
        lines: &[TranscriptLine],
    ) -> Result<bool, AnalysisError> {
        let (phrases, prefaces) = count_phrases(lines, &self.dictionary, self.max_words);
        debug!(
            "Document {}: {} phrase key(s), {} preface key(s)",
            document.id,
            phrases.len(),
            prefaces.len()
        );
        Ok(self
            .repo
            .add_counts(document, &self.dictionary, &phrases, &prefaces)?)
    }
}
