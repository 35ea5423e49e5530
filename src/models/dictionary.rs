//! Lookup values owned by the analyzers.

use std::collections::HashMap;

/// Width of a stored thank-you response phrase.
pub const RESPONSE_WORDS: usize = 5;

/// Fixed-arity word tuple; unused trailing slots are empty strings.
pub type ResponsePhrase = [String; RESPONSE_WORDS];

/// Counts keyed by (speaker name, phrase text).
pub type PhraseCounts = HashMap<(String, String), u64>;

/// Phrases and prefaces to count, each mapped to its registered row id.
///
/// Entries are stored normalized (lower case, single spaces) so that a
/// window joined with spaces can be looked up directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseDictionary {
    phrases: HashMap<String, i64>,
    prefaces: HashMap<String, i64>,
}

impl PhraseDictionary {
    pub fn new(phrases: HashMap<String, i64>, prefaces: HashMap<String, i64>) -> Self {
        Self {
            phrases: phrases
                .into_iter()
                .map(|(k, v)| (Self::normalize(&k), v))
                .collect(),
            prefaces: prefaces
                .into_iter()
                .map(|(k, v)| (Self::normalize(&k), v))
                .collect(),
        }
    }

    /// Normalize a configured entry to the form windows are joined in.
    pub fn normalize(entry: &str) -> String {
        entry
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn phrase_id(&self, phrase: &str) -> Option<i64> {
        self.phrases.get(phrase).copied()
    }

    pub fn preface_id(&self, preface: &str) -> Option<i64> {
        self.prefaces.get(preface).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty() && self.prefaces.is_empty()
    }

    pub fn sizes(&self) -> (usize, usize) {
        (self.phrases.len(), self.prefaces.len())
    }
}
