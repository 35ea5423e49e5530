use std::fmt;

use serde::{Deserialize, Serialize};

/// One paragraph of an extracted transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    /// Paragraph position within the document.
    pub index: usize,
    /// Speaker label as written (empty for narration).
    pub speaker: String,
    /// Canonical speaker name after per-document normalization.
    pub name: String,
    pub text: String,
}

impl TranscriptLine {
    /// Line attributed to `name`, with the label equal to the canonical name.
    pub fn spoken(index: usize, name: &str, text: &str) -> Self {
        Self {
            index,
            speaker: name.to_string(),
            name: name.to_string(),
            text: text.to_string(),
        }
    }
}

impl fmt::Display for TranscriptLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.speaker.is_empty() {
            write!(f, "{}", self.text)
        } else if !self.name.is_empty() && self.name != self.speaker {
            write!(f, "[{}] {}: {}", self.name, self.speaker, self.text)
        } else {
            write!(f, "{}: {}", self.speaker, self.text)
        }
    }
}
