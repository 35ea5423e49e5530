//! Detection of responses to "thank you".

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use super::phraser::Phraser;
use super::{AnalysisError, DocumentAnalyzer};
use crate::models::{Document, ResponsePhrase, TranscriptLine, RESPONSE_WORDS};
use crate::repository::{format_date, ThankRepository};

static THANKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[Tt]hank(s| you)\b").unwrap());

/// Whether a line of text thanks someone.
pub fn is_thanks(text: &str) -> bool {
    THANKS.is_match(text)
}

/// Indices of lines that answer a "thanks" line.
///
/// A line is a response when the line before it said thanks and it comes
/// from a named speaker other than that line's speaker, whose own latest line
/// was not a thanks, and who has not been credited since last thanking
/// someone themselves.
pub fn find_responses(lines: &[TranscriptLine]) -> Vec<usize> {
    let mut said_thanks: HashMap<&str, bool> = HashMap::new();
    let mut credited: HashSet<&str> = HashSet::new();
    let mut previous: Option<(&str, bool)> = None;
    let mut responses = Vec::new();

    for (position, line) in lines.iter().enumerate() {
        let name = line.name.as_str();
        if let Some((previous_name, true)) = previous {
            if !name.is_empty()
                && name != previous_name
                && !said_thanks.get(name).copied().unwrap_or(false)
                && credited.insert(name)
            {
                responses.push(position);
            }
        }

        let thanks = is_thanks(&line.text);
        if thanks {
            credited.remove(name);
        }
        said_thanks.insert(name, thanks);
        previous = Some((name, thanks));
    }

    responses
}

/// Every window prefix among the first `first_words` tokens of a response,
/// padded to [`RESPONSE_WORDS`] slots.
pub fn response_phrases(text: &str, first_words: usize) -> BTreeSet<ResponsePhrase> {
    let mut phrases = BTreeSet::new();
    for window in Phraser::new(text, RESPONSE_WORDS).only_first_words(first_words) {
        for n in 1..=window.len() {
            let mut phrase = ResponsePhrase::default();
            for (slot, word) in phrase.iter_mut().zip(&window.words()[..n]) {
                slot.clone_from(word);
            }
            phrases.insert(phrase);
        }
    }
    phrases
}

/// Analyzer persisting response phrases per speaker.
pub struct ThankAnalyzer {
    repo: ThankRepository,
    first_words: usize,
}

impl ThankAnalyzer {
    pub fn new(repo: ThankRepository, first_words: usize) -> Self {
        Self { repo, first_words }
    }
}

impl DocumentAnalyzer for ThankAnalyzer {
    fn name(&self) -> &'static str {
        "thanks"
    }

    fn analyze(
        &mut self,
        document: &Document,
        lines: &[TranscriptLine],
    ) -> Result<bool, AnalysisError> {
        let mut responses: BTreeMap<String, BTreeSet<ResponsePhrase>> = BTreeMap::new();
        for position in find_responses(lines) {
            let line = &lines[position];
            info!(
                "{},{}.{}: {}",
                format_date(document.date),
                document.id,
                line.index,
                line
            );
            responses
                .entry(line.name.clone())
                .or_default()
                .extend(response_phrases(&line.text, self.first_words));
        }
        Ok(self.repo.add_responses(document, &responses)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[(&str, &str)]) -> Vec<TranscriptLine> {
        items
            .iter()
            .enumerate()
            .map(|(i, (name, text))| TranscriptLine::spoken(i, name, text))
            .collect()
    }

    fn credited(items: &[(&str, &str)]) -> Vec<String> {
        let lines = lines(items);
        find_responses(&lines)
            .into_iter()
            .map(|i| lines[i].name.clone())
            .collect()
    }

    #[test]
    fn test_thanks_pattern() {
        assert!(is_thanks("Thanks Bob"));
        assert!(is_thanks("well, thank you."));
        assert!(!is_thanks("thankful for that"));
        assert!(!is_thanks("THANKS"));
    }

    #[test]
    fn test_next_speaker_is_credited() {
        assert_eq!(
            credited(&[("A", "thanks Bob"), ("B", "you're welcome"), ("C", "random")]),
            vec!["B"]
        );
    }

    #[test]
    fn test_speaker_is_credited_once_until_they_thank() {
        let items = [
            ("A", "Thanks for coming."),
            ("B", "Glad to be here."),
            ("A", "Thank you again."),
            ("B", "Of course."),
            ("C", "Well, thanks from me too."),
            ("B", "Sure thing."),
            ("B", "Thank you all."),
            ("B", "It was fun."),
            ("C", "Thanks, B."),
            ("B", "Anytime."),
        ];
        let lines = lines(&items);
        // B answers at 1, is not credited again at 3 or 5, and after
        // thanking at 6 can be credited again at 9.
        assert_eq!(find_responses(&lines), vec![1, 9]);
    }

    #[test]
    fn test_speaker_whose_last_line_thanked_is_not_credited() {
        // A's previous line was itself a thanks.
        assert_eq!(
            credited(&[("A", "Thanks."), ("B", "Thank you!"), ("A", "Okay.")]),
            vec!["B"]
        );
    }

    #[test]
    fn test_unnamed_and_same_speaker_lines_are_skipped() {
        assert!(credited(&[("A", "thanks"), ("", "(APPLAUSE)"), ("B", "hi")]).is_empty());
        assert!(credited(&[("A", "thanks"), ("A", "really")]).is_empty());
    }

    #[test]
    fn test_response_phrases_cover_first_words() {
        let phrases = response_phrases("You're welcome. Anytime at all, really.", 4);
        let joined: BTreeSet<String> = phrases
            .iter()
            .map(|p| p.iter().filter(|w| !w.is_empty()).cloned().collect::<Vec<_>>().join(" "))
            .collect();

        let expected: BTreeSet<String> = [
            "you're",
            "you're welcome",
            "welcome",
            "anytime",
            "anytime at",
            "at",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(joined, expected);
        assert!(phrases.iter().all(|p| p.len() == RESPONSE_WORDS));
    }
}
