//! Sentence-aware phrase windows over a line of text.
//!
//! [`Phraser`] walks the whitespace-separated tokens of a text once and yields
//! one [`Window`] per word position: the up-to-`max_words` words starting
//! there. Every prefix of a window is a candidate phrase, so the windows of a
//! text cover each contiguous run of at most `max_words` words exactly once.
//!
//! A token whose last raw character is a sentence terminator closes the
//! current sentence: the buffered words are drained into windows before any
//! later word is read, so no window spans two sentences.

use std::collections::VecDeque;

/// Trailing characters that end a sentence.
pub const TERMINATORS: [char; 9] = ['.', ':', ')', ']', '}', '!', '?', '"', '\''];

/// Normalize a raw token: strip non-alphanumerics at both ends, lower-case.
pub fn normalize_word(raw: &str) -> String {
    raw.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Up to `max_words` consecutive normalized words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    words: Vec<String>,
}

impl Window {
    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The window's prefixes, shortest first, joined with single spaces.
    pub fn phrases(&self) -> impl Iterator<Item = String> + '_ {
        (1..=self.words.len()).map(|n| self.words[..n].join(" "))
    }
}

/// Pull-based window generator.
///
/// State is the word buffer, whether its current contents were already
/// yielded, and whether a sentence end is being drained.
#[derive(Debug, Clone)]
pub struct Phraser<'a> {
    tokens: Vec<&'a str>,
    position: usize,
    max_words: usize,
    buffer: VecDeque<String>,
    unemitted: bool,
    draining: bool,
}

impl<'a> Phraser<'a> {
    pub fn new(text: &'a str, max_words: usize) -> Self {
        Self {
            tokens: text.split_whitespace().collect(),
            position: 0,
            max_words: max_words.max(1),
            buffer: VecDeque::with_capacity(max_words),
            unemitted: false,
            draining: false,
        }
    }

    /// Only consider the first `count` raw tokens of the text.
    pub fn only_first_words(mut self, count: usize) -> Self {
        self.tokens.truncate(count);
        self
    }

    fn window(&self) -> Window {
        Window {
            words: self.buffer.iter().cloned().collect(),
        }
    }
}

impl Iterator for Phraser<'_> {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        loop {
            if self.draining {
                if self.unemitted {
                    self.unemitted = false;
                    return Some(self.window());
                }
                self.buffer.pop_front();
                if self.buffer.is_empty() {
                    self.draining = false;
                    continue;
                }
                return Some(self.window());
            }

            let Some(raw) = self.tokens.get(self.position).copied() else {
                if self.buffer.is_empty() {
                    return None;
                }
                self.draining = true;
                continue;
            };
            self.position += 1;

            let terminated = raw.ends_with(&TERMINATORS[..]);
            let word = normalize_word(raw);
            let pushed = !word.is_empty();
            if pushed {
                if self.buffer.len() == self.max_words {
                    self.buffer.pop_front();
                }
                self.buffer.push_back(word);
                self.unemitted = true;
            }

            if terminated && !self.buffer.is_empty() {
                self.draining = true;
            } else if pushed && self.buffer.len() == self.max_words {
                self.unemitted = false;
                return Some(self.window());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows(text: &str, max_words: usize) -> Vec<Vec<String>> {
        Phraser::new(text, max_words)
            .map(|w| w.words().to_vec())
            .collect()
    }

    fn phrases(text: &str, max_words: usize) -> Vec<String> {
        let mut out: Vec<String> = Phraser::new(text, max_words)
            .flat_map(|w| w.phrases().collect::<Vec<_>>())
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_sentence_boundary_is_not_crossed() {
        assert_eq!(
            windows("Hello, world. Next sentence", 2),
            vec![
                vec!["hello", "world"],
                vec!["world"],
                vec!["next", "sentence"],
                vec!["sentence"],
            ]
        );
        assert!(!phrases("Hello, world. Next sentence", 2).contains(&"world next".to_string()));
    }

    #[test]
    fn test_every_span_up_to_width_appears_once() {
        let got = phrases("a b c d", 3);
        let mut expected: Vec<String> = ["a", "b", "c", "d", "a b", "b c", "c d", "a b c", "b c d"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        expected.sort();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_tokens_are_normalized() {
        assert_eq!(
            windows("  \"Well\u{2014}  (REALLY)  ok ", 5),
            vec![vec!["well", "really"], vec!["really"], vec!["ok"]]
        );
    }

    #[test]
    fn test_empty_tokens_still_terminate() {
        // "--." normalizes to nothing but still ends the sentence.
        assert_eq!(
            windows("one two --. three", 3),
            vec![vec!["one", "two"], vec!["two"], vec!["three"]]
        );
        assert!(windows("", 5).is_empty());
        assert!(windows("... !!!", 5).is_empty());
    }

    #[test]
    fn test_only_first_words() {
        let got: Vec<_> = Phraser::new("you are very welcome indeed", 5)
            .only_first_words(3)
            .map(|w| w.words().join(" "))
            .collect();
        assert_eq!(got, vec!["you are very", "are very", "very"]);
    }

    #[test]
    fn test_window_phrases_are_prefixes() {
        let window = Phraser::new("you know what", 5).next().unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(
            window.phrases().collect::<Vec<_>>(),
            vec!["you", "you know", "you know what"]
        );
    }
}
