//! Transcript extraction from fetched HTML pages.
//!
//! The transcript block is located with fixed markers rather than a full HTML
//! parse: it starts at the first `<div>` whose class mentions `transcript`,
//! ends at the next `</div>`, and every `<p>` inside starts a new line.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::bytes::Regex;

use crate::models::TranscriptLine;

static START_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<div class="[^"]*transcript[^"]*"[^>]*>"#).unwrap());
static CONTENT_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<p>").unwrap());
static END_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</div>").unwrap());

/// Extract the speaker-tagged lines of a transcript page.
///
/// Pages without a transcript block yield no lines.
pub fn extract(content: &[u8]) -> Vec<TranscriptLine> {
    to_lines(paragraphs(content))
}

/// Raw paragraph texts between `<p>` markers.
fn paragraphs(content: &[u8]) -> Vec<String> {
    let Some(start) = START_MARKER.find(content) else {
        return Vec::new();
    };
    let mut block = &content[start.end()..];
    if let Some(end) = END_MARKER.find(block) {
        block = &block[..end.start()];
    }

    let mut markers = CONTENT_MARKER.find_iter(block).peekable();
    let Some(first) = markers.next() else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut from = first.end();
    loop {
        let until = markers.peek().map_or(block.len(), |m| m.start());
        let text = String::from_utf8_lossy(&block[from..until]);
        let text = text.trim();
        let text = text.strip_suffix("</p>").unwrap_or(text).trim();
        if !text.is_empty() {
            items.push(text.to_string());
        }
        match markers.next() {
            Some(m) => from = m.end(),
            None => return items,
        }
    }
}

/// Attribute paragraphs to speakers, resolving label variants to one name.
fn to_lines(paragraphs: Vec<String>) -> Vec<TranscriptLine> {
    let mut names = NameTable::default();
    paragraphs
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item.split_once(':') {
            None => TranscriptLine {
                index,
                text: item,
                ..Default::default()
            },
            Some((speaker, text)) => TranscriptLine {
                index,
                name: names.resolve(speaker),
                speaker: speaker.to_string(),
                text: text.trim_matches(' ').to_string(),
            },
        })
        .collect()
}

/// Per-document table mapping speaker labels to canonical names.
///
/// A label like `JOHN SMITH, HOST` introduces the canonical `JOHN SMITH`;
/// later short forms (`SMITH`, `JOHN`, `JOHN J. SMITH`) resolve to it.
#[derive(Default)]
struct NameTable {
    aliases: HashMap<String, String>,
    canonical: Vec<String>,
}

impl NameTable {
    fn resolve(&mut self, label: &str) -> String {
        if let Some(comma) = label.find(',').filter(|&i| i > 0) {
            let name = label[..comma].trim_matches(' ').to_string();
            self.register(&name, &name);
            return name;
        }
        if let Some(name) = self.aliases.get(label) {
            return name.clone();
        }

        let found = self
            .canonical
            .iter()
            .find(|n| n.ends_with(label))
            .or_else(|| self.canonical.iter().find(|n| n.starts_with(label)))
            .or_else(|| {
                let (first, _) = label.split_once(' ')?;
                let (_, last) = label.rsplit_once(' ')?;
                self.canonical
                    .iter()
                    .find(|n| n.starts_with(first) && n.ends_with(last))
            })
            .cloned();

        let name = found.unwrap_or_else(|| label.to_string());
        self.register(label, &name);
        name
    }

    fn register(&mut self, alias: &str, name: &str) {
        if !self.canonical.iter().any(|n| n == name) {
            self.canonical.push(name.to_string());
        }
        self.aliases.insert(alias.to_string(), name.to_string());
    }
}
