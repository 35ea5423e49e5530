//! Data models shared by the fetcher and the analyzers.

mod dictionary;
mod document;
mod feed;
mod transcript;

pub use dictionary::{PhraseCounts, PhraseDictionary, ResponsePhrase, RESPONSE_WORDS};
pub use document::{Document, DocumentStatus};
pub use feed::{Cursor, Direction, Feed, NewFeed, DATE_PLACEHOLDERS};
pub use transcript::TranscriptLine;
