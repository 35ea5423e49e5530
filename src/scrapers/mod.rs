//! Network and content collaborators: page fetching and transcript extraction.

mod http_client;
pub mod transcript;

pub use http_client::{FetchError, HttpClient, PageFetcher, USER_AGENT};
