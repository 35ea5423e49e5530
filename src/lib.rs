//! transcript-miner: an append-only log of fetched transcript pages and the
//! incremental analyzers that consume it.
//!
//! The fetcher walks date-parameterized feed index pages in both directions,
//! enqueues the documents they link to and stores their payloads compressed
//! on disk. Analyzers read the log in fetch order, each from its own
//! watermark, and aggregate speech patterns per speaker.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod scrapers;
pub mod services;
pub mod storage;
