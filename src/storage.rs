//! Payload files for fetched documents.
//!
//! Content is stored gzip-compressed under a path derived from the URL:
//! `{data_dir}/files/{hex(sha1[0..2])}/{hex(sha1[2..4])}/{base64url(url)}`.
//! The two hash levels bound directory fan-out and the file name keeps the
//! URL recoverable.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use tempfile::NamedTempFile;

use crate::models::Document;

/// Directory under the data dir holding all payloads.
pub const FILES_DIR: &str = "files";

/// Deterministic payload location for a URL.
pub fn payload_path(data_dir: &Path, url: &str) -> PathBuf {
    let hash = Sha1::digest(url.as_bytes());
    data_dir
        .join(FILES_DIR)
        .join(hex::encode(&hash[0..2]))
        .join(hex::encode(&hash[2..4]))
        .join(URL_SAFE_NO_PAD.encode(url.as_bytes()))
}

/// Recover the URL a payload file name was derived from.
pub fn url_from_file_name(name: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(name).ok()?;
    String::from_utf8(bytes).ok()
}

/// Compress and store a payload, replacing any previous one atomically.
pub fn write_payload(data_dir: &Path, url: &str, content: &[u8]) -> io::Result<PathBuf> {
    let path = payload_path(data_dir, url);
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "payload path has no parent"))?;
    fs::create_dir_all(parent)?;

    let tmp = NamedTempFile::new_in(parent)?;
    let mut encoder = GzEncoder::new(tmp, Compression::default());
    encoder.write_all(content)?;
    let tmp = encoder.finish()?;
    tmp.as_file().sync_all()?;
    tmp.persist(&path).map_err(|e| e.error)?;

    Ok(path)
}

/// Read and decompress a stored payload.
pub fn read_payload(data_dir: &Path, url: &str) -> io::Result<Vec<u8>> {
    let file = fs::File::open(payload_path(data_dir, url))?;
    let mut content = Vec::new();
    GzDecoder::new(file).read_to_end(&mut content)?;
    Ok(content)
}

/// Payload of a fetched document. Pending documents have no trustworthy
/// payload even if a file exists, so they are rejected.
pub fn document_contents(data_dir: &Path, document: &Document) -> io::Result<Vec<u8>> {
    if document.fetch_timestamp.is_none() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("document {} has not been fetched", document.id),
        ));
    }
    read_payload(data_dir, &document.url)
}
