//! Thank-you analysis storage: response phrases per speaker and document.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::{claim_file, connect, intern, Result};
use crate::models::{Document, ResponsePhrase};

pub struct ThankRepository {
    db_path: PathBuf,
}

impl ThankRepository {
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        self.connect()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS words (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                word TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS speakers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY,
                date TEXT NOT NULL,
                fetch_timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_files_date ON files (date);

            CREATE TABLE IF NOT EXISTS responses (
                file_id INTEGER NOT NULL REFERENCES files (id),
                speaker_id INTEGER NOT NULL REFERENCES speakers (id),
                word1_id INTEGER NOT NULL REFERENCES words (id),
                word2_id INTEGER NOT NULL REFERENCES words (id),
                word3_id INTEGER NOT NULL REFERENCES words (id),
                word4_id INTEGER NOT NULL REFERENCES words (id),
                word5_id INTEGER NOT NULL REFERENCES words (id),
                PRIMARY KEY (file_id, speaker_id, word1_id, word2_id, word3_id, word4_id, word5_id)
            );
            CREATE INDEX IF NOT EXISTS idx_responses_words
                ON responses (word1_id, word2_id, word3_id, word4_id, word5_id);
            "#,
        )?;
        Ok(())
    }

    /// Store one document's responses.
    ///
    /// Returns false, changing nothing, when this fetch of the document was
    /// already recorded. Responses from an older fetch are replaced.
    pub fn add_responses(
        &self,
        document: &Document,
        responses: &BTreeMap<String, BTreeSet<ResponsePhrase>>,
    ) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        if !claim_file(&tx, document, &["responses"])? {
            return Ok(false);
        }

        let mut speakers = HashMap::new();
        let mut words = HashMap::new();
        for (speaker, phrases) in responses {
            let speaker_id = intern(&tx, "speakers", "name", speaker, &mut speakers)?;
            for phrase in phrases {
                let mut ids = [0i64; 5];
                for (slot, word) in ids.iter_mut().zip(phrase.iter()) {
                    *slot = intern(&tx, "words", "word", word, &mut words)?;
                }
                tx.execute(
                    "INSERT OR IGNORE INTO responses
                     (file_id, speaker_id, word1_id, word2_id, word3_id, word4_id, word5_id)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                    params![document.id, speaker_id, ids[0], ids[1], ids[2], ids[3], ids[4]],
                )?;
            }
        }

        tx.commit()?;
        Ok(true)
    }

    pub fn response_count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn file_count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Response phrases recorded for one speaker, words joined with spaces.
    pub fn phrases_for(&self, speaker: &str) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT TRIM(w1.word || ' ' || w2.word || ' ' || w3.word || ' '
                                  || w4.word || ' ' || w5.word) AS phrase
             FROM responses r
             JOIN speakers s ON s.id = r.speaker_id
             JOIN words w1 ON w1.id = r.word1_id
             JOIN words w2 ON w2.id = r.word2_id
             JOIN words w3 ON w3.id = r.word3_id
             JOIN words w4 ON w4.id = r.word4_id
             JOIN words w5 ON w5.id = r.word5_id
             WHERE s.name = ?
             ORDER BY phrase",
        )?;
        let phrases = stmt
            .query_map(params![speaker], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(phrases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;

    fn document(id: i64) -> Document {
        Document {
            id,
            feed_id: 1,
            url: format!("https://example.com/{id}"),
            date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            fetch_timestamp: Some(Utc.with_ymd_and_hms(2024, 4, 2, 6, 0, 0).unwrap()),
            purge_timestamp: None,
        }
    }

    fn phrase(words: &[&str]) -> ResponsePhrase {
        let mut out: ResponsePhrase = Default::default();
        for (slot, word) in out.iter_mut().zip(words) {
            *slot = word.to_string();
        }
        out
    }

    #[test]
    fn test_add_responses_once_per_document() {
        let dir = tempdir().unwrap();
        let repo = ThankRepository::new(&dir.path().join("thank-analysis.db")).unwrap();

        let mut responses = BTreeMap::new();
        responses.insert(
            "BOB".to_string(),
            BTreeSet::from([
                phrase(&["you're"]),
                phrase(&["you're", "welcome"]),
                phrase(&["welcome"]),
            ]),
        );

        assert!(repo.add_responses(&document(1), &responses).unwrap());
        assert!(!repo.add_responses(&document(1), &responses).unwrap());
        assert_eq!(repo.response_count().unwrap(), 3);
        assert_eq!(repo.file_count().unwrap(), 1);

        assert_eq!(
            repo.phrases_for("BOB").unwrap(),
            vec!["welcome", "you're", "you're welcome"]
        );
        assert!(repo.phrases_for("ALICE").unwrap().is_empty());
    }

    #[test]
    fn test_document_without_responses_is_still_recorded() {
        let dir = tempdir().unwrap();
        let repo = ThankRepository::new(&dir.path().join("thank-analysis.db")).unwrap();

        assert!(repo.add_responses(&document(5), &BTreeMap::new()).unwrap());
        assert!(!repo.add_responses(&document(5), &BTreeMap::new()).unwrap());
        assert_eq!(repo.response_count().unwrap(), 0);
    }

    #[test]
    fn test_refetched_document_replaces_responses() {
        let dir = tempdir().unwrap();
        let repo = ThankRepository::new(&dir.path().join("thank-analysis.db")).unwrap();

        let first = document(3);
        let mut responses = BTreeMap::new();
        responses.insert("BOB".to_string(), BTreeSet::from([phrase(&["welcome"])]));
        assert!(repo.add_responses(&first, &responses).unwrap());

        let mut refetched = first.clone();
        refetched.fetch_timestamp = first.fetch_timestamp.map(|t| t + Duration::hours(2));
        let mut revised = BTreeMap::new();
        revised.insert(
            "CAROL".to_string(),
            BTreeSet::from([phrase(&["my", "pleasure"])]),
        );
        assert!(repo.add_responses(&refetched, &revised).unwrap());
        assert!(!repo.add_responses(&refetched, &revised).unwrap());

        assert!(repo.phrases_for("BOB").unwrap().is_empty());
        assert_eq!(repo.phrases_for("CAROL").unwrap(), vec!["my pleasure"]);
        assert_eq!(repo.response_count().unwrap(), 1);
        assert_eq!(repo.file_count().unwrap(), 1);
    }
}
