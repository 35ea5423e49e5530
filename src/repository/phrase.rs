//! Phrase analysis storage: dictionary registration and per-document counts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::{claim_file, connect, intern, Result};
use crate::models::{Document, PhraseCounts, PhraseDictionary};

/// Aggregated count for one (speaker, entry) pair.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PhraseTotal {
    pub speaker: String,
    pub entry: String,
    pub count: u64,
}

/// Entries registered in the database, as opposed to configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisteredEntries {
    pub phrases: Vec<String>,
    pub prefaces: Vec<String>,
}

pub struct PhraseRepository {
    db_path: PathBuf,
}

impl PhraseRepository {
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
            CREATE TABLE IF NOT EXISTS phrases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phrase TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS prefaces (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                preface TEXT NOT NULL UNIQUE
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

            CREATE TABLE IF NOT EXISTS phrase_counts (
                file_id INTEGER NOT NULL REFERENCES files (id),
                speaker_id INTEGER NOT NULL REFERENCES speakers (id),
                phrase_id INTEGER NOT NULL REFERENCES phrases (id),
                count INTEGER NOT NULL,
                PRIMARY KEY (file_id, speaker_id, phrase_id)
            );
            CREATE INDEX IF NOT EXISTS idx_phrase_counts_speaker ON phrase_counts (speaker_id);
            CREATE INDEX IF NOT EXISTS idx_phrase_counts_phrase ON phrase_counts (phrase_id);

            CREATE TABLE IF NOT EXISTS preface_counts (
                file_id INTEGER NOT NULL REFERENCES files (id),
                speaker_id INTEGER NOT NULL REFERENCES speakers (id),
                preface_id INTEGER NOT NULL REFERENCES prefaces (id),
                count INTEGER NOT NULL,
                PRIMARY KEY (file_id, speaker_id, preface_id)
            );
            CREATE INDEX IF NOT EXISTS idx_preface_counts_speaker ON preface_counts (speaker_id);
            CREATE INDEX IF NOT EXISTS idx_preface_counts_preface ON preface_counts (preface_id);
            "#,
        )?;
        Ok(())
    }

    /// Register configured entries (ids are stable across runs) and build
    /// the lookup dictionary from them.
    pub fn register_dictionary(
        &self,
        phrases: &[String],
        prefaces: &[String],
    ) -> Result<PhraseDictionary> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let mut phrase_ids = HashMap::new();
        for phrase in phrases {
            let phrase = PhraseDictionary::normalize(phrase);
            if !phrase.is_empty() {
                intern(&tx, "phrases", "phrase", &phrase, &mut phrase_ids)?;
            }
        }
        let mut preface_ids = HashMap::new();
        for preface in prefaces {
            let preface = PhraseDictionary::normalize(preface);
            if !preface.is_empty() {
                intern(&tx, "prefaces", "preface", &preface, &mut preface_ids)?;
            }
        }

        tx.commit()?;
        Ok(PhraseDictionary::new(phrase_ids, preface_ids))
    }

    /// Everything ever registered, sorted.
    pub fn registered(&self) -> Result<RegisteredEntries> {
        let conn = self.connect()?;
        let mut entries = RegisteredEntries::default();
        for (sql, out) in [
            ("SELECT phrase FROM phrases ORDER BY phrase", &mut entries.phrases),
            ("SELECT preface FROM prefaces ORDER BY preface", &mut entries.prefaces),
        ] {
            let mut stmt = conn.prepare(sql)?;
            *out = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
        }
        Ok(entries)
    }

    /// Apply one document's counts.
    ///
    /// Returns false, changing nothing, when this fetch of the document was
    /// already counted. Counts from an older fetch are replaced.
    /// Entries missing from `dictionary` are ignored.
    pub fn add_counts(
        &self,
        document: &Document,
        dictionary: &PhraseDictionary,
        phrases: &PhraseCounts,
        prefaces: &PhraseCounts,
    ) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        if !claim_file(&tx, document, &["phrase_counts", "preface_counts"])? {
            return Ok(false);
        }

        let mut speakers = HashMap::new();
        for ((speaker, phrase), count) in phrases {
            let Some(phrase_id) = dictionary.phrase_id(phrase) else {
                continue;
            };
            if *count == 0 {
                continue;
            }
            let speaker_id = intern(&tx, "speakers", "name", speaker, &mut speakers)?;
            tx.execute(
                "INSERT INTO phrase_counts (file_id, speaker_id, phrase_id, count)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT (file_id, speaker_id, phrase_id)
                 DO UPDATE SET count = count + excluded.count",
                params![document.id, speaker_id, phrase_id, *count as i64],
            )?;
        }
        for ((speaker, preface), count) in prefaces {
            let Some(preface_id) = dictionary.preface_id(preface) else {
                continue;
            };
            if *count == 0 {
                continue;
            }
            let speaker_id = intern(&tx, "speakers", "name", speaker, &mut speakers)?;
            tx.execute(
                "INSERT INTO preface_counts (file_id, speaker_id, preface_id, count)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT (file_id, speaker_id, preface_id)
                 DO UPDATE SET count = count + excluded.count",
                params![document.id, speaker_id, preface_id, *count as i64],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    /// Number of documents counted so far.
    pub fn file_count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Phrase totals per speaker, highest first.
    pub fn phrase_totals(&self) -> Result<Vec<PhraseTotal>> {
        self.totals(
            "SELECT s.name, p.phrase, SUM(c.count) AS total
             FROM phrase_counts c
             JOIN speakers s ON s.id = c.speaker_id
             JOIN phrases p ON p.id = c.phrase_id
             GROUP BY s.name, p.phrase
             ORDER BY total DESC, s.name, p.phrase",
        )
    }

    /// Preface totals per speaker, highest first.
    pub fn preface_totals(&self) -> Result<Vec<PhraseTotal>> {
        self.totals(
            "SELECT s.name, p.preface, SUM(c.count) AS total
             FROM preface_counts c
             JOIN speakers s ON s.id = c.speaker_id
             JOIN prefaces p ON p.id = c.preface_id
             GROUP BY s.name, p.preface
             ORDER BY total DESC, s.name, p.preface",
        )
    }

    fn totals(&self, sql: &str) -> Result<Vec<PhraseTotal>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let totals = stmt
            .query_map([], |row| {
                Ok(PhraseTotal {
                    speaker: row.get(0)?,
                    entry: row.get(1)?,
                    count: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(totals)
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

    fn counts(entries: &[(&str, &str, u64)]) -> PhraseCounts {
        entries
            .iter()
            .map(|(s, p, c)| ((s.to_string(), p.to_string()), *c))
            .collect()
    }

    #[test]
    fn test_register_dictionary_is_stable() {
        let dir = tempdir().unwrap();
        let repo = PhraseRepository::new(&dir.path().join("phrase-analysis.db")).unwrap();

        let first = repo
            .register_dictionary(&["Bucket list".to_string()], &["look".to_string()])
            .unwrap();
        let second = repo
            .register_dictionary(
                &["you know".to_string(), "bucket list".to_string()],
                &["look".to_string()],
            )
            .unwrap();

        assert_eq!(first.phrase_id("bucket list"), second.phrase_id("bucket list"));
        assert_eq!(second.sizes(), (2, 1));

        let registered = repo.registered().unwrap();
        assert_eq!(registered.phrases, vec!["bucket list", "you know"]);
        assert_eq!(registered.prefaces, vec!["look"]);
    }

    #[test]
    fn test_add_counts_once_per_document() {
        let dir = tempdir().unwrap();
        let repo = PhraseRepository::new(&dir.path().join("phrase-analysis.db")).unwrap();
        let dict = repo
            .register_dictionary(
                &["absolutely".to_string(), "you know".to_string()],
                &["look".to_string()],
            )
            .unwrap();

        let phrases = counts(&[
            ("ALICE", "absolutely", 2),
            ("BOB", "you know", 1),
            ("BOB", "not configured", 4),
        ]);
        let prefaces = counts(&[("ALICE", "look", 1)]);

        assert!(repo.add_counts(&document(1), &dict, &phrases, &prefaces).unwrap());
        assert!(!repo.add_counts(&document(1), &dict, &phrases, &prefaces).unwrap());
        assert!(repo.add_counts(&document(2), &dict, &phrases, &PhraseCounts::new()).unwrap());

        let totals = repo.phrase_totals().unwrap();
        assert_eq!(
            totals,
            vec![
                PhraseTotal {
                    speaker: "ALICE".to_string(),
                    entry: "absolutely".to_string(),
                    count: 4
                },
                PhraseTotal {
                    speaker: "BOB".to_string(),
                    entry: "you know".to_string(),
                    count: 2
                },
            ]
        );
        assert_eq!(repo.preface_totals().unwrap()[0].count, 1);
        assert_eq!(repo.file_count().unwrap(), 2);
    }

    #[test]
    fn test_refetched_document_replaces_counts() {
        let dir = tempdir().unwrap();
        let repo = PhraseRepository::new(&dir.path().join("phrase-analysis.db")).unwrap();
        let dict = repo
            .register_dictionary(&["you know".to_string()], &["look".to_string()])
            .unwrap();

        let first = document(1);
        assert!(repo
            .add_counts(
                &first,
                &dict,
                &counts(&[("ALICE", "you know", 3)]),
                &counts(&[("ALICE", "look", 1)]),
            )
            .unwrap());

        let mut refetched = first.clone();
        refetched.fetch_timestamp = first.fetch_timestamp.map(|t| t + Duration::days(1));
        let phrases = counts(&[("BOB", "you know", 1)]);
        assert!(repo
            .add_counts(&refetched, &dict, &phrases, &PhraseCounts::new())
            .unwrap());
        assert!(!repo
            .add_counts(&refetched, &dict, &phrases, &PhraseCounts::new())
            .unwrap());
        // a stale redelivery of the first fetch changes nothing
        assert!(!repo
            .add_counts(&first, &dict, &phrases, &PhraseCounts::new())
            .unwrap());

        assert_eq!(
            repo.phrase_totals().unwrap(),
            vec![PhraseTotal {
                speaker: "BOB".to_string(),
                entry: "you know".to_string(),
                count: 1
            }]
        );
        assert!(repo.preface_totals().unwrap().is_empty());
        assert_eq!(repo.file_count().unwrap(), 1);
    }
}
