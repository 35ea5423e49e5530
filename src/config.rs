//! Configuration for transcript-miner.
//!
//! Settings are assembled once at startup from built-in defaults, optional
//! TOML files in the data directory, and command-line overrides, in that
//! order. The resulting [`Settings`] value is immutable and passed by
//! reference to every component.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = "./data";

pub const FETCHER_DB: &str = "fetcher.db";
pub const PHRASE_DB: &str = "phrase-analysis.db";
pub const THANK_DB: &str = "thank-analysis.db";

pub const FETCHER_TOML: &str = "fetcher.toml";
pub const PHRASE_TOML: &str = "phrase-analysis.toml";
pub const THANK_TOML: &str = "thank-analysis.toml";

const DEFAULT_PHRASES: &[&str] = &[
    "bucket list",
    "perfect storm",
    "absolutely",
    "definitely",
    "exponentially",
    "you know",
];
const DEFAULT_PREFACES: &[&str] = &["absolutely", "look"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid duration '{0}' (expected e.g. \"15s\", \"500ms\", \"2m\")")]
    InvalidDuration(String),
}

/// Fetch loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherConfig {
    /// Pause between ticks of the fetch loop.
    pub sleep: Duration,
    pub request_timeout: Duration,
    /// Custom user agent; the built-in one is used when unset.
    pub user_agent: Option<String>,
    /// Pending documents tried per tick.
    pub lookahead: usize,
    /// Days the latest cursor stays behind today.
    pub grace_days: i64,
}

/// Upper bound for `grace_days`; keeps the horizon a representable date.
pub const MAX_GRACE_DAYS: i64 = 36_500;

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            sleep: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
            user_agent: None,
            lookahead: 10,
            grace_days: 7,
        }
    }
}

/// Phrase analyzer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseConfig {
    pub phrases: Vec<String>,
    pub prefaces: Vec<String>,
    /// Documents analyzed per `collect`.
    pub collect_count: usize,
    /// Longest phrase, in words.
    pub max_words: usize,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        Self {
            phrases: DEFAULT_PHRASES.iter().map(|s| s.to_string()).collect(),
            prefaces: DEFAULT_PREFACES.iter().map(|s| s.to_string()).collect(),
            collect_count: 500,
            max_words: 5,
        }
    }
}

/// Thank-you analyzer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThankConfig {
    /// Documents analyzed per `collect`.
    pub collect_count: usize,
    /// Words of each response considered.
    pub first_words: usize,
}

impl Default for ThankConfig {
    fn default() -> Self {
        Self {
            collect_count: 50,
            first_words: 20,
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base data directory holding databases, TOML files and payloads.
    pub data_dir: PathBuf,
    pub fetcher: FetcherConfig,
    pub phrases: PhraseConfig,
    pub thanks: ThankConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_data_dir(PathBuf::from(DEFAULT_DATA_DIR))
    }
}

/// Command-line overrides, applied last.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    /// Explicit fetcher TOML file instead of `<dir>/fetcher.toml`.
    pub fetcher_config: Option<PathBuf>,
    pub fetcher_sleep: Option<String>,
    pub phrase_collect_count: Option<usize>,
    pub thank_collect_count: Option<usize>,
}

impl Settings {
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            fetcher: FetcherConfig::default(),
            phrases: PhraseConfig::default(),
            thanks: ThankConfig::default(),
        }
    }

    /// Build settings from defaults, TOML files and overrides.
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        let data_dir = overrides
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let mut settings = Self::with_data_dir(data_dir);

        let fetcher_toml = overrides
            .fetcher_config
            .clone()
            .unwrap_or_else(|| settings.data_dir.join(FETCHER_TOML));
        if let Some(file) = read_toml::<FetcherFile>(&fetcher_toml)? {
            file.apply(&mut settings.fetcher)?;
        }
        if let Some(file) = read_toml::<PhraseFile>(&settings.data_dir.join(PHRASE_TOML))? {
            file.apply(&mut settings.phrases);
        }
        if let Some(file) = read_toml::<ThankFile>(&settings.data_dir.join(THANK_TOML))? {
            file.apply(&mut settings.thanks);
        }

        if let Some(sleep) = &overrides.fetcher_sleep {
            settings.fetcher.sleep = parse_duration(sleep)?;
        }
        if let Some(count) = overrides.phrase_collect_count {
            settings.phrases.collect_count = count;
        }
        if let Some(count) = overrides.thank_collect_count {
            settings.thanks.collect_count = count;
        }

        Ok(settings)
    }

    pub fn fetcher_db_path(&self) -> PathBuf {
        self.data_dir.join(FETCHER_DB)
    }

    pub fn phrase_db_path(&self) -> PathBuf {
        self.data_dir.join(PHRASE_DB)
    }

    pub fn thank_db_path(&self) -> PathBuf {
        self.data_dir.join(THANK_DB)
    }

    /// Create the data directory if needed.
    pub fn ensure_data_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })
    }
}

/// Parse a duration such as `15s`, `500ms`, `2m`, `1h30m` or a bare number
/// of seconds.
pub fn parse_duration(text: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(text.to_string());
    let text = text.trim();
    if text.is_empty() {
        return Err(invalid());
    }
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Some(Duration::from_millis(value)),
            "s" => Some(Duration::from_secs(value)),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "h" => value.checked_mul(3600).map(Duration::from_secs),
            _ => None,
        }
        .ok_or_else(invalid)?;
        total = total.checked_add(part).ok_or_else(invalid)?;
        rest = &rest[unit_len..];
    }
    Ok(total)
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No config at {}, using defaults", path.display());
            return Ok(None);
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str(&text)
        .map(Some)
        .map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
}

/// A duration given either as seconds or as a string like `"15s"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    fn to_duration(&self) -> Result<Duration, ConfigError> {
        match self {
            Self::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            Self::Text(text) => parse_duration(text),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FetcherFile {
    sleep: Option<DurationValue>,
    request_timeout: Option<DurationValue>,
    user_agent: Option<String>,
    lookahead: Option<usize>,
    grace_days: Option<i64>,
}

impl FetcherFile {
    fn apply(self, config: &mut FetcherConfig) -> Result<(), ConfigError> {
        if let Some(sleep) = self.sleep {
            config.sleep = sleep.to_duration()?;
        }
        if let Some(timeout) = self.request_timeout {
            config.request_timeout = timeout.to_duration()?;
        }
        if self.user_agent.is_some() {
            config.user_agent = self.user_agent;
        }
        if let Some(lookahead) = self.lookahead {
            config.lookahead = lookahead.max(1);
        }
        if let Some(days) = self.grace_days {
            config.grace_days = days.clamp(0, MAX_GRACE_DAYS);
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PhraseFile {
    phrases: Option<Vec<String>>,
    prefaces: Option<Vec<String>>,
    collect_count: Option<usize>,
    max_words: Option<usize>,
}

impl PhraseFile {
    fn apply(self, config: &mut PhraseConfig) {
        if let Some(phrases) = self.phrases {
            config.phrases = phrases;
        }
        if let Some(prefaces) = self.prefaces {
            config.prefaces = prefaces;
        }
        if let Some(count) = self.collect_count {
            config.collect_count = count;
        }
        if let Some(max_words) = self.max_words {
            config.max_words = max_words.max(1);
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ThankFile {
    collect_count: Option<usize>,
    first_words: Option<usize>,
}

impl ThankFile {
    fn apply(self, config: &mut ThankConfig) {
        if let Some(count) = self.collect_count {
            config.collect_count = count;
        }
        if let Some(words) = self.first_words {
            config.first_words = words;
        }
    }
}
