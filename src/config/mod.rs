//! Application configuration management

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::services::fuzzy::MatchThresholds;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path
    pub database_path: String,

    /// Root of the canonical music library
    pub library_path: PathBuf,

    /// Staging directory downloads are saved under
    pub downloads_path: PathBuf,

    /// Indexer search URL prefix; the encoded query is appended directly
    pub indexer_base_url: Option<String>,

    /// URL suffix for the primary search pass
    pub indexer_parameters: String,

    /// URL suffix for the retry search pass
    pub indexer_retry_parameters: String,

    /// qBittorrent Web UI URL
    pub qbittorrent_url: String,

    pub qbittorrent_user: String,

    pub qbittorrent_password: String,

    /// Maximum simultaneously active transfers before the acquisition loop pauses
    pub torrent_max_concurrent: usize,

    /// Interval between acquisition cycles
    pub acquisition_interval: Duration,

    /// Interval between completion polls
    pub poll_interval: Duration,

    /// Fuzzy match acceptance thresholds
    pub thresholds: MatchThresholds,

    /// MusicBrainz web service root
    pub musicbrainz_base_url: String,

    /// User-Agent sent to MusicBrainz (required by their API policy)
    pub musicbrainz_user_agent: String,
}

/// Read an environment variable and parse it, falling back to a default
/// when unset. A set but unparseable value is an error.
fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: '{}'", key, raw)),
        _ => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = MatchThresholds::default();
        let thresholds = MatchThresholds {
            combined: parse_var("MATCH_COMBINED_THRESHOLD", defaults.combined)?,
            album: parse_var("MATCH_ALBUM_THRESHOLD", defaults.album)?,
            artist: parse_var("MATCH_ARTIST_THRESHOLD", defaults.artist)?,
            track_number_bonus: parse_var("MATCH_TRACK_NUMBER_BONUS", defaults.track_number_bonus)?,
            artist_weight: parse_var("MATCH_ARTIST_WEIGHT", defaults.artist_weight)?,
        };

        if !(0.0..=1.0).contains(&thresholds.artist_weight) {
            anyhow::bail!(
                "MATCH_ARTIST_WEIGHT must be between 0 and 1, got {}",
                thresholds.artist_weight
            );
        }

        let acquisition_interval = parse_var("ACQUISITION_INTERVAL_SECS", 300u64)?;
        let poll_interval = parse_var("POLL_INTERVAL_SECS", 120u64)?;
        if acquisition_interval == 0 || poll_interval == 0 {
            anyhow::bail!("ACQUISITION_INTERVAL_SECS and POLL_INTERVAL_SECS must be positive");
        }

        Ok(Self {
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "./data/harvester.db".to_string()),

            library_path: PathBuf::from(
                env::var("LIBRARY_PATH").unwrap_or_else(|_| "./data/music".to_string()),
            ),

            downloads_path: PathBuf::from(
                env::var("DOWNLOADS_PATH").unwrap_or_else(|_| "./data/downloads".to_string()),
            ),

            indexer_base_url: env::var("INDEXER_BASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),

            indexer_parameters: env::var("INDEXER_PARAMETERS").unwrap_or_default(),

            indexer_retry_parameters: env::var("INDEXER_RETRY_PARAMETERS").unwrap_or_default(),

            qbittorrent_url: env::var("QBITTORRENT_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),

            qbittorrent_user: env::var("QBITTORRENT_USER").unwrap_or_else(|_| "admin".to_string()),

            qbittorrent_password: env::var("QBITTORRENT_PASSWORD").unwrap_or_default(),

            torrent_max_concurrent: parse_var("TORRENT_MAX_CONCURRENT", 5)?,

            acquisition_interval: Duration::from_secs(acquisition_interval),

            poll_interval: Duration::from_secs(poll_interval),

            thresholds,

            musicbrainz_base_url: env::var("MUSICBRAINZ_BASE_URL")
                .unwrap_or_else(|_| "https://musicbrainz.org/ws/2".to_string()),

            musicbrainz_user_agent: env::var("MUSICBRAINZ_USER_AGENT").unwrap_or_else(|_| {
                format!("harvester/{}", env!("CARGO_PKG_VERSION"))
            }),
        })
    }

    /// SQLite connection URL for the configured database path
    pub fn database_url(&self) -> String {
        if self.database_path.starts_with("sqlite:") {
            self.database_path.clone()
        } else {
            format!("sqlite://{}?mode=rwc", self.database_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_default_when_unset() {
        let value: u64 = parse_var("HARVESTER_TEST_SURELY_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_database_url() {
        let mut config = Config::from_env().unwrap();
        config.database_path = "./data/test.db".to_string();
        assert_eq!(config.database_url(), "sqlite://./data/test.db?mode=rwc");

        config.database_path = "sqlite::memory:".to_string();
        assert_eq!(config.database_url(), "sqlite::memory:");
    }
}
