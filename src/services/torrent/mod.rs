//! Torrent client integration
//!
//! The pipeline talks to the download agent only through [`TorrentClient`].
//! It never changes transfer state itself beyond submitting and removing.

pub mod qbittorrent;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use qbittorrent::QBittorrentClient;

/// Lifecycle state reported by the client, reduced to what the pipeline
/// cares about
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    Queued,
    Checking,
    Downloading,
    Stalled,
    Seeding,
    Paused,
    Error,
    Unknown,
}

impl TorrentState {
    /// Whether a transfer in this state counts against the concurrency cap
    pub fn is_active_download(&self) -> bool {
        matches!(
            self,
            TorrentState::Queued
                | TorrentState::Checking
                | TorrentState::Downloading
                | TorrentState::Stalled
        )
    }
}

impl std::fmt::Display for TorrentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TorrentState::Queued => write!(f, "queued"),
            TorrentState::Checking => write!(f, "checking"),
            TorrentState::Downloading => write!(f, "downloading"),
            TorrentState::Stalled => write!(f, "stalled"),
            TorrentState::Seeding => write!(f, "seeding"),
            TorrentState::Paused => write!(f, "paused"),
            TorrentState::Error => write!(f, "error"),
            TorrentState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Snapshot of one transfer as reported by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferState {
    /// Info hash, used as the identifier for removal
    pub id: String,
    pub name: String,
    /// 0.0 to 1.0
    pub progress: f64,
    pub save_path: String,
    pub size: u64,
    pub downloaded: u64,
    pub uploaded: u64,
    pub state: TorrentState,
    /// State label exactly as the client reported it
    pub raw_state: String,
}

impl TransferState {
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }

    /// Still downloading and in a state that holds a download slot
    pub fn is_active(&self) -> bool {
        !self.is_complete() && self.state.is_active_download()
    }

    /// Whether `term` identifies this transfer: hash equality or a name
    /// containing the term, both case-insensitive
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.id.to_lowercase() == term || self.name.to_lowercase().contains(&term)
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("authentication with torrent client failed")]
    Auth,

    #[error("torrent client request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("torrent client returned HTTP {status} for {endpoint}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("unexpected torrent client response: {0}")]
    Decode(String),
}

/// Operations the pipeline needs from a download agent
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Authenticate. Implementations may also do this lazily on first use.
    async fn login(&self) -> Result<(), AdapterError>;

    /// Add a magnet link, optionally saving into `destination`
    async fn submit(&self, magnet: &str, destination: Option<&str>) -> Result<(), AdapterError>;

    /// All transfers that still occupy a download slot
    async fn list_active(&self) -> Result<Vec<TransferState>, AdapterError>;

    /// Look a transfer up by hash or (partial) name
    async fn get_by_name_or_hash(&self, term: &str)
    -> Result<Option<TransferState>, AdapterError>;

    /// Remove a transfer, optionally deleting its files
    async fn remove(&self, id: &str, delete_files: bool) -> Result<(), AdapterError>;

    /// Number of transfers currently occupying a download slot
    async fn active_count(&self) -> Result<usize, AdapterError> {
        Ok(self.list_active().await?.len())
    }
}
