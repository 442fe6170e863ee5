//! Torrent indexer search
//!
//! An indexer takes a free-text query and returns candidate releases. The
//! acquisition loop runs every query twice at most: once with the primary
//! URL parameters and, if nothing was accepted anywhere, once more with the
//! retry parameters (typically a broader category or sort order).

pub mod html;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use html::HtmlTableIndexer;

/// One search result row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub title: String,
    /// Upload date exactly as the indexer renders it
    pub uploaded: String,
    /// Human readable size, e.g. "312.4 MiB"
    pub size: String,
    pub seeders: u32,
    pub leechers: u32,
    pub uploader: String,
    /// Magnet URI; `None` when the row had no magnet link
    pub magnet: Option<String>,
}

/// Which URL parameter suffix a search uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterSet {
    Primary,
    Retry,
}

impl ParameterSet {
    /// Order in which parameter sets are tried
    pub const ALL: [ParameterSet; 2] = [ParameterSet::Primary, ParameterSet::Retry];
}

impl std::fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterSet::Primary => write!(f, "primary"),
            ParameterSet::Retry => write!(f, "retry"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("indexer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("indexer returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to parse indexer page: {0}")]
    Parse(String),
}

/// A searchable torrent source
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Search for `query` (already sanitized) using the given parameter set.
    /// Results keep the indexer's order.
    async fn search(
        &self,
        query: &str,
        parameters: ParameterSet,
    ) -> Result<Vec<CandidateResult>, SearchError>;
}
