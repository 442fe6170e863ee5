//! Catalog collaborator interface
//!
//! The catalog owns canonical release metadata. The pipeline asks it for a
//! release's ordered track list when reconciling files, and tells it to
//! persist full metadata once the files are in the library.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::RecordingRecord;

/// A canonical track of a release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTrack {
    pub recording_id: Uuid,
    pub title: String,
    /// 1-based position across the whole release
    pub position: u32,
    pub artist: String,
    pub album: String,
    pub cover_url: Option<String>,
}

impl From<RecordingRecord> for CatalogTrack {
    fn from(record: RecordingRecord) -> Self {
        Self {
            recording_id: record.id,
            title: record.title,
            position: record.position.max(0) as u32,
            artist: record.artist,
            album: record.album,
            cover_url: record.cover_url,
        }
    }
}

/// A release with its tracks in position order
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRelease {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub cover_url: Option<String>,
    pub tracks: Vec<CatalogTrack>,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Ordered track list of a release
    async fn release_tracks(&self, release_id: Uuid) -> Result<Vec<CatalogTrack>>;

    /// Store full metadata for a release whose files are now in the library
    async fn persist_release_metadata(&self, release_id: Uuid) -> Result<()>;
}
