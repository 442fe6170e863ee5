//! MusicBrainz-backed catalog
//!
//! Base URL: https://musicbrainz.org/ws/2
//!
//! Rate limiting: MusicBrainz requires at least 1 second between requests.
//! A User-Agent header identifying the application is mandatory.
//!
//! Release lookups are cached nowhere: the track list is fetched fresh for
//! every reconciliation, and persisted to the local database only once the
//! release's files are in the library.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::catalog::{Catalog, CatalogRelease, CatalogTrack};
use super::rate_limiter::{RateLimitedClient, ResponseExt, RetryConfig, retry_async};
use crate::db::{Database, QueueRelease, RecordingRecord, ReleaseRecord};

const COVER_ART_ARCHIVE_URL: &str = "https://coverartarchive.org";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicBrainzArtistRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicBrainzArtistCredit {
    pub name: Option<String>,
    #[serde(default)]
    pub joinphrase: String,
    pub artist: MusicBrainzArtistRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicBrainzRecording {
    pub id: Uuid,
    pub title: String,
}

/// Track position on a medium
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicBrainzTrack {
    pub id: Uuid,
    pub position: Option<i32>,
    pub title: String,
    pub recording: MusicBrainzRecording,
}

/// Medium (disc) in a release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicBrainzMedium {
    pub position: Option<i32>,
    #[serde(default)]
    pub tracks: Vec<MusicBrainzTrack>,
}

/// Release lookup with `inc=recordings+artist-credits`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicBrainzRelease {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<MusicBrainzArtistCredit>,
    #[serde(default)]
    pub media: Vec<MusicBrainzMedium>,
}

impl MusicBrainzRelease {
    /// Credited artist string, e.g. "Simon & Garfunkel"
    pub fn artist_names(&self) -> String {
        self.artist_credit
            .iter()
            .map(|credit| {
                format!(
                    "{}{}",
                    credit.name.as_deref().unwrap_or(&credit.artist.name),
                    credit.joinphrase
                )
            })
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Flatten into a catalog release. Positions run 1..n across all media,
    /// discs in medium order and tracks in track order.
    pub fn into_catalog_release(self) -> CatalogRelease {
        let artist = self.artist_names();
        let cover_url = Some(format!("{}/release/{}/front", COVER_ART_ARCHIVE_URL, self.id));

        let mut media = self.media;
        media.sort_by_key(|m| m.position.unwrap_or(i32::MAX));

        let mut tracks = Vec::new();
        for mut medium in media {
            medium.tracks.sort_by_key(|t| t.position.unwrap_or(i32::MAX));
            for track in medium.tracks {
                tracks.push(CatalogTrack {
                    recording_id: track.recording.id,
                    title: track.title,
                    position: tracks.len() as u32 + 1,
                    artist: artist.clone(),
                    album: self.title.clone(),
                    cover_url: cover_url.clone(),
                });
            }
        }

        CatalogRelease {
            id: self.id,
            title: self.title,
            artist,
            cover_url,
            tracks,
        }
    }
}

/// What happened when a release was queued for download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    Queued,
    AlreadyQueued,
    AlreadyInLibrary,
}

/// MusicBrainz API client with rate limiting, also acting as the catalog
pub struct MusicBrainzCatalog {
    client: Arc<RateLimitedClient>,
    db: Database,
    base_url: String,
    user_agent: String,
    retry_config: RetryConfig,
}

impl MusicBrainzCatalog {
    pub fn new(db: Database, base_url: &str, user_agent: &str) -> Result<Self> {
        Ok(Self {
            client: Arc::new(RateLimitedClient::for_musicbrainz()?),
            db,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            retry_config: RetryConfig {
                max_retries: 3,
                initial_interval: Duration::from_millis(1500),
                max_interval: Duration::from_secs(10),
                multiplier: 2.0,
            },
        })
    }

    /// Look up a release with its recordings
    pub async fn get_release(&self, release_id: Uuid) -> Result<CatalogRelease> {
        debug!(release_id = %release_id, "Fetching release from MusicBrainz");

        let url = format!(
            "{}/release/{}?inc=recordings+artist-credits&fmt=json",
            self.base_url, release_id
        );
        let client = self.client.clone();
        let user_agent = self.user_agent.clone();

        let release = retry_async(
            || {
                let url = url.clone();
                let client = client.clone();
                let ua = user_agent.clone();
                async move {
                    let response = client
                        .get_with_headers(&url, &[("User-Agent", ua.as_str()), ("Accept", "application/json")])
                        .await?;

                    if response.is_transient_error() {
                        anyhow::bail!("MusicBrainz temporarily unavailable ({})", response.status());
                    }

                    if !response.status().is_success() {
                        anyhow::bail!(
                            "MusicBrainz release lookup failed with status: {}",
                            response.status()
                        );
                    }

                    response
                        .json::<MusicBrainzRelease>()
                        .await
                        .context("Failed to parse MusicBrainz release")
                }
            },
            &self.retry_config,
            "musicbrainz_get_release",
        )
        .await?;

        Ok(release.into_catalog_release())
    }

    /// Queue a release for acquisition unless it is already queued or
    /// already has recordings in the library
    pub async fn queue_release(&self, release_id: Uuid) -> Result<QueueOutcome> {
        if self.db.recordings().has_recordings(release_id).await? {
            return Ok(QueueOutcome::AlreadyInLibrary);
        }
        if self.db.queue().exists(release_id).await? {
            return Ok(QueueOutcome::AlreadyQueued);
        }

        let release = self.get_release(release_id).await?;
        let inserted = self
            .db
            .queue()
            .enqueue(QueueRelease {
                release_id,
                title: release.title.clone(),
                artist: release.artist.clone(),
            })
            .await?;

        if !inserted {
            return Ok(QueueOutcome::AlreadyQueued);
        }

        info!(
            release_id = %release_id,
            title = %release.title,
            artist = %release.artist,
            "Release queued for acquisition"
        );
        Ok(QueueOutcome::Queued)
    }
}

#[async_trait]
impl Catalog for MusicBrainzCatalog {
    async fn release_tracks(&self, release_id: Uuid) -> Result<Vec<CatalogTrack>> {
        Ok(self.get_release(release_id).await?.tracks)
    }

    async fn persist_release_metadata(&self, release_id: Uuid) -> Result<()> {
        let release = self.get_release(release_id).await?;

        let record = ReleaseRecord {
            id: release.id,
            title: release.title.clone(),
            artist: release.artist.clone(),
            cover_url: release.cover_url.clone(),
        };
        let recordings: Vec<RecordingRecord> = release
            .tracks
            .iter()
            .map(|track| RecordingRecord {
                id: track.recording_id,
                release_id: release.id,
                title: track.title.clone(),
                position: track.position as i64,
                artist: track.artist.clone(),
                album: track.album.clone(),
                cover_url: track.cover_url.clone(),
            })
            .collect();

        self.db.recordings().save_release(&record, &recordings).await?;

        info!(
            release_id = %release_id,
            recordings = recordings.len(),
            "Release metadata saved"
        );
        Ok(())
    }
}
