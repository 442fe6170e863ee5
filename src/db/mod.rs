//! Database connection and repositories

pub mod failed;
pub mod in_flight;
pub mod queue;
pub mod recordings;
pub mod schema;
pub mod sqlite_helpers;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

pub use failed::{FailedAcquisitionRecord, FailedAcquisitionRepository};
pub use in_flight::{InFlightRecord, InFlightRepository};
pub use queue::{QueueRelease, QueueRepository, QueuedReleaseRecord};
pub use recordings::{RecordingRecord, RecordingRepository, ReleaseRecord};

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the maximum connection pool size from environment or default
    fn get_max_connections() -> u32 {
        std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5)
    }

    /// Open the database, creating the file and schema if needed
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(Self::get_max_connections())
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect(url)
            .await
            .with_context(|| format!("Failed to open database at {}", url))?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Private in-memory database, used by tests
    pub async fn in_memory() -> Result<Self> {
        // one connection, otherwise every connection sees its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Create any missing tables
    pub async fn ensure_schema(&self) -> Result<()> {
        schema::ensure_schema(&self.pool)
            .await
            .context("Failed to create database schema")
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the queued releases repository
    pub fn queue(&self) -> QueueRepository {
        QueueRepository::new(self.pool.clone())
    }

    /// Get the in-flight acquisitions repository
    pub fn in_flight(&self) -> InFlightRepository {
        InFlightRepository::new(self.pool.clone())
    }

    /// Get the failed acquisitions repository
    pub fn failed(&self) -> FailedAcquisitionRepository {
        FailedAcquisitionRepository::new(self.pool.clone())
    }

    /// Get the release/recording metadata repository
    pub fn recordings(&self) -> RecordingRepository {
        RecordingRepository::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn queue_input(title: &str) -> QueueRelease {
        QueueRelease {
            release_id: Uuid::new_v4(),
            title: title.to_string(),
            artist: "Artist".to_string(),
        }
    }

    #[tokio::test]
    async fn test_ensure_schema_is_repeatable() {
        let db = Database::in_memory().await.unwrap();
        tokio_test::assert_ok!(db.ensure_schema().await);
        tokio_test::assert_ok!(db.ensure_schema().await);
    }

    #[tokio::test]
    async fn test_enqueue_is_unique_per_release() {
        let db = Database::in_memory().await.unwrap();
        let input = queue_input("Album");

        assert!(db.queue().enqueue(input.clone()).await.unwrap());
        assert!(!db.queue().enqueue(input.clone()).await.unwrap());
        assert_eq!(db.queue().list().await.unwrap().len(), 1);

        assert!(db.queue().remove(input.release_id).await.unwrap());
        assert!(!db.queue().remove(input.release_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_excludes_in_flight_and_failed() {
        let db = Database::in_memory().await.unwrap();
        let waiting = queue_input("Waiting");
        let submitted = queue_input("Submitted");
        let exhausted = queue_input("Exhausted");
        for input in [&waiting, &submitted, &exhausted] {
            db.queue().enqueue(input.clone()).await.unwrap();
        }

        db.in_flight()
            .create(submitted.release_id, "Submitted torrent")
            .await
            .unwrap();
        db.failed()
            .record(exhausted.release_id, &exhausted.title, &exhausted.artist)
            .await
            .unwrap();

        let pending = db.queue().list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].release_id, waiting.release_id);

        assert!(db.failed().reset(exhausted.release_id).await.unwrap());
        assert_eq!(db.queue().list_pending().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_in_flight_keeps_first_submission() {
        let db = Database::in_memory().await.unwrap();
        let id = Uuid::new_v4();

        assert!(db.in_flight().create(id, "first").await.unwrap());
        assert!(!db.in_flight().create(id, "second").await.unwrap());

        let record = db.in_flight().get(id).await.unwrap().unwrap();
        assert_eq!(record.source_name, "first");
    }

    #[tokio::test]
    async fn test_save_release_replaces_tracks() {
        let db = Database::in_memory().await.unwrap();
        let release = ReleaseRecord {
            id: Uuid::new_v4(),
            title: "Album".to_string(),
            artist: "Artist".to_string(),
            cover_url: None,
        };
        let track = |position: i64, title: &str| RecordingRecord {
            id: Uuid::new_v4(),
            release_id: release.id,
            title: title.to_string(),
            position,
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            cover_url: None,
        };

        db.recordings()
            .save_release(&release, &[track(2, "Two"), track(1, "One")])
            .await
            .unwrap();
        let stored = db.recordings().list_by_release(release.id).await.unwrap();
        assert_eq!(
            stored.iter().map(|r| r.title.as_str()).collect::<Vec<_>>(),
            vec!["One", "Two"]
        );

        db.recordings()
            .save_release(&release, &[track(1, "Only")])
            .await
            .unwrap();
        assert_eq!(db.recordings().list_by_release(release.id).await.unwrap().len(), 1);
        assert!(db.recordings().has_recordings(release.id).await.unwrap());
        assert!(!db.recordings().has_recordings(Uuid::new_v4()).await.unwrap());
    }
}
