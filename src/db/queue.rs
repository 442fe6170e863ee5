//! Queued release database operations
//!
//! A queued release is a catalog release with no local files that the
//! acquisition loop should try to download.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::sqlite_helpers::{decode_err, now_iso8601, str_to_datetime, str_to_uuid, uuid_to_str};

/// A release waiting to be acquired
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedReleaseRecord {
    pub release_id: Uuid,
    pub title: String,
    pub artist: String,
    pub queued_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for QueuedReleaseRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let release_id: String = row.try_get("release_id")?;
        let queued_at: String = row.try_get("queued_at")?;

        Ok(Self {
            release_id: str_to_uuid(&release_id).map_err(decode_err)?,
            title: row.try_get("title")?,
            artist: row.try_get("artist")?,
            queued_at: str_to_datetime(&queued_at).map_err(decode_err)?,
        })
    }
}

/// Input for queueing a release
#[derive(Debug, Clone)]
pub struct QueueRelease {
    pub release_id: Uuid,
    pub title: String,
    pub artist: String,
}

pub struct QueueRepository {
    pool: SqlitePool,
}

impl QueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Queue a release. Returns `false` if it was already queued.
    pub async fn enqueue(&self, input: QueueRelease) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO queued_releases (release_id, title, artist, queued_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(uuid_to_str(input.release_id))
        .bind(&input.title)
        .bind(&input.artist)
        .bind(now_iso8601())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All queued releases, oldest first
    pub async fn list(&self) -> Result<Vec<QueuedReleaseRecord>> {
        let records = sqlx::query_as::<_, QueuedReleaseRecord>(
            "SELECT * FROM queued_releases ORDER BY queued_at ASC, release_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Queued releases that are neither in flight nor failed, oldest first
    pub async fn list_pending(&self) -> Result<Vec<QueuedReleaseRecord>> {
        let records = sqlx::query_as::<_, QueuedReleaseRecord>(
            r#"
            SELECT q.* FROM queued_releases q
            WHERE NOT EXISTS (SELECT 1 FROM in_flight_acquisitions i WHERE i.release_id = q.release_id)
              AND NOT EXISTS (SELECT 1 FROM failed_acquisitions f WHERE f.release_id = q.release_id)
            ORDER BY q.queued_at ASC, q.release_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn get(&self, release_id: Uuid) -> Result<Option<QueuedReleaseRecord>> {
        let record = sqlx::query_as::<_, QueuedReleaseRecord>(
            "SELECT * FROM queued_releases WHERE release_id = ?1",
        )
        .bind(uuid_to_str(release_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn exists(&self, release_id: Uuid) -> Result<bool> {
        Ok(self.get(release_id).await?.is_some())
    }

    /// Remove a release from the queue. Returns `false` if it was not queued.
    pub async fn remove(&self, release_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM queued_releases WHERE release_id = ?1")
            .bind(uuid_to_str(release_id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
