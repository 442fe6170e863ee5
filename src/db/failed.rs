//! Failed acquisition database operations
//!
//! Releases land here once every query variant and parameter set came up
//! empty. The acquisition loop skips them until an operator resets them.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::sqlite_helpers::{decode_err, now_iso8601, str_to_datetime, str_to_uuid, uuid_to_str};

#[derive(Debug, Clone, PartialEq)]
pub struct FailedAcquisitionRecord {
    pub release_id: Uuid,
    pub title: String,
    pub artist: String,
    pub failed_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for FailedAcquisitionRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let release_id: String = row.try_get("release_id")?;
        let failed_at: String = row.try_get("failed_at")?;

        Ok(Self {
            release_id: str_to_uuid(&release_id).map_err(decode_err)?,
            title: row.try_get("title")?,
            artist: row.try_get("artist")?,
            failed_at: str_to_datetime(&failed_at).map_err(decode_err)?,
        })
    }
}

pub struct FailedAcquisitionRepository {
    pool: SqlitePool,
}

impl FailedAcquisitionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Mark a release as exhausted. Idempotent.
    pub async fn record(&self, release_id: Uuid, title: &str, artist: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO failed_acquisitions (release_id, title, artist, failed_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(uuid_to_str(release_id))
        .bind(title)
        .bind(artist)
        .bind(now_iso8601())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<FailedAcquisitionRecord>> {
        let records = sqlx::query_as::<_, FailedAcquisitionRecord>(
            "SELECT * FROM failed_acquisitions ORDER BY failed_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn exists(&self, release_id: Uuid) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM failed_acquisitions WHERE release_id = ?1")
                .bind(uuid_to_str(release_id))
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    /// Clear a failure so the release is searched again on the next cycle.
    /// Returns `false` if there was nothing to clear.
    pub async fn reset(&self, release_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM failed_acquisitions WHERE release_id = ?1")
            .bind(uuid_to_str(release_id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
