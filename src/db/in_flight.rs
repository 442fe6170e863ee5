//! In-flight acquisition database operations
//!
//! One row per release that has been submitted to the torrent client and is
//! waiting to finish downloading.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::sqlite_helpers::{decode_err, now_iso8601, str_to_datetime, str_to_uuid, uuid_to_str};

#[derive(Debug, Clone, PartialEq)]
pub struct InFlightRecord {
    pub release_id: Uuid,
    /// Name or hash the torrent client knows the transfer by
    pub source_name: String,
    pub submitted_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for InFlightRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let release_id: String = row.try_get("release_id")?;
        let submitted_at: String = row.try_get("submitted_at")?;

        Ok(Self {
            release_id: str_to_uuid(&release_id).map_err(decode_err)?,
            source_name: row.try_get("source_name")?,
            submitted_at: str_to_datetime(&submitted_at).map_err(decode_err)?,
        })
    }
}

pub struct InFlightRepository {
    pool: SqlitePool,
}

impl InFlightRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a submitted transfer. Returns `false` if the release already
    /// had one, in which case the existing row is kept.
    pub async fn create(&self, release_id: Uuid, source_name: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO in_flight_acquisitions (release_id, source_name, submitted_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(uuid_to_str(release_id))
        .bind(source_name)
        .bind(now_iso8601())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list(&self) -> Result<Vec<InFlightRecord>> {
        let records = sqlx::query_as::<_, InFlightRecord>(
            "SELECT * FROM in_flight_acquisitions ORDER BY submitted_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn get(&self, release_id: Uuid) -> Result<Option<InFlightRecord>> {
        let record = sqlx::query_as::<_, InFlightRecord>(
            "SELECT * FROM in_flight_acquisitions WHERE release_id = ?1",
        )
        .bind(uuid_to_str(release_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn remove(&self, release_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM in_flight_acquisitions WHERE release_id = ?1")
            .bind(uuid_to_str(release_id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
