//! Release and recording metadata persisted once a release is in the library

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::sqlite_helpers::{decode_err, now_iso8601, str_to_uuid, uuid_to_str};

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRecord {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub cover_url: Option<String>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for ReleaseRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let id: String = row.try_get("id")?;
        Ok(Self {
            id: str_to_uuid(&id).map_err(decode_err)?,
            title: row.try_get("title")?,
            artist: row.try_get("artist")?,
            cover_url: row.try_get("cover_url")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingRecord {
    pub id: Uuid,
    pub release_id: Uuid,
    pub title: String,
    /// 1-based position across all media of the release
    pub position: i64,
    pub artist: String,
    pub album: String,
    pub cover_url: Option<String>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for RecordingRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let id: String = row.try_get("id")?;
        let release_id: String = row.try_get("release_id")?;
        Ok(Self {
            id: str_to_uuid(&id).map_err(decode_err)?,
            release_id: str_to_uuid(&release_id).map_err(decode_err)?,
            title: row.try_get("title")?,
            position: row.try_get("position")?,
            artist: row.try_get("artist")?,
            album: row.try_get("album")?,
            cover_url: row.try_get("cover_url")?,
        })
    }
}

pub struct RecordingRepository {
    pool: SqlitePool,
}

impl RecordingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a release and its full track list in one transaction.
    /// Recordings no longer on the release are dropped.
    pub async fn save_release(
        &self,
        release: &ReleaseRecord,
        recordings: &[RecordingRecord],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let release_id = uuid_to_str(release.id);

        sqlx::query(
            r#"
            INSERT INTO releases (id, title, artist, cover_url, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                cover_url = excluded.cover_url,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&release_id)
        .bind(&release.title)
        .bind(&release.artist)
        .bind(&release.cover_url)
        .bind(now_iso8601())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM recordings WHERE release_id = ?1")
            .bind(&release_id)
            .execute(&mut *tx)
            .await?;

        for recording in recordings {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO recordings (id, release_id, title, position, artist, album, cover_url)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(uuid_to_str(recording.id))
            .bind(&release_id)
            .bind(&recording.title)
            .bind(recording.position)
            .bind(&recording.artist)
            .bind(&recording.album)
            .bind(&recording.cover_url)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_release(&self, id: Uuid) -> Result<Option<ReleaseRecord>> {
        let record = sqlx::query_as::<_, ReleaseRecord>("SELECT * FROM releases WHERE id = ?1")
            .bind(uuid_to_str(id))
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Recordings of a release in position order
    pub async fn list_by_release(&self, release_id: Uuid) -> Result<Vec<RecordingRecord>> {
        let records = sqlx::query_as::<_, RecordingRecord>(
            "SELECT * FROM recordings WHERE release_id = ?1 ORDER BY position ASC",
        )
        .bind(uuid_to_str(release_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn get_recording(&self, id: Uuid) -> Result<Option<RecordingRecord>> {
        let record = sqlx::query_as::<_, RecordingRecord>("SELECT * FROM recordings WHERE id = ?1")
            .bind(uuid_to_str(id))
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Whether a release already has its recordings stored locally
    pub async fn has_recordings(&self, release_id: Uuid) -> Result<bool> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM recordings WHERE release_id = ?1")
                .bind(uuid_to_str(release_id))
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }
}
