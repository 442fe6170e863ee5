//! Schema creation
//!
//! Tables are created with `CREATE TABLE IF NOT EXISTS` on every start, so
//! opening an existing database is a no-op. Release IDs are primary keys of
//! the pipeline tables, which keeps at most one row per release in each.

use sqlx::SqlitePool;
use tracing::{debug, info};

/// Name and DDL for each table, in creation order
const TABLES: &[(&str, &str)] = &[
    (
        "queued_releases",
        r#"
        CREATE TABLE IF NOT EXISTS queued_releases (
            release_id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            queued_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "in_flight_acquisitions",
        r#"
        CREATE TABLE IF NOT EXISTS in_flight_acquisitions (
            release_id TEXT PRIMARY KEY NOT NULL,
            source_name TEXT NOT NULL,
            submitted_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "failed_acquisitions",
        r#"
        CREATE TABLE IF NOT EXISTS failed_acquisitions (
            release_id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            failed_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "releases",
        r#"
        CREATE TABLE IF NOT EXISTS releases (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            cover_url TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "recordings",
        r#"
        CREATE TABLE IF NOT EXISTS recordings (
            id TEXT PRIMARY KEY NOT NULL,
            release_id TEXT NOT NULL REFERENCES releases(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            position INTEGER NOT NULL,
            artist TEXT NOT NULL,
            album TEXT NOT NULL,
            cover_url TEXT
        )
        "#,
    ),
    (
        "idx_recordings_release",
        "CREATE INDEX IF NOT EXISTS idx_recordings_release ON recordings(release_id, position)",
    ),
];

/// Create any missing tables
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for (name, ddl) in TABLES {
        debug!(table = %name, "Ensuring table exists");
        sqlx::query(ddl.trim()).execute(pool).await?;
    }
    info!(tables = TABLES.len(), "Database schema ready");
    Ok(())
}
