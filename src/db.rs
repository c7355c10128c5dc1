//! SQLite persistence for chunk records.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

/// A persisted chunk record for one track
#[derive(Debug, Clone, PartialEq)]
pub struct DbTrackChunk {
    pub id: String,
    /// Track this chunk belongs to
    pub track_id: String,
    pub chunk_index: i32,
    /// Public storage address of the chunk bytes
    pub url: String,
    /// Playback time of this chunk in seconds
    pub duration_secs: f64,
    pub size_bytes: i64,
    /// SHA-256 of the chunk bytes, lowercase hex
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl DbTrackChunk {
    pub fn new(
        track_id: &str,
        chunk_index: i32,
        url: &str,
        duration_secs: f64,
        size_bytes: i64,
        checksum: &str,
    ) -> Self {
        DbTrackChunk {
            id: Uuid::new_v4().to_string(),
            track_id: track_id.to_string(),
            chunk_index,
            url: url.to_string(),
            duration_secs,
            size_bytes,
            checksum: checksum.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Initialize database connection and create tables
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        // Use sqlite:// with ?mode=rwc to create if it doesn't exist
        let database_url = format!("sqlite://{}?mode=rwc", database_path);
        info!("Connecting to {}", database_url);
        let pool = SqlitePool::connect(&database_url).await?;

        let db = Database { pool };
        db.create_tables().await?;
        Ok(db)
    }

    async fn create_tables(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS track_chunks (
                id TEXT PRIMARY KEY,
                track_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                url TEXT NOT NULL,
                duration_secs REAL NOT NULL,
                size_bytes INTEGER NOT NULL,
                checksum TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (track_id, chunk_index)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_track_chunks_track_id ON track_chunks (track_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a track's chunk records as one ordered batch.
    ///
    /// Rows are written in slice order inside a transaction; any failure
    /// rolls the whole batch back.
    pub async fn insert_chunk_batch(&self, chunks: &[DbTrackChunk]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO track_chunks (
                    id, track_id, chunk_index, url,
                    duration_secs, size_bytes, checksum, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.track_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.url)
            .bind(chunk.duration_secs)
            .bind(chunk.size_bytes)
            .bind(&chunk.checksum)
            .bind(chunk.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get all chunk records for a track in playback order
    pub async fn chunks_for_track(&self, track_id: &str) -> Result<Vec<DbTrackChunk>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM track_chunks
            WHERE track_id = ?
            ORDER BY chunk_index
            "#,
        )
        .bind(track_id)
        .fetch_all(&self.pool)
        .await?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(DbTrackChunk {
                id: row.get("id"),
                track_id: row.get("track_id"),
                chunk_index: row.get("chunk_index"),
                url: row.get("url"),
                duration_secs: row.get("duration_secs"),
                size_bytes: row.get("size_bytes"),
                checksum: row.get("checksum"),
                created_at: row.get("created_at"),
            });
        }
        Ok(chunks)
    }
}
