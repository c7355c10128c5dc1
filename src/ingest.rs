//! Track ingestion: pipeline output persisted as ordered chunk records.

use tracing::{error, info};

use crate::db::{Database, DbTrackChunk};
use crate::pipeline::{ChunkPipeline, ProcessError};

/// Everything stored for one ingested track.
#[derive(Debug)]
pub struct IngestedTrack {
    /// Track playback time rounded down to whole seconds.
    pub duration_secs: u64,
    /// Persisted chunk records in ascending index order.
    pub chunks: Vec<DbTrackChunk>,
}

/// Runs the chunk pipeline and persists its results.
#[derive(Debug, Clone)]
pub struct IngestService {
    pipeline: ChunkPipeline,
    db: Database,
}

impl IngestService {
    pub fn new(pipeline: ChunkPipeline, db: Database) -> Self {
        IngestService { pipeline, db }
    }

    /// Segment, upload, and record a complete MP3 buffer under `track_id`.
    ///
    /// The chunk records are written as one ordered batch after every upload
    /// has succeeded, so a track is either fully recorded or not at all.
    pub async fn ingest(
        &self,
        track_id: &str,
        buffer: &[u8],
    ) -> Result<IngestedTrack, ProcessError> {
        let processed = self.pipeline.process(track_id, buffer).await?;

        let records: Vec<DbTrackChunk> = processed
            .chunks
            .iter()
            .map(|chunk| {
                DbTrackChunk::new(
                    track_id,
                    chunk.index as i32,
                    &chunk.url,
                    chunk.duration_secs,
                    chunk.size_bytes as i64,
                    &chunk.checksum,
                )
            })
            .collect();

        self.db.insert_chunk_batch(&records).await.map_err(|e| {
            error!(track_id, error = %e, "failed to persist chunk records");
            ProcessError::Processing
        })?;

        info!(
            track_id,
            chunks = records.len(),
            duration_secs = processed.duration_secs,
            "track ingested"
        );

        Ok(IngestedTrack {
            duration_secs: processed.duration_secs,
            chunks: records,
        })
    }

    /// Chunk records for a track in playback order.
    pub async fn stored_chunks(&self, track_id: &str) -> Result<Vec<DbTrackChunk>, ProcessError> {
        self.db.chunks_for_track(track_id).await.map_err(|e| {
            error!(track_id, error = %e, "failed to load chunk records");
            ProcessError::Processing
        })
    }
}
