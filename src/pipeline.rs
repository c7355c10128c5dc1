//! Segmentation and upload coordination.
//!
//! `ChunkPipeline` turns a complete MP3 buffer into uploaded, frame-aligned
//! chunks: scan frames, validate the playback duration, plan chunk spans,
//! upload every span concurrently, and hand back the results in strict
//! chunk-index order.

use futures::stream::{FuturesUnordered, StreamExt};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::DEFAULT_CHUNK_SECONDS;
use crate::mp3::{self, Mp3Error};
use crate::segmenter::{self, ChunkSpan};
use crate::storage::{StorageError, StorageManager};

/// Content type attached to every uploaded chunk.
const CHUNK_CONTENT_TYPE: &str = "audio/mpeg";

#[derive(Error, Debug)]
pub enum ProcessError {
    /// The caller handed us something we cannot even start on.
    #[error("invalid audio upload: {0}")]
    InvalidInput(&'static str),
    /// The buffer is not playable MPEG audio.
    #[error("unrecognized audio format: {0}")]
    InvalidFormat(#[from] Mp3Error),
    /// Upload or persistence failed; the cause is in the logs.
    #[error("audio processing failed")]
    Processing,
}

/// Configuration for chunk planning
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Target playback seconds per chunk (default: 10 s)
    pub chunk_seconds: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            chunk_seconds: DEFAULT_CHUNK_SECONDS,
        }
    }
}

/// One uploaded chunk, reported back to the caller.
#[derive(Debug, Clone)]
pub struct ProcessedChunk {
    /// Position of the chunk within the track, starting at 0.
    pub index: u32,
    /// Public storage address of the chunk bytes.
    pub url: String,
    /// Exact playback time of the chunk's frames in seconds.
    pub duration_secs: f64,
    pub size_bytes: usize,
    /// SHA-256 of the chunk bytes, lowercase hex.
    pub checksum: String,
}

/// Result of processing one track.
#[derive(Debug)]
pub struct ProcessedTrack {
    /// Track playback time rounded down to whole seconds.
    pub duration_secs: u64,
    /// Uploaded chunks in ascending index order.
    pub chunks: Vec<ProcessedChunk>,
}

/// Coordinates scanning, planning, and concurrent chunk uploads.
#[derive(Debug, Clone)]
pub struct ChunkPipeline {
    storage: StorageManager,
    config: PipelineConfig,
}

impl ChunkPipeline {
    /// Create a pipeline with the default chunk target
    pub fn new(storage: StorageManager) -> Self {
        Self::with_config(storage, PipelineConfig::default())
    }

    pub fn with_config(storage: StorageManager, config: PipelineConfig) -> Self {
        ChunkPipeline { storage, config }
    }

    /// Segment a complete MP3 buffer and upload every chunk.
    ///
    /// All chunk uploads run concurrently; completions arrive in any order
    /// and are sorted back into index order before returning. If any single
    /// upload fails the whole call fails and the remaining uploads are
    /// dropped. Already-stored chunks are left for the storage backend to
    /// reap; no partial result is ever returned.
    pub async fn process(
        &self,
        track_id: &str,
        buffer: &[u8],
    ) -> Result<ProcessedTrack, ProcessError> {
        if buffer.is_empty() {
            return Err(ProcessError::InvalidInput("empty audio buffer"));
        }
        if !(self.config.chunk_seconds > 0.0) {
            return Err(ProcessError::InvalidInput(
                "target chunk seconds must be positive",
            ));
        }
        if !mp3::looks_like_mp3(buffer) {
            return Err(ProcessError::InvalidFormat(Mp3Error::UnrecognizedHeader));
        }

        let scan = mp3::scan_frames(buffer);
        let total_duration = scan.total_duration()?;
        let spans = segmenter::plan_chunks(&scan.frames, self.config.chunk_seconds);

        debug!(
            track_id,
            frames = scan.frames.len(),
            chunks = spans.len(),
            total_duration,
            "planned chunk layout"
        );

        let mut uploads = FuturesUnordered::new();
        for span in &spans {
            uploads.push(self.upload_span(track_id, buffer, span));
        }

        let mut chunks: Vec<ProcessedChunk> = Vec::with_capacity(spans.len());
        while let Some(uploaded) = uploads.next().await {
            match uploaded {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => {
                    error!(
                        track_id,
                        error = %e,
                        "chunk upload failed, aborting remaining uploads"
                    );
                    return Err(ProcessError::Processing);
                }
            }
        }

        // Uploads complete out of order; callers get strict index order.
        chunks.sort_by_key(|c| c.index);

        info!(track_id, chunks = chunks.len(), "uploaded all chunks");
        Ok(ProcessedTrack {
            duration_secs: total_duration.floor() as u64,
            chunks,
        })
    }

    /// Playback duration of a complete MP3 buffer in whole seconds.
    pub async fn track_duration(&self, buffer: &[u8]) -> Result<u64, ProcessError> {
        if buffer.is_empty() {
            return Err(ProcessError::InvalidInput("empty audio buffer"));
        }
        if !mp3::looks_like_mp3(buffer) {
            return Err(ProcessError::InvalidFormat(Mp3Error::UnrecognizedHeader));
        }

        Ok(mp3::scan_frames(buffer).whole_seconds()?)
    }

    async fn upload_span(
        &self,
        track_id: &str,
        buffer: &[u8],
        span: &ChunkSpan,
    ) -> Result<ProcessedChunk, StorageError> {
        // Each upload owns a copy of its byte range.
        let data = buffer[span.start..span.end].to_vec();

        let mut hasher = Sha256::new();
        hasher.update(&data);
        let checksum = format!("{:x}", hasher.finalize());

        let name = chunk_object_name(track_id, span.index);
        let url = self
            .storage
            .upload(&name, CHUNK_CONTENT_TYPE, &data)
            .await?;

        Ok(ProcessedChunk {
            index: span.index,
            url,
            duration_secs: span.duration,
            size_bytes: data.len(),
            checksum,
        })
    }
}

/// Object name for one chunk: `{track_id}-{index:05}.mp3`
fn chunk_object_name(track_id: &str, index: u32) -> String {
    format!("{}-{:05}.mp3", track_id, index)
}
