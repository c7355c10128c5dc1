// Library exports for integration tests and embedding hosts

pub mod config;
pub mod db;
pub mod ingest;
pub mod mp3;
pub mod pipeline;
pub mod segmenter;
pub mod storage;

// Test support (only available with test-utils feature)
#[cfg(feature = "test-utils")]
pub mod test_support;
