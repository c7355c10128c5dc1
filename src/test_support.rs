// Test support utilities for both unit and integration tests

use crate::storage::{FileStorage, StorageError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

type DelayFn = Box<dyn Fn(&str) -> Duration + Send + Sync>;

/// Mock chunk storage for testing
///
/// Stores uploads in memory instead of a real backend. Optional per-name
/// delays let tests force uploads to complete out of dispatch order, and an
/// injected failure makes matching uploads fail.
pub struct MockFileStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    delay_fn: Option<DelayFn>,
    fail_on: Option<String>,
}

impl Default for MockFileStorage {
    fn default() -> Self {
        MockFileStorage {
            objects: Mutex::new(HashMap::new()),
            delay_fn: None,
            fail_on: None,
        }
    }
}

impl MockFileStorage {
    /// Create a new mock storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay each upload by whatever the closure returns for its name.
    pub fn with_delays(delay_fn: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        MockFileStorage {
            delay_fn: Some(Box::new(delay_fn)),
            ..Self::default()
        }
    }

    /// Fail every upload whose name contains the fragment.
    pub fn failing_on(fragment: &str) -> Self {
        MockFileStorage {
            fail_on: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    /// Bytes stored under an address, if any.
    pub fn object(&self, address: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(address).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl FileStorage for MockFileStorage {
    async fn upload(
        &self,
        name: &str,
        _content_type: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        if let Some(delay_fn) = &self.delay_fn {
            tokio::time::sleep(delay_fn(name)).await;
        }

        if let Some(fragment) = &self.fail_on {
            if name.contains(fragment.as_str()) {
                return Err(StorageError::SdkError(format!(
                    "injected failure for {}",
                    name
                )));
            }
        }

        let address = format!("mock://uploads/{}", name);
        self.objects
            .lock()
            .unwrap()
            .insert(address.clone(), data.to_vec());

        Ok(address)
    }

    async fn delete(&self, address: &str) -> Result<(), StorageError> {
        self.objects.lock().unwrap().remove(address);
        Ok(())
    }
}

/// Frame length of the fixture frames built by `mpeg1_track`.
pub const MPEG1_FRAME_BYTES: usize = 417;

/// Playback seconds per fixture frame (1152 samples at 44.1 kHz).
pub const MPEG1_FRAME_SECONDS: f64 = 1152.0 / 44100.0;

/// Build a valid MPEG-1 Layer III buffer (128 kbps, 44.1 kHz) of
/// `frame_count` back-to-back frames with deterministic payload bytes.
pub fn mpeg1_track(frame_count: usize) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(frame_count * MPEG1_FRAME_BYTES);
    for k in 0..frame_count {
        let mut frame = vec![(k % 251) as u8; MPEG1_FRAME_BYTES];
        frame[0] = 0xFF;
        frame[1] = 0xFB;
        frame[2] = 0x90;
        frame[3] = 0x00;
        buffer.extend(frame);
    }
    buffer
}
