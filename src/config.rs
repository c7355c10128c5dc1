use std::path::PathBuf;
use tracing::{info, warn};

use crate::storage::S3Config;

/// Default playback time per uploaded chunk in seconds.
pub const DEFAULT_CHUNK_SECONDS: f64 = 10.0;

/// Application configuration
/// In debug builds a .env file is loaded first; the process environment
/// always wins.
#[derive(Clone, Debug)]
pub struct Config {
    /// Target playback seconds per uploaded chunk
    pub chunk_seconds: f64,
    /// Whether to use local filesystem storage instead of S3
    pub use_local_storage: bool,
    /// Path for local storage (dev mode)
    pub local_storage_path: Option<PathBuf>,
    /// Public address prefix for locally stored files
    pub base_url: String,
    /// SQLite database file override
    pub database_path: Option<PathBuf>,
    /// S3 settings, present when TONEARM_S3_BUCKET is set
    pub s3: Option<S3Config>,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Self {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                info!("dev mode: loaded .env file");
            }
        }

        Self::from_env()
    }

    fn from_env() -> Self {
        let chunk_seconds = match std::env::var("TONEARM_CHUNK_SECONDS") {
            Ok(raw) => match raw.parse::<f64>() {
                Ok(value) if value > 0.0 && value.is_finite() => value,
                _ => {
                    warn!(
                        value = %raw,
                        "invalid TONEARM_CHUNK_SECONDS, using default"
                    );
                    DEFAULT_CHUNK_SECONDS
                }
            },
            Err(_) => DEFAULT_CHUNK_SECONDS,
        };

        let use_local_storage = std::env::var("TONEARM_USE_LOCAL_STORAGE")
            .map(|v| {
                let v = v.to_lowercase();
                v == "true" || v == "1"
            })
            .unwrap_or(false);

        let local_storage_path = std::env::var("TONEARM_LOCAL_STORAGE_PATH")
            .ok()
            .map(PathBuf::from);

        let base_url = std::env::var("TONEARM_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let database_path = std::env::var("TONEARM_DATABASE_PATH")
            .ok()
            .map(PathBuf::from);

        let s3 = std::env::var("TONEARM_S3_BUCKET").ok().map(|bucket_name| S3Config {
            bucket_name,
            region: std::env::var("TONEARM_S3_REGION").unwrap_or_default(),
            access_key_id: std::env::var("TONEARM_S3_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: std::env::var("TONEARM_S3_SECRET_ACCESS_KEY").unwrap_or_default(),
            endpoint_url: std::env::var("TONEARM_S3_ENDPOINT").ok(),
        });

        if use_local_storage {
            info!("local storage enabled");
        }

        Self {
            chunk_seconds,
            use_local_storage,
            local_storage_path,
            base_url,
            database_path,
            s3,
        }
    }

    /// Directory for locally stored data (uploads, database).
    pub fn data_dir(&self) -> PathBuf {
        if let Some(path) = &self.local_storage_path {
            return path.clone();
        }

        let home_dir = dirs::home_dir().expect("Failed to get home directory");
        home_dir.join(".tonearm")
    }

    /// Path of the SQLite database file.
    pub fn database_file(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join("tonearm.db"))
    }
}
