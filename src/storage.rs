//! Storage backends for processed audio chunks.
//!
//! Chunks are uploaded through the `FileStorage` trait and addressed by the
//! public URL the backend hands back. Development uses the local filesystem
//! provider; production uses S3.

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{Client, Error as S3Error};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;

/// Public URL path segment for locally stored files.
const PUBLIC_PATH: &str = "uploads";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("S3 error: {0}")]
    S3(#[from] S3Error),
    #[error("S3 SDK error: {0}")]
    SdkError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid storage address: {0}")]
    InvalidAddress(String),
}

/// S3 configuration for chunk storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>, // For MinIO/S3-compatible services
}

impl S3Config {
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.bucket_name.trim().is_empty() {
            return Err(StorageError::Config("Bucket name cannot be empty".to_string()));
        }
        if self.region.trim().is_empty() {
            return Err(StorageError::Config("Region cannot be empty".to_string()));
        }
        if self.access_key_id.trim().is_empty() {
            return Err(StorageError::Config(
                "Access key ID cannot be empty".to_string(),
            ));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(StorageError::Config(
                "Secret access key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for chunk storage operations (allows mocking for tests)
#[async_trait::async_trait]
pub trait FileStorage: Send + Sync {
    /// Store a named object and return its public address.
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, StorageError>;

    /// Remove a previously stored object by its address.
    async fn delete(&self, address: &str) -> Result<(), StorageError>;
}

/// Development storage on the local filesystem.
///
/// Files are written under the upload directory with a fresh UUID name and
/// addressed as `{base_url}/uploads/{file_name}`.
pub struct LocalFileStorage {
    upload_dir: PathBuf,
    base_url: String,
}

impl LocalFileStorage {
    pub fn new(upload_dir: PathBuf, base_url: String) -> Self {
        LocalFileStorage {
            upload_dir,
            base_url,
        }
    }

    /// Lowercased extension of the suggested name with anything outside
    /// `[a-z0-9_]` stripped, dot included. Empty when there is no usable
    /// extension.
    fn sanitized_extension(name: &str) -> String {
        let ext = match std::path::Path::new(name).extension().and_then(|e| e.to_str()) {
            Some(ext) => ext,
            None => return String::new(),
        };

        let cleaned: String = ext
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();

        if cleaned.is_empty() {
            String::new()
        } else {
            format!(".{}", cleaned)
        }
    }

    /// Final path segment of an address, or None when there is none.
    fn file_name_from_address(address: &str) -> Option<String> {
        let name = address.rsplit('/').next().unwrap_or(address);
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

#[async_trait::async_trait]
impl FileStorage for LocalFileStorage {
    async fn upload(
        &self,
        name: &str,
        _content_type: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        fs::create_dir_all(&self.upload_dir).await?;

        let file_name = format!("{}{}", Uuid::new_v4(), Self::sanitized_extension(name));
        let file_path = self.upload_dir.join(&file_name);
        fs::write(&file_path, data).await?;

        debug!(path = %file_path.display(), bytes = data.len(), "stored file locally");
        Ok(format!("{}/{}/{}", self.base_url, PUBLIC_PATH, file_name))
    }

    async fn delete(&self, address: &str) -> Result<(), StorageError> {
        let file_name = match Self::file_name_from_address(address) {
            Some(name) => name,
            None => return Ok(()),
        };

        let file_path = self.upload_dir.join(file_name);
        let metadata = match fs::metadata(&file_path).await {
            Ok(metadata) => metadata,
            Err(_) => return Ok(()), // Already gone
        };

        if metadata.is_file() {
            fs::remove_file(&file_path).await?;
        }
        Ok(())
    }
}

/// Production S3 chunk storage
pub struct S3FileStorage {
    client: Client,
    bucket_name: String,
    region: String,
}

impl S3FileStorage {
    /// Create a new S3 storage client
    pub async fn new(config: S3Config) -> Result<Self, StorageError> {
        config.validate()?;
        let region = config.region.clone();

        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None, // session_token
            None, // expiration
            "tonearm-s3-config",
        );

        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);

        // Set custom endpoint if provided (for S3-compatible services)
        if let Some(endpoint) = config.endpoint_url {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);
        }

        let aws_config = aws_config_builder.load().await;
        let client = Client::new(&aws_config);

        Ok(S3FileStorage {
            client,
            bucket_name: config.bucket_name,
            region,
        })
    }

    fn address_prefix(&self) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/",
            self.bucket_name, self.region
        )
    }
}

#[async_trait::async_trait]
impl FileStorage for S3FileStorage {
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        let key = format!("{}-{}", Utc::now().timestamp_millis(), name);

        debug!(key = %key, bytes = data.len(), "uploading object to S3");
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(data.to_vec().into())
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::SdkError(format!("Put object failed: {}", e)))?;

        Ok(format!(
            "{}{}",
            self.address_prefix(),
            urlencoding::encode(&key)
        ))
    }

    async fn delete(&self, address: &str) -> Result<(), StorageError> {
        let encoded_key = address
            .strip_prefix(&self.address_prefix())
            .ok_or_else(|| StorageError::InvalidAddress(address.to_string()))?;
        let key = urlencoding::decode(encoded_key)
            .map(|k| k.into_owned())
            .unwrap_or_else(|_| encoded_key.to_string());

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::SdkError(format!("Delete object failed: {}", e)))?;

        Ok(())
    }
}

/// Storage manager that binds the configured backend behind one handle
#[derive(Clone)]
pub struct StorageManager {
    storage: Arc<dyn FileStorage>,
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("storage", &"<dyn FileStorage>")
            .finish()
    }
}

impl StorageManager {
    /// Create a new storage manager with S3 configuration
    pub async fn new(config: S3Config) -> Result<Self, StorageError> {
        let storage = S3FileStorage::new(config).await?;
        Ok(StorageManager {
            storage: Arc::new(storage),
        })
    }

    /// Bind the backend the configuration selects: local files in dev,
    /// S3 otherwise.
    pub async fn from_config(config: &Config) -> Result<Self, StorageError> {
        if config.use_local_storage {
            let upload_dir = config.data_dir().join(PUBLIC_PATH);
            let storage = LocalFileStorage::new(upload_dir, config.base_url.clone());
            return Ok(StorageManager {
                storage: Arc::new(storage),
            });
        }

        let s3_config = config.s3.clone().ok_or_else(|| {
            StorageError::Config("S3 configuration is required without local storage".to_string())
        })?;
        Self::new(s3_config).await
    }

    /// Create a storage manager over an existing backend (used in tests)
    pub fn from_storage(storage: Arc<dyn FileStorage>) -> Self {
        StorageManager { storage }
    }

    /// Upload a named chunk and return its public address
    pub async fn upload(
        &self,
        name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        self.storage.upload(name, content_type, data).await
    }

    /// Delete a stored chunk by address
    pub async fn delete(&self, address: &str) -> Result<(), StorageError> {
        self.storage.delete(address).await
    }
}
