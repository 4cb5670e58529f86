//! S3-backed object storage for cover images
//!
//! Wraps a single bucket and exposes the handful of operations the services
//! need: upserting uploads, removals, presigned download URLs and listing.

use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client, error::DisplayErrorContext, presigning::PresigningConfig, primitives::ByteStream,
};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Default lifetime of a signed URL, in seconds
pub const DEFAULT_SIGNED_URL_TTL: u64 = 60 * 60;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bucket holding every cover image
    pub bucket: String,
    /// Custom endpoint for S3-compatible stores (MinIO, localstack)
    pub endpoint: Option<String>,
    /// Lifetime of signed URLs in seconds
    pub signed_url_ttl: u64,
}

impl StorageConfig {
    /// Create a new StorageConfig from environment variables
    ///
    /// # Environment Variables
    /// - `STORAGE_BUCKET`: Bucket name (default: "recipe-images")
    /// - `STORAGE_ENDPOINT`: Optional S3 endpoint override
    /// - `STORAGE_SIGNED_URL_TTL`: Signed URL lifetime in seconds (default: 3600)
    pub fn from_env() -> Self {
        let bucket =
            std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "recipe-images".to_string());
        let endpoint = std::env::var("STORAGE_ENDPOINT").ok();
        let signed_url_ttl = std::env::var("STORAGE_SIGNED_URL_TTL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SIGNED_URL_TTL);

        Self {
            bucket,
            endpoint,
            signed_url_ttl,
        }
    }
}

/// A listed object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Object storage bound to one bucket
#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
}

impl ObjectStorage {
    /// Build a client from the ambient AWS configuration
    pub async fn connect(config: &StorageConfig) -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;

        let client = match &config.endpoint {
            Some(endpoint) => {
                let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&sdk_config),
        };

        info!("Object storage ready for bucket {}", config.bucket);
        Self::new(client, config.bucket.clone())
    }

    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload an object, replacing any existing object at the same key
    pub async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Request(DisplayErrorContext(e).to_string()))?;

        debug!("Uploaded {} to {}", key, self.bucket);
        Ok(())
    }

    /// Remove objects; missing keys are not an error
    pub async fn remove(&self, keys: &[String]) -> StorageResult<()> {
        for key in keys {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| StorageError::Request(DisplayErrorContext(e).to_string()))?;

            debug!("Removed {} from {}", key, self.bucket);
        }

        Ok(())
    }

    /// Presign a GET for `key`, valid for `expires_in_seconds`
    pub async fn signed_url(&self, key: &str, expires_in_seconds: u64) -> StorageResult<String> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(expires_in_seconds))
            .map_err(|e| StorageError::Presigning(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Request(DisplayErrorContext(e).to_string()))?;

        Ok(request.uri().to_string())
    }

    /// List every object under `prefix`, following continuation tokens
    pub async fn list_objects(&self, prefix: Option<&str>) -> StorageResult<Vec<StoredObject>> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);

            if let Some(prefix) = prefix {
                request = request.prefix(prefix);
            }
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StorageError::Request(DisplayErrorContext(e).to_string()))?;

            for obj in response.contents() {
                if let Some(key) = obj.key() {
                    let last_modified = obj
                        .last_modified()
                        .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
                        .unwrap_or_else(Utc::now);

                    objects.push(StoredObject {
                        key: key.to_string(),
                        size: obj.size().unwrap_or(0).max(0) as u64,
                        last_modified,
                    });
                }
            }

            if response.is_truncated().unwrap_or(false) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(objects)
    }
}
