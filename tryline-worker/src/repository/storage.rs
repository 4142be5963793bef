//! Storage repository
//!
//! Byte-blob access to the object storage buckets. Uploads always
//! overwrite an existing object at the same key.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tryline_client::BackendClient;

/// Repository trait for object storage
#[async_trait]
pub trait StorageRepository: Send + Sync {
    /// Downloads the object stored under `key`
    ///
    /// Errors keep the underlying `ClientError` in their chain so callers can
    /// tell a missing object from an unreachable backend.
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Uploads `body` under `key`, replacing any existing object
    async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str)
    -> Result<()>;
}

/// HTTP implementation of StorageRepository
pub struct HttpStorageRepository {
    client: Arc<BackendClient>,
}

impl HttpStorageRepository {
    /// Creates a new HTTP storage repository
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StorageRepository for HttpStorageRepository {
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        Ok(self.client.download_object(bucket, key).await?)
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        Ok(self
            .client
            .upload_object(bucket, key, body, content_type)
            .await?)
    }
}
