//! Object storage endpoints

use crate::BackendClient;
use crate::error::{ClientError, Result};
use reqwest::Url;

impl BackendClient {
    /// Download an object by key
    ///
    /// # Arguments
    /// * `bucket` - Bucket name (e.g., "videos")
    /// * `key` - Object key, `/`-separated
    pub async fn download_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.object_url(bucket, key)?;
        let response = self.authorized(self.client.get(url)).send().await?;

        self.handle_bytes_response(response).await
    }

    /// Upload an object, replacing any existing object at the same key
    ///
    /// # Arguments
    /// * `bucket` - Bucket name (e.g., "results")
    /// * `key` - Object key, `/`-separated
    /// * `body` - Object contents
    /// * `content_type` - MIME type stored with the object
    pub async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = self.object_url(bucket, key)?;
        let response = self
            .authorized(self.client.post(url))
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// URL of an object: `/storage/v1/object/{bucket}/{key}`
    fn object_url(&self, bucket: &str, key: &str) -> Result<Url> {
        let key_segments: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
        if bucket.is_empty() || key_segments.is_empty() {
            return Err(ClientError::InvalidRequest(format!(
                "Invalid object location: bucket '{}', key '{}'",
                bucket, key
            )));
        }

        self.endpoint(
            ["storage", "v1", "object", bucket]
                .into_iter()
                .chain(key_segments),
        )
    }
}
