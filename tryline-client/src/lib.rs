//! Tryline Backend Client
//!
//! A small, typed HTTP client for the hosted backend the worker depends on:
//! a PostgREST-style job table and an object storage API.
//!
//! # Example
//!
//! ```no_run
//! use tryline_client::{BackendClient, JOBS_TABLE};
//!
//! #[tokio::main]
//! async fn main() -> tryline_client::Result<()> {
//!     let client = BackendClient::new("https://project.supabase.co", "service-key");
//!
//!     if let Some(row) = client.select_oldest(JOBS_TABLE, "queued").await? {
//!         println!("Next job: {}", row["id"]);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod storage;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use jobs::JOBS_TABLE;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for the hosted backend
///
/// Carries the service key on every request. Operations are grouped into:
/// - Job table access (select oldest queued, conditional and plain updates)
/// - Object storage (download and upsert by key)
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// Base URL of the backend project (e.g., "https://project.supabase.co")
    base_url: String,
    /// Service role key sent as both `apikey` and bearer token
    service_key: String,
    /// HTTP client instance
    client: Client,
    /// Per-request timeout for job table calls; storage transfers are unbounded
    table_timeout: Option<Duration>,
}

impl BackendClient {
    /// Create a new backend client
    ///
    /// # Arguments
    /// * `base_url` - The backend project URL
    /// * `service_key` - Service role key used to authorise requests
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self::with_client(base_url, service_key, Client::new())
    }

    /// Create a new backend client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use tryline_client::BackendClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = BackendClient::with_client("https://project.supabase.co", "key", http_client);
    /// ```
    pub fn with_client(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            client,
            table_timeout: None,
        }
    }

    /// Bound every job table request by `timeout`
    ///
    /// Object downloads and uploads are not affected: input videos can take
    /// far longer to move than a table read.
    pub fn with_table_timeout(mut self, timeout: Duration) -> Self {
        self.table_timeout = Some(timeout);
        self
    }

    // =============================================================================
    // Request Helpers
    // =============================================================================

    /// Attach the service key headers
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Build a URL under the base from path segments
    ///
    /// Each segment is percent-encoded on its own, so a segment can never
    /// introduce extra path levels or a query string.
    fn endpoint<'a, I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidRequest(format!("Invalid base URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidRequest("Base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Fail on a non-success status, carrying the response body as message
    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        self.check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        self.check_status(response).await?;
        Ok(())
    }

    /// Handle an API response carrying a raw body
    async fn handle_bytes_response(&self, response: reqwest::Response) -> Result<Vec<u8>> {
        let bytes = self.check_status(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
