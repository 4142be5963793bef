//! Remote media retrieval
//!
//! Fetches the best available media for an `http(s)` locator into a local
//! directory. Two adapters exist:
//! - `YtDlpFetcher` shells out to yt-dlp, which resolves hosted video pages
//! - `HttpMediaFetcher` downloads the URL body as-is

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Extension used when the source does not reveal one
pub const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

/// Format selector handed to yt-dlp: best single-file mp4, else best overall
const YT_DLP_FORMAT: &str = "best[ext=mp4]/best";

/// Trait for retrieving remote media by URL
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Downloads `url` into `dest_dir`
    ///
    /// # Arguments
    /// * `url` - The `http(s)` locator
    /// * `dest_dir` - Existing directory to write into
    /// * `stem` - File name without extension for the local copy
    ///
    /// # Returns
    /// Path of the written file
    async fn fetch(&self, url: &str, dest_dir: &Path, stem: &str) -> Result<PathBuf>;
}

/// Fetcher backed by the yt-dlp executable
pub struct YtDlpFetcher {
    binary: PathBuf,
}

impl YtDlpFetcher {
    /// Creates a fetcher that runs the given yt-dlp binary
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str, dest_dir: &Path, stem: &str) -> Result<PathBuf> {
        let output_path = dest_dir.join(format!("{}.{}", stem, DEFAULT_VIDEO_EXTENSION));

        debug!("Running {} for {}", self.binary.display(), url);

        let output = Command::new(&self.binary)
            .arg("--format")
            .arg(YT_DLP_FORMAT)
            .arg("--output")
            .arg(&output_path)
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg(url)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| {
                format!(
                    "Failed to execute '{}'. Is yt-dlp installed?",
                    self.binary.display()
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp exited with {}: {}", output.status, stderr.trim());
        }

        Ok(output_path)
    }
}

/// Fetcher that downloads the URL body directly
pub struct HttpMediaFetcher {
    client: Client,
}

impl HttpMediaFetcher {
    /// Creates a fetcher using the given HTTP client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str, dest_dir: &Path, stem: &str) -> Result<PathBuf> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?
            .error_for_status()?;

        let output_path = dest_dir.join(format!("{}.{}", stem, url_extension(url)));
        let mut file = tokio::fs::File::create(&output_path)
            .await
            .with_context(|| format!("Failed to create {}", output_path.display()))?;

        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        debug!("Downloaded {} bytes from {}", written, url);

        Ok(output_path)
    }
}

/// Returns true for `http://` and `https://` locators
pub fn is_remote_url(locator: &str) -> bool {
    let lower = locator.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Extension of the URL's last path segment, without query or fragment
fn url_extension(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            let last = parsed.path_segments()?.next_back()?.to_string();
            Path::new(&last)
                .extension()
                .and_then(|ext| ext.to_str())
                .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
                .map(|ext| ext.to_ascii_lowercase())
        })
        .unwrap_or_else(|| DEFAULT_VIDEO_EXTENSION.to_string())
}
