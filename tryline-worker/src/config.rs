//! Worker configuration
//!
//! Defines all configurable parameters for the worker: backend connection,
//! bucket names, polling interval, scratch location and how remote video
//! URLs are fetched.

use anyhow::{Context, anyhow, bail};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How `http(s)` video locators are downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlFetcher {
    /// Hand the URL to the yt-dlp executable
    YtDlp,
    /// Plain HTTP GET of the URL
    Http,
}

impl FromStr for UrlFetcher {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yt-dlp" | "ytdlp" => Ok(Self::YtDlp),
            "http" => Ok(Self::Http),
            other => Err(anyhow!(
                "Unknown URL_FETCHER '{}' (expected 'yt-dlp' or 'http')",
                other
            )),
        }
    }
}

/// Worker configuration
#[derive(Clone)]
pub struct Config {
    /// Backend project URL (e.g., "https://project.supabase.co")
    pub backend_url: String,

    /// Service role key; never logged
    pub service_key: String,

    /// Bucket holding uploaded input videos
    pub videos_bucket: String,

    /// Bucket receiving analysis outputs
    pub results_bucket: String,

    /// Sleep after an empty poll or a loop-level error
    pub poll_interval: Duration,

    /// Parent directory of the per-job workspaces
    pub work_dir: PathBuf,

    /// Adapter used for `http(s)` locators
    pub url_fetcher: UrlFetcher,

    /// yt-dlp executable, used when `url_fetcher` is `YtDlp`
    pub yt_dlp_path: PathBuf,

    /// Timeout for each job table request; object transfers are unbounded
    pub http_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(backend_url: String, service_key: String) -> Self {
        Self {
            backend_url,
            service_key,
            videos_bucket: "videos".to_string(),
            results_bucket: "results".to_string(),
            poll_interval: Duration::from_secs(5),
            work_dir: std::env::temp_dir().join("tryline_worker"),
            url_fetcher: UrlFetcher::YtDlp,
            yt_dlp_path: PathBuf::from("yt-dlp"),
            http_timeout: Duration::from_secs(300),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - SUPABASE_URL (required)
    /// - SUPABASE_SERVICE_ROLE_KEY (required)
    /// - VIDEOS_BUCKET (optional, default: videos)
    /// - RESULTS_BUCKET (optional, default: results)
    /// - POLL_SECONDS (optional, default: 5)
    /// - WORK_DIR (optional, default: <tmp>/tryline_worker)
    /// - URL_FETCHER (optional, yt-dlp or http, default: yt-dlp)
    /// - YT_DLP_PATH (optional, default: yt-dlp)
    /// - HTTP_TIMEOUT_SECONDS (optional, default: 300)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates configuration from an arbitrary variable lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let backend_url = var("SUPABASE_URL")
            .ok_or_else(|| anyhow!("SUPABASE_URL environment variable not set"))?;

        let service_key = var("SUPABASE_SERVICE_ROLE_KEY")
            .ok_or_else(|| anyhow!("SUPABASE_SERVICE_ROLE_KEY environment variable not set"))?;

        let mut config = Self::new(backend_url, service_key);

        if let Some(bucket) = var("VIDEOS_BUCKET") {
            config.videos_bucket = bucket;
        }

        if let Some(bucket) = var("RESULTS_BUCKET") {
            config.results_bucket = bucket;
        }

        if let Some(secs) = var("POLL_SECONDS") {
            config.poll_interval = parse_seconds("POLL_SECONDS", &secs)?;
        }

        if let Some(dir) = var("WORK_DIR") {
            config.work_dir = PathBuf::from(dir);
        }

        if let Some(fetcher) = var("URL_FETCHER") {
            config.url_fetcher = fetcher.parse()?;
        }

        if let Some(path) = var("YT_DLP_PATH") {
            config.yt_dlp_path = PathBuf::from(path);
        }

        if let Some(secs) = var("HTTP_TIMEOUT_SECONDS") {
            config.http_timeout = parse_seconds("HTTP_TIMEOUT_SECONDS", &secs)?;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend_url.is_empty() {
            bail!("backend_url cannot be empty");
        }

        if !self.backend_url.starts_with("http://") && !self.backend_url.starts_with("https://") {
            bail!("backend_url must start with http:// or https://");
        }

        if self.service_key.is_empty() {
            bail!("service_key cannot be empty");
        }

        if self.videos_bucket.is_empty() || self.results_bucket.is_empty() {
            bail!("bucket names cannot be empty");
        }

        if self.poll_interval.is_zero() {
            bail!("poll_interval must be greater than 0");
        }

        if self.http_timeout.is_zero() {
            bail!("http_timeout must be greater than 0");
        }

        Ok(())
    }
}

fn parse_seconds(name: &str, value: &str) -> anyhow::Result<Duration> {
    let secs = value
        .trim()
        .parse::<u64>()
        .with_context(|| format!("{} must be a whole number, got '{}'", name, value))?;
    Ok(Duration::from_secs(secs))
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("backend_url", &self.backend_url)
            .field("service_key", &"<redacted>")
            .field("videos_bucket", &self.videos_bucket)
            .field("results_bucket", &self.results_bucket)
            .field("poll_interval", &self.poll_interval)
            .field("work_dir", &self.work_dir)
            .field("url_fetcher", &self.url_fetcher)
            .field("yt_dlp_path", &self.yt_dlp_path)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}
