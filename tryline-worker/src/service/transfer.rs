//! Artifact transfer service
//!
//! Moves artifacts between the remote side and a job's workspace:
//! - `fetch` brings the input video in, from a URL or the videos bucket
//! - `push` uploads every file of the output directory to the results bucket
//!   under `{owner_id}/{job_id}/{filename}`

use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use tryline_client::ClientError;
use uuid::Uuid;

use crate::repository::{DEFAULT_VIDEO_EXTENSION, MediaFetcher, StorageRepository, is_remote_url};

/// Errors raised while moving artifacts
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("source not found: {locator}")]
    SourceNotFound { locator: String },

    #[error("source unreachable: {locator}")]
    SourceUnreachable {
        locator: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("download of {locator} produced no data")]
    EmptyDownload { locator: String },

    #[error("failed to upload {key}")]
    Upload {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("output file name is not valid UTF-8: {}", path.display())]
    InvalidFileName { path: PathBuf },

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Shared prefix of a job's results: `{owner_id}/{job_id}`
pub fn results_prefix(owner_id: &str, job_id: Uuid) -> String {
    format!("{}/{}", owner_id, job_id)
}

/// Moves input and output artifacts for the pipeline
pub struct ArtifactTransfer {
    storage: Arc<dyn StorageRepository>,
    media: Arc<dyn MediaFetcher>,
    videos_bucket: String,
    results_bucket: String,
}

impl ArtifactTransfer {
    /// Creates a new artifact transfer service
    ///
    /// # Arguments
    /// * `storage` - Object storage for both buckets
    /// * `media` - Fetcher for `http(s)` locators
    /// * `videos_bucket` - Bucket holding uploaded input videos
    /// * `results_bucket` - Bucket receiving analysis outputs
    pub fn new(
        storage: Arc<dyn StorageRepository>,
        media: Arc<dyn MediaFetcher>,
        videos_bucket: impl Into<String>,
        results_bucket: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            media,
            videos_bucket: videos_bucket.into(),
            results_bucket: results_bucket.into(),
        }
    }

    /// Downloads the job's input video into `dest_dir`
    ///
    /// URLs go through the media fetcher; anything else is a key in the
    /// videos bucket, stored locally as `{job_id}{ext}` with the key's
    /// extension (or `.mp4` when it has none).
    pub async fn fetch(
        &self,
        job_id: Uuid,
        locator: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, TransferError> {
        let local_path = if is_remote_url(locator) {
            info!("[{}] Downloading from URL: {}", job_id, locator);
            self.media
                .fetch(locator, dest_dir, &job_id.to_string())
                .await
                .map_err(|e| classify_fetch_error(locator, e))?
        } else {
            info!("[{}] Downloading from storage: {}", job_id, locator);
            let bytes = self
                .storage
                .download(&self.videos_bucket, locator)
                .await
                .map_err(|e| classify_fetch_error(locator, e))?;

            if bytes.is_empty() {
                return Err(TransferError::EmptyDownload {
                    locator: locator.to_string(),
                });
            }

            let local_path = dest_dir.join(format!("{}.{}", job_id, key_extension(locator)));
            tokio::fs::write(&local_path, &bytes)
                .await
                .map_err(TransferError::io(&local_path))?;
            local_path
        };

        let metadata = match tokio::fs::metadata(&local_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransferError::EmptyDownload {
                    locator: locator.to_string(),
                });
            }
            Err(e) => return Err(TransferError::io(&local_path)(e)),
        };
        if metadata.len() == 0 {
            return Err(TransferError::EmptyDownload {
                locator: locator.to_string(),
            });
        }

        Ok(local_path)
    }

    /// Uploads the regular files directly inside `output_dir`
    ///
    /// Subdirectories are not descended into. Existing objects are
    /// overwritten. Files uploaded before a failing one stay uploaded.
    ///
    /// # Returns
    /// The results prefix `{owner_id}/{job_id}`
    pub async fn push(
        &self,
        output_dir: &Path,
        owner_id: &str,
        job_id: Uuid,
    ) -> Result<String, TransferError> {
        let prefix = results_prefix(owner_id, job_id);

        for (name, path) in list_output_files(output_dir).await? {
            let key = format!("{}/{}", prefix, name);
            info!("[{}] Uploading: {}", job_id, key);

            let body = tokio::fs::read(&path)
                .await
                .map_err(TransferError::io(&path))?;
            let content_type = mime_guess::from_path(&path).first_or_octet_stream();

            self.storage
                .upload(&self.results_bucket, &key, body, content_type.essence_str())
                .await
                .map_err(|source| TransferError::Upload {
                    key: key.clone(),
                    source,
                })?;
        }

        Ok(prefix)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Regular files directly inside `dir`, sorted by name
async fn list_output_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, TransferError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(TransferError::io(dir))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(TransferError::io(dir))? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(TransferError::io(&path))?;
        if !file_type.is_file() {
            continue;
        }

        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| TransferError::InvalidFileName { path: path.clone() })?;
        files.push((name, path));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Extension of a storage key, or the default video extension
fn key_extension(key: &str) -> &str {
    Path::new(key)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or(DEFAULT_VIDEO_EXTENSION)
}

/// Splits fetch failures into "not found" and "unreachable"
fn classify_fetch_error(locator: &str, error: anyhow::Error) -> TransferError {
    let not_found = error.chain().any(|cause| {
        cause
            .downcast_ref::<ClientError>()
            .is_some_and(|e| e.is_not_found())
            || cause
                .downcast_ref::<reqwest::Error>()
                .and_then(|e| e.status())
                == Some(StatusCode::NOT_FOUND)
    });

    if not_found {
        TransferError::SourceNotFound {
            locator: locator.to_string(),
        }
    } else {
        TransferError::SourceUnreachable {
            locator: locator.to_string(),
            source: error,
        }
    }
}
