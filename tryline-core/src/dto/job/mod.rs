//! Job DTOs sent to the job table
//!
//! Each struct is the exact JSON body of one update. Fields that must be
//! cleared are serialised as explicit nulls; fields that must be left
//! untouched are absent.

use serde::{Deserialize, Serialize};

use crate::domain::job::{JobStatus, Summary};

/// Upper bound on the stored `error` column, in characters
pub const MAX_ERROR_CHARS: usize = 1000;

/// Truncates an error message to [`MAX_ERROR_CHARS`] characters
///
/// Counts characters rather than bytes so a multi-byte code point is never
/// split.
pub fn truncate_error(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_CHARS) {
        Some((byte_idx, _)) => message[..byte_idx].to_string(),
        None => message.to_string(),
    }
}

/// Body of the conditional `queued -> processing` update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimUpdate {
    pub status: JobStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl ClaimUpdate {
    pub fn now() -> Self {
        Self {
            status: JobStatus::Processing,
            started_at: chrono::Utc::now(),
        }
    }
}

/// Body of the success update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionUpdate {
    pub status: JobStatus,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub results_path: String,
    pub summary: Summary,
    /// Always serialised as `null`
    pub error: Option<String>,
}

impl CompletionUpdate {
    pub fn new(results_path: impl Into<String>, summary: Summary) -> Self {
        Self {
            status: JobStatus::Done,
            finished_at: chrono::Utc::now(),
            results_path: results_path.into(),
            summary,
            error: None,
        }
    }
}

/// Body of the failure update
///
/// Leaves `results_path` and `summary` as they are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureUpdate {
    pub status: JobStatus,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub error: String,
}

impl FailureUpdate {
    pub fn new(error: &str) -> Self {
        Self {
            status: JobStatus::Failed,
            finished_at: chrono::Utc::now(),
            error: truncate_error(error),
        }
    }
}
