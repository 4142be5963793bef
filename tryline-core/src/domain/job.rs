//! Job domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Analysis job record
///
/// Mirrors one row of the shared `analysis_jobs` table. Rows are created
/// elsewhere; the worker only claims them and records their outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// URL or storage key of the input video
    #[serde(rename = "video_path")]
    pub video_locator: String,
    #[serde(default)]
    pub video_filename: Option<String>,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    pub status: JobStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub results_path: Option<String>,
    #[serde(default)]
    pub summary: Option<Summary>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Job {
    /// Name used in log lines: the uploaded filename when known, else the locator
    pub fn display_name(&self) -> &str {
        self.video_filename.as_deref().unwrap_or(&self.video_locator)
    }
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// Wire representation used in store filters
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of the analysis routine
///
/// Passed through to the store and the persisted summary file without
/// being interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Summary(pub serde_json::Map<String, serde_json::Value>);

impl Summary {
    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        serde_json::Value::Object(self.0)
    }
}

impl TryFrom<serde_json::Value> for Summary {
    type Error = serde_json::Value;

    /// Only JSON objects are valid summaries; anything else is handed back
    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}
