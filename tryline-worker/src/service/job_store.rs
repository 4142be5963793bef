//! Job store service
//!
//! Implements the claim protocol and outcome recording on top of a
//! `JobRepository`:
//! - `claim` reads the oldest queued row, then moves it to `processing`
//!   with a write conditioned on the status still being `queued`
//! - `mark_done` / `mark_failed` record the terminal outcome
//!
//! A lost race is not an error: `claim` returns `None` and the job is not
//! retried here. The next poll picks whatever is oldest then.
//!
//! Rows are parsed only once claimed. A claimed row that does not parse as
//! a job is marked `failed` on the spot and the next queued row is tried,
//! so one bad row cannot stall the queue.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use tryline_core::domain::job::{Job, Summary};
use tryline_core::dto::job::{ClaimUpdate, CompletionUpdate, FailureUpdate};
use uuid::Uuid;

use crate::repository::JobRepository;

/// Errors from the job store itself
///
/// Any of these leaves the job where it was: a failed claim leaves it
/// `queued`, a failed mark leaves it `processing`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to claim a job")]
    Claim(#[source] anyhow::Error),

    #[error("queued row has no usable id: {0}")]
    MissingId(Value),

    #[error("failed to mark job {job_id} done")]
    MarkDone {
        job_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to mark job {job_id} failed")]
    MarkFailed {
        job_id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Claims jobs and records their outcomes
pub struct JobStore {
    repository: Arc<dyn JobRepository>,
}

impl JobStore {
    /// Creates a new job store over the given repository
    pub fn new(repository: Arc<dyn JobRepository>) -> Self {
        Self { repository }
    }

    /// Claims the oldest queued job
    ///
    /// # Returns
    /// - `Some(job)` with status `processing` when this worker won the claim
    /// - `None` when the queue is empty or another worker claimed the job first
    pub async fn claim(&self) -> Result<Option<Job>, StoreError> {
        loop {
            let Some(candidate) = self
                .repository
                .oldest_queued()
                .await
                .map_err(StoreError::Claim)?
            else {
                debug!("No queued jobs");
                return Ok(None);
            };

            let Some(job_id) = row_id(&candidate) else {
                return Err(StoreError::MissingId(candidate["id"].clone()));
            };

            let Some(row) = self
                .repository
                .claim_if_queued(&job_id, &ClaimUpdate::now())
                .await
                .map_err(StoreError::Claim)?
            else {
                info!("[{}] Job already claimed by another worker", job_id);
                return Ok(None);
            };

            match serde_json::from_value::<Job>(row) {
                Ok(job) => {
                    info!("[{}] Claimed job: {}", job.id, job.display_name());
                    return Ok(Some(job));
                }
                Err(e) => self.reject(&job_id, &e.to_string()).await?,
            }
        }
    }

    /// Marks a claimed row that does not parse as a job `failed`
    async fn reject(&self, job_id: &str, cause: &str) -> Result<(), StoreError> {
        let update = FailureUpdate::new(&format!("malformed job row: {}", cause));
        warn!("[{}] Rejecting job: {}", job_id, update.error);

        self.repository
            .fail(job_id, &update)
            .await
            .map_err(|source| StoreError::MarkFailed {
                job_id: job_id.to_string(),
                source,
            })
    }

    /// Records a successful outcome
    ///
    /// Sets `done`, `finished_at`, `results_path` and `summary`, and clears
    /// `error`. Repeating the call with the same arguments is harmless.
    pub async fn mark_done(
        &self,
        job_id: Uuid,
        results_path: &str,
        summary: Summary,
    ) -> Result<(), StoreError> {
        let id = job_id.to_string();
        self.repository
            .complete(&id, &CompletionUpdate::new(results_path, summary))
            .await
            .map_err(|source| StoreError::MarkDone { job_id: id, source })?;

        info!("[{}] Completed successfully", job_id);
        Ok(())
    }

    /// Records a failed outcome
    ///
    /// The message is truncated to the column bound before it is written.
    ///
    /// # Returns
    /// The message as stored
    pub async fn mark_failed(&self, job_id: Uuid, message: &str) -> Result<String, StoreError> {
        let update = FailureUpdate::new(message);

        let id = job_id.to_string();
        self.repository
            .fail(&id, &update)
            .await
            .map_err(|source| StoreError::MarkFailed { job_id: id, source })?;

        info!("[{}] Failed: {}", job_id, update.error);
        Ok(update.error)
    }
}

/// Key of a raw row as used in table filters
fn row_id(row: &Value) -> Option<String> {
    match &row["id"] {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
