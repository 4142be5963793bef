//! Jobs repository
//!
//! Handles communication with the shared job table:
//! - Finding the oldest queued row
//! - Conditionally claiming a row (only while it is still queued)
//! - Recording success and failure outcomes
//!
//! Rows are handed back unparsed so that one malformed row can be dealt
//! with on its own instead of failing every read of the queue.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tryline_client::{BackendClient, JOBS_TABLE};
use tryline_core::domain::job::JobStatus;
use tryline_core::dto::job::{ClaimUpdate, CompletionUpdate, FailureUpdate};

/// Repository trait for job table operations
///
/// Implementations must evaluate the `claim_if_queued` precondition
/// atomically with the write; the worker fleet relies on nothing else for
/// mutual exclusion.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Returns the oldest row with status `queued`, if any
    async fn oldest_queued(&self) -> Result<Option<Value>>;

    /// Applies the claim update only if the row is still `queued`
    ///
    /// # Returns
    /// The updated row, or `None` when the precondition no longer held
    async fn claim_if_queued(&self, job_id: &str, update: &ClaimUpdate) -> Result<Option<Value>>;

    /// Unconditionally records a successful outcome
    async fn complete(&self, job_id: &str, update: &CompletionUpdate) -> Result<()>;

    /// Unconditionally records a failed outcome
    async fn fail(&self, job_id: &str, update: &FailureUpdate) -> Result<()>;
}

/// HTTP implementation of JobRepository
pub struct HttpJobRepository {
    client: Arc<BackendClient>,
}

impl HttpJobRepository {
    /// Creates a new HTTP job repository
    ///
    /// # Arguments
    /// * `client` - Shared backend client
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobRepository for HttpJobRepository {
    async fn oldest_queued(&self) -> Result<Option<Value>> {
        self.client
            .select_oldest(JOBS_TABLE, JobStatus::Queued.as_str())
            .await
            .context("Failed to fetch queued jobs")
    }

    async fn claim_if_queued(&self, job_id: &str, update: &ClaimUpdate) -> Result<Option<Value>> {
        self.client
            .update_where_status(JOBS_TABLE, job_id, JobStatus::Queued.as_str(), update)
            .await
            .with_context(|| format!("Failed to claim job {}", job_id))
    }

    async fn complete(&self, job_id: &str, update: &CompletionUpdate) -> Result<()> {
        self.client
            .update_by_id(JOBS_TABLE, job_id, update)
            .await
            .with_context(|| format!("Failed to mark job {} done", job_id))
    }

    async fn fail(&self, job_id: &str, update: &FailureUpdate) -> Result<()> {
        self.client
            .update_by_id(JOBS_TABLE, job_id, update)
            .await
            .with_context(|| format!("Failed to mark job {} failed", job_id))
    }
}
