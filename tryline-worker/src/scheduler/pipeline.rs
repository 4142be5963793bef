//! Job pipeline
//!
//! Runs one claimed job through its stages:
//!
//! ```text
//! Preparing -> Fetching -> Analyzing -> Uploading -> Finalizing -> CleaningUp
//!                  \            \            \
//!                   +------------+------------+--> Finalizing (failed)
//! ```
//!
//! Every stage returns an explicit `Result`. The first failing stage ends
//! the run on the failure line. Exactly one of `mark_done` / `mark_failed`
//! is issued per run, and the workspace is removed afterwards whatever the
//! outcome. Only an error from that terminal write escapes `run`.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use tryline_core::domain::job::{Job, Summary};

use crate::service::{
    AnalysisError, AnalysisInvoker, ArtifactTransfer, JobStore, StoreError, TransferError,
};
use crate::workspace::Workspace;

/// Stage at which a job failed, with its cause
#[derive(Debug, Error)]
pub enum StageError {
    #[error("workspace preparation failed")]
    Prepare(#[source] std::io::Error),

    #[error("fetch failed")]
    Fetch(#[source] TransferError),

    #[error("analysis failed")]
    Analysis(#[source] AnalysisError),

    #[error("upload failed")]
    Upload(#[source] TransferError),
}

impl StageError {
    /// Stage name followed by the full cause chain
    pub fn describe(self) -> String {
        format!("{:#}", anyhow::Error::new(self))
    }
}

/// Terminal outcome recorded for a job
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Done { results_path: String },
    Failed { error: String },
}

/// Processes exactly one claimed job
pub struct JobPipeline {
    store: Arc<JobStore>,
    transfer: ArtifactTransfer,
    analysis: AnalysisInvoker,
    work_root: PathBuf,
}

impl JobPipeline {
    /// Creates a new pipeline
    ///
    /// # Arguments
    /// * `store` - Job store used for the terminal write
    /// * `transfer` - Input download and output upload
    /// * `analysis` - The isolated analysis routine
    /// * `work_root` - Directory under which per-job workspaces are created
    pub fn new(
        store: Arc<JobStore>,
        transfer: ArtifactTransfer,
        analysis: AnalysisInvoker,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            transfer,
            analysis,
            work_root: work_root.into(),
        }
    }

    /// Runs the job to a recorded terminal outcome
    ///
    /// Job-level failures are recorded with `mark_failed` and reported as
    /// `Ok(JobOutcome::Failed)`. `Err` means the terminal write itself
    /// failed and the job is still `processing`.
    pub async fn run(&self, job: &Job) -> Result<JobOutcome, StoreError> {
        match Workspace::create(&self.work_root, job.id).await {
            Ok(workspace) => {
                let stages = self.process(job, &workspace).await;
                let recorded = self.finalize(job, stages).await;
                workspace.cleanup().await;
                recorded
            }
            Err(e) => self.finalize(job, Err(StageError::Prepare(e))).await,
        }
    }

    /// Fetching, Analyzing and Uploading
    async fn process(
        &self,
        job: &Job,
        workspace: &Workspace,
    ) -> Result<(String, Summary), StageError> {
        let video_path = self
            .transfer
            .fetch(job.id, &job.video_locator, workspace.root())
            .await
            .map_err(StageError::Fetch)?;
        info!("[{}] Video downloaded: {}", job.id, video_path.display());

        info!("[{}] Running analysis...", job.id);
        let summary = self
            .analysis
            .invoke(&video_path, workspace.output_dir())
            .await
            .map_err(StageError::Analysis)?;
        info!("[{}] Analysis complete", job.id);

        let results_path = self
            .transfer
            .push(workspace.output_dir(), &job.owner_id, job.id)
            .await
            .map_err(StageError::Upload)?;

        Ok((results_path, summary))
    }

    /// Issues the single terminal write for the run
    async fn finalize(
        &self,
        job: &Job,
        stages: Result<(String, Summary), StageError>,
    ) -> Result<JobOutcome, StoreError> {
        match stages {
            Ok((results_path, summary)) => {
                self.store.mark_done(job.id, &results_path, summary).await?;
                Ok(JobOutcome::Done { results_path })
            }
            Err(stage_error) => {
                let description = stage_error.describe();
                error!("[{}] Error: {}", job.id, description);
                let error = self.store.mark_failed(job.id, &description).await?;
                Ok(JobOutcome::Failed { error })
            }
        }
    }
}
