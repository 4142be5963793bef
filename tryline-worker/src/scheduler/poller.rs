//! Job poller
//!
//! Process-lifetime loop that claims one job at a time and runs it through
//! the pipeline. After a processed job it polls again immediately; after an
//! empty poll or a loop-level error it sleeps for the poll interval.
//!
//! Shutdown is observed only between jobs: before each claim and while
//! sleeping. An in-flight job always runs to its terminal outcome.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{self, Duration};
use tracing::{debug, error, info};

use crate::scheduler::pipeline::{JobOutcome, JobPipeline};
use crate::service::JobStore;

/// Result of a single poll iteration
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Queue was empty or the claim was lost to another worker
    Idle,
    /// A job was claimed and reached a recorded outcome
    Processed(JobOutcome),
}

/// Job poller that repeatedly claims and executes jobs
pub struct JobPoller {
    store: Arc<JobStore>,
    pipeline: Arc<JobPipeline>,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl JobPoller {
    /// Creates a new job poller
    ///
    /// # Arguments
    /// * `store` - Job store used for claiming
    /// * `pipeline` - Pipeline each claimed job is run through
    /// * `poll_interval` - Sleep after an empty poll or an error
    /// * `shutdown` - Set to `true` to stop the loop between jobs
    pub fn new(
        store: Arc<JobStore>,
        pipeline: Arc<JobPipeline>,
        poll_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            pipeline,
            poll_interval,
            shutdown,
        }
    }

    /// Runs the polling loop until shutdown is requested
    pub async fn run(mut self) {
        info!("Starting job poller (interval: {:?})", self.poll_interval);

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            match self.poll_once().await {
                Ok(PollOutcome::Processed(_)) => continue,
                Ok(PollOutcome::Idle) => {
                    debug!("No jobs available");
                }
                Err(e) => {
                    error!("Worker error: {:#}", e);
                }
            }

            if self.idle().await {
                break;
            }
        }

        info!("Job poller stopped");
    }

    /// Performs a single poll iteration
    ///
    /// The pipeline runs in its own task so that a panic inside it is
    /// reported here as an error instead of unwinding the loop.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let Some(job) = self
            .store
            .claim()
            .await
            .context("Failed to poll for jobs")?
        else {
            return Ok(PollOutcome::Idle);
        };

        let job_id = job.id;
        let pipeline = Arc::clone(&self.pipeline);
        let handle = tokio::spawn(async move { pipeline.run(&job).await });

        match handle.await {
            Ok(Ok(outcome)) => Ok(PollOutcome::Processed(outcome)),
            Ok(Err(e)) => {
                let context = format!("[{}] Job left in processing", job_id);
                Err(anyhow::Error::new(e).context(context))
            }
            Err(e) => Err(anyhow::anyhow!("[{}] Job task panicked: {}", job_id, e)),
        }
    }

    /// Sleeps for the poll interval
    ///
    /// # Returns
    /// `true` if shutdown was requested while sleeping
    async fn idle(&mut self) -> bool {
        let sleep = time::sleep(self.poll_interval);

        tokio::select! {
            _ = sleep => false,
            Ok(_) = self.shutdown.wait_for(|stop| *stop) => true,
        }
    }
}
