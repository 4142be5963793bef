//! Scheduler layer for the worker
//!
//! This layer polls the job store for claimable jobs and drives each one
//! through the pipeline, from claim to recorded outcome and cleanup.

pub mod pipeline;
pub mod poller;

pub use pipeline::JobPipeline;
pub use poller::JobPoller;
