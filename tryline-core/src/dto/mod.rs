//! Data Transfer Objects for the job table
//!
//! DTOs are the partial-row bodies the worker sends when it claims a job or
//! records its outcome.

pub mod job;
