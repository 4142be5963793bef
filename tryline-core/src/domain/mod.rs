//! Core domain types
//!
//! These types mirror the rows of the shared job table and are used by both
//! the backend client (wire format) and the worker (lifecycle decisions).

pub mod job;
