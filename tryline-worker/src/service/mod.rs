//! Service layer
//!
//! Services contain the worker's business logic. They sit on top of the
//! repositories and implement the claim protocol, artifact movement and
//! the isolated analysis call.
//!
//! Collaborators are injected as trait objects to enable testing.

mod analysis;
mod job_store;
mod transfer;

pub use analysis::{AnalysisError, AnalysisInvoker, Analyzer, PlaceholderAnalyzer};
pub use job_store::{JobStore, StoreError};
pub use transfer::{ArtifactTransfer, TransferError};

#[cfg(test)]
pub use analysis::{RUCK_COLUMNS, SUMMARY_FILE, TACKLE_COLUMNS, write_event_table, write_summary};
