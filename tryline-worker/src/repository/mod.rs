//! Repository layer
//!
//! Repositories are thin adapters over the external collaborators: the
//! shared job table, object storage and remote media retrieval. They carry
//! no business logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod jobs;
mod media;
mod storage;

// Re-export traits
pub use jobs::JobRepository;
pub use media::MediaFetcher;
pub use storage::StorageRepository;

// Re-export implementations
pub use jobs::HttpJobRepository;
pub use media::{HttpMediaFetcher, YtDlpFetcher};
pub use storage::HttpStorageRepository;

pub use media::{DEFAULT_VIDEO_EXTENSION, is_remote_url};
