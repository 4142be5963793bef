//! Per-job scratch workspace
//!
//! Each in-flight job owns one directory tree:
//!
//! ```text
//! {work_root}/{job_id}/          downloaded input
//! {work_root}/{job_id}/output/   analysis outputs, uploaded as-is
//! ```
//!
//! The tree is removed by `cleanup`, or by `Drop` if the owner never got
//! that far. Removal failures are logged and otherwise ignored.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Name of the output subdirectory
pub const OUTPUT_DIR: &str = "output";

/// Scratch directory for a single job
#[derive(Debug)]
pub struct Workspace {
    job_id: Uuid,
    root: PathBuf,
    output: PathBuf,
    /// Cleared once the tree has been removed
    armed: bool,
}

impl Workspace {
    /// Creates a fresh workspace for `job_id` under `work_root`
    ///
    /// Leftovers from an earlier run of the same job are removed first. If
    /// creating the output directory fails, the partial tree is removed
    /// before the error is returned.
    pub async fn create(work_root: &Path, job_id: Uuid) -> io::Result<Self> {
        let root = work_root.join(job_id.to_string());

        match tokio::fs::remove_dir_all(&root).await {
            Ok(()) => debug!("[{}] Removed stale workspace {}", job_id, root.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        tokio::fs::create_dir_all(&root).await?;

        let workspace = Self {
            job_id,
            output: root.join(OUTPUT_DIR),
            root,
            armed: true,
        };
        tokio::fs::create_dir(&workspace.output).await?;

        debug!("[{}] Workspace at {}", job_id, workspace.root.display());
        Ok(workspace)
    }

    /// Root of the workspace; the input video lands here
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory the analysis writes into
    pub fn output_dir(&self) -> &Path {
        &self.output
    }

    /// Removes the workspace tree
    pub async fn cleanup(mut self) {
        self.armed = false;

        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!("[{}] Workspace removed", self.job_id),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "[{}] Failed to remove workspace {}: {}",
                self.job_id,
                self.root.display(),
                e
            ),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(
                    "[{}] Failed to remove workspace {}: {}",
                    self.job_id,
                    self.root.display(),
                    e
                );
            }
        }
    }
}
