//! Analysis service
//!
//! Adapts the video analysis routine to a fixed contract: given a readable
//! video and an existing output directory, it returns a `Summary` and leaves
//! at least `summary.json` plus header-bearing event tables behind.
//!
//! The routine is blocking work and runs on the blocking thread pool. Its
//! errors and panics are turned into `AnalysisError` without inspection.

use anyhow::Context;
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tryline_core::domain::job::Summary;

/// File the routine writes its summary to
pub const SUMMARY_FILE: &str = "summary.json";

/// Column headers of the ruck event table
pub const RUCK_COLUMNS: [&str; 5] = [
    "frame_start",
    "frame_end",
    "duration_sec",
    "bodies",
    "confidence",
];

/// Column headers of the tackle event table
pub const TACKLE_COLUMNS: [&str; 6] = [
    "frame",
    "time_sec",
    "quality",
    "displacement",
    "bodies",
    "confidence",
];

/// Errors surfaced from an analysis run
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The routine returned an error
    #[error(transparent)]
    Routine(anyhow::Error),

    #[error("analysis routine panicked: {0}")]
    Panicked(String),

    #[error("analysis routine did not write {}", .0.display())]
    MissingSummary(PathBuf),
}

/// The analysis routine
///
/// Implementations must write their outputs into `output_dir` before
/// returning.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, video_path: &Path, output_dir: &Path) -> anyhow::Result<Summary>;
}

/// Runs an `Analyzer` in isolation from the async pipeline
#[derive(Clone)]
pub struct AnalysisInvoker {
    analyzer: Arc<dyn Analyzer>,
}

impl AnalysisInvoker {
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        Self { analyzer }
    }

    /// Runs the analysis to completion
    ///
    /// # Arguments
    /// * `video_path` - Local input file
    /// * `output_dir` - Existing, writable output directory
    pub async fn invoke(
        &self,
        video_path: &Path,
        output_dir: &Path,
    ) -> Result<Summary, AnalysisError> {
        let analyzer = Arc::clone(&self.analyzer);
        let video = video_path.to_path_buf();
        let output = output_dir.to_path_buf();

        let run = tokio::task::spawn_blocking(move || analyzer.analyze(&video, &output));
        let summary = match run.await {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => return Err(AnalysisError::Routine(e)),
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    "analysis task was cancelled".to_string()
                };
                return Err(AnalysisError::Panicked(message));
            }
        };

        let summary_path = output_dir.join(SUMMARY_FILE);
        if !tokio::fs::try_exists(&summary_path).await.unwrap_or(false) {
            return Err(AnalysisError::MissingSummary(summary_path));
        }

        Ok(summary)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// =============================================================================
// Placeholder Routine
// =============================================================================

/// Stand-in for the real detection model
///
/// Detects nothing: writes a zeroed summary and header-only event tables.
pub struct PlaceholderAnalyzer;

impl Analyzer for PlaceholderAnalyzer {
    fn analyze(&self, video_path: &Path, output_dir: &Path) -> anyhow::Result<Summary> {
        let summary = Summary::try_from(json!({
            "video_path": video_path.to_string_lossy(),
            "total_frames": 0,
            "duration_seconds": 0,
            "rucks": {
                "count": 0,
                "avg_duration": 0,
                "avg_bodies": 0
            },
            "tackles": {
                "count": 0,
                "dominant": 0,
                "neutral": 0,
                "lost": 0,
                "avg_displacement": 0
            }
        }))
        .map_err(|value| anyhow::anyhow!("summary is not an object: {}", value))?;

        write_summary(output_dir, &summary)?;
        write_event_table(&output_dir.join("rucks.csv"), &RUCK_COLUMNS)?;
        write_event_table(&output_dir.join("tackles.csv"), &TACKLE_COLUMNS)?;

        Ok(summary)
    }
}

/// Writes `summary.json` as pretty-printed JSON
pub fn write_summary(output_dir: &Path, summary: &Summary) -> anyhow::Result<()> {
    let path = output_dir.join(SUMMARY_FILE);
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writer.flush()?;
    Ok(())
}

/// Writes an event table containing only its header row
pub fn write_event_table(path: &Path, columns: &[&str]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(columns)?;
    writer.flush()?;
    Ok(())
}
