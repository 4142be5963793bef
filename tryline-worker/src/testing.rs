//! In-memory fakes shared by the worker's unit tests

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Barrier;
use tokio::time::Instant;
use tryline_client::ClientError;
use tryline_core::domain::job::{Job, JobStatus, Summary};
use tryline_core::dto::job::{ClaimUpdate, CompletionUpdate, FailureUpdate};
use uuid::Uuid;

use crate::repository::{DEFAULT_VIDEO_EXTENSION, JobRepository, MediaFetcher, StorageRepository};
use crate::service::{Analyzer, RUCK_COLUMNS, TACKLE_COLUMNS, write_event_table, write_summary};

/// Builds a queued job created `offset_secs` after a fixed base time
pub fn queued_job(owner_id: &str, locator: &str, offset_secs: i64) -> Job {
    let base = chrono::DateTime::parse_from_rfc3339("2026-10-01T12:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);

    Job {
        id: Uuid::new_v4(),
        video_locator: locator.to_string(),
        video_filename: None,
        owner_id: owner_id.to_string(),
        status: JobStatus::Queued,
        created_at: base + chrono::Duration::seconds(offset_secs),
        started_at: None,
        finished_at: None,
        results_path: None,
        summary: None,
        error: None,
    }
}

// =============================================================================
// Job table
// =============================================================================

/// A write that reached the fake job table
#[derive(Debug, Clone, PartialEq)]
pub enum TableWrite {
    Claim(String),
    Complete(String),
    Fail(String),
}

/// Job table held in memory as raw rows
///
/// The conditional claim runs under the row lock, so it is atomic with
/// respect to every other write.
pub struct InMemoryJobRepository {
    rows: Mutex<Vec<Value>>,
    writes: Mutex<Vec<TableWrite>>,
    reads: Mutex<Vec<Instant>>,
    claim_attempts: AtomicUsize,
    read_barrier: Option<Barrier>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
            claim_attempts: AtomicUsize::new(0),
            read_barrier: None,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes `readers` concurrent `oldest_queued` calls wait for each other
    /// after reading, so they all observe the same row
    pub fn with_read_barrier(readers: usize) -> Self {
        Self {
            read_barrier: Some(Barrier::new(readers)),
            ..Self::new()
        }
    }

    pub fn insert(&self, job: Job) {
        self.insert_raw(serde_json::to_value(job).unwrap());
    }

    /// Inserts a row exactly as given, whether or not it parses as a job
    pub fn insert_raw(&self, row: Value) {
        self.rows.lock().unwrap().push(row);
    }

    pub fn get_raw(&self, job_id: &str) -> Option<Value> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row["id"] == job_id)
            .cloned()
    }

    pub fn get(&self, job_id: Uuid) -> Option<Job> {
        self.get_raw(&job_id.to_string())
            .map(|row| serde_json::from_value(row).unwrap())
    }

    pub fn writes(&self) -> Vec<TableWrite> {
        self.writes.lock().unwrap().clone()
    }

    /// Times at which `oldest_queued` was called
    pub fn read_instants(&self) -> Vec<Instant> {
        self.reads.lock().unwrap().clone()
    }

    pub fn terminal_write_count(&self) -> usize {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|w| matches!(w, TableWrite::Complete(_) | TableWrite::Fail(_)))
            .count()
    }

    pub fn claim_attempts(&self) -> usize {
        self.claim_attempts.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("job table unavailable");
        }
        Ok(())
    }

    /// Merges `body` into row `job_id`, if present
    fn update(&self, job_id: &str, write: TableWrite, body: Value) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|row| row["id"] == job_id) {
            merge(row, body);
        }
        self.writes.lock().unwrap().push(write);
    }
}

fn merge(row: &mut Value, body: Value) {
    if let (Value::Object(row), Value::Object(fields)) = (row, body) {
        row.extend(fields);
    }
}

fn is_queued(row: &Value) -> bool {
    row["status"] == JobStatus::Queued.as_str()
}

fn created_at(row: &Value) -> &str {
    row["created_at"].as_str().unwrap_or_default()
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn oldest_queued(&self) -> Result<Option<Value>> {
        self.reads.lock().unwrap().push(Instant::now());
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("job table unavailable");
        }

        let oldest = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| is_queued(row))
            .min_by(|a, b| created_at(a).cmp(created_at(b)))
            .cloned();

        if let Some(barrier) = &self.read_barrier {
            barrier.wait().await;
        }

        Ok(oldest)
    }

    async fn claim_if_queued(&self, job_id: &str, update: &ClaimUpdate) -> Result<Option<Value>> {
        self.claim_attempts.fetch_add(1, Ordering::SeqCst);

        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows
            .iter_mut()
            .find(|row| row["id"] == job_id && is_queued(row))
        else {
            return Ok(None);
        };

        merge(row, serde_json::to_value(update)?);
        self.writes
            .lock()
            .unwrap()
            .push(TableWrite::Claim(job_id.to_string()));

        Ok(Some(row.clone()))
    }

    async fn complete(&self, job_id: &str, update: &CompletionUpdate) -> Result<()> {
        self.check_writable()?;
        let body = serde_json::to_value(update)?;
        self.update(job_id, TableWrite::Complete(job_id.to_string()), body);
        Ok(())
    }

    async fn fail(&self, job_id: &str, update: &FailureUpdate) -> Result<()> {
        self.check_writable()?;
        let body = serde_json::to_value(update)?;
        self.update(job_id, TableWrite::Fail(job_id.to_string()), body);
        Ok(())
    }
}

// =============================================================================
// Object storage
// =============================================================================

struct StoredObject {
    body: Vec<u8>,
    content_type: Option<String>,
}

/// Object storage held in memory, keyed by `(bucket, key)`
pub struct InMemoryStorage {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    failing_keys: Mutex<HashSet<String>>,
    uploads: AtomicUsize,
    downloads: AtomicUsize,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            failing_keys: Mutex::new(HashSet::new()),
            uploads: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Seeds an object without counting it as an upload
    pub fn put(&self, bucket: &str, key: &str, body: Vec<u8>) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: None,
            },
        );
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| object.body.clone())
    }

    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .and_then(|object| object.content_type.clone())
    }

    /// Keys stored in `bucket`, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Makes every upload to `key` fail
    pub fn fail_uploads_for(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl StorageRepository for InMemoryStorage {
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);

        self.get(bucket, key).ok_or_else(|| {
            anyhow::Error::new(ClientError::api_error(404, "Object not found"))
                .context(format!("Failed to download {}/{}", bucket, key))
        })
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        if self.failing_keys.lock().unwrap().contains(key) {
            let unavailable = ClientError::api_error(503, "storage unavailable");
            return Err(anyhow::Error::new(unavailable));
        }

        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }
}

// =============================================================================
// Media fetcher
// =============================================================================

/// Media fetcher that writes canned bytes or fails
pub struct StubMediaFetcher {
    result: std::result::Result<Vec<u8>, String>,
    requested: Mutex<Vec<String>>,
}

impl StubMediaFetcher {
    pub fn returning(body: Vec<u8>) -> Self {
        Self {
            result: Ok(body),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// URLs passed to `fetch`, in call order
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for StubMediaFetcher {
    async fn fetch(&self, url: &str, dest_dir: &Path, stem: &str) -> Result<PathBuf> {
        self.requested.lock().unwrap().push(url.to_string());

        let body = self.result.as_ref().map_err(|message| anyhow!("{}", message))?;
        let path = dest_dir.join(format!("{}.{}", stem, DEFAULT_VIDEO_EXTENSION));
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}

// =============================================================================
// Analyzer
// =============================================================================

enum Script {
    Succeed(Summary),
    Fail(String),
    Panic(String),
    Silent(Summary),
}

/// Analyzer with a fixed behaviour
pub struct ScriptedAnalyzer {
    script: Script,
}

impl ScriptedAnalyzer {
    /// Writes the contract files and returns `summary`
    pub fn succeeding(summary: Summary) -> Self {
        Self {
            script: Script::Succeed(summary),
        }
    }

    /// Writes the contract files, then returns an error
    pub fn failing(message: &str) -> Self {
        Self {
            script: Script::Fail(message.to_string()),
        }
    }

    /// Writes the contract files, then panics
    pub fn panicking(message: &str) -> Self {
        Self {
            script: Script::Panic(message.to_string()),
        }
    }

    /// Returns `summary` without writing anything
    pub fn silent(summary: Summary) -> Self {
        Self {
            script: Script::Silent(summary),
        }
    }
}

fn write_contract_files(output_dir: &Path, summary: &Summary) -> Result<()> {
    write_summary(output_dir, summary)?;
    write_event_table(&output_dir.join("rucks.csv"), &RUCK_COLUMNS)?;
    write_event_table(&output_dir.join("tackles.csv"), &TACKLE_COLUMNS)?;
    Ok(())
}

impl Analyzer for ScriptedAnalyzer {
    fn analyze(&self, _video_path: &Path, output_dir: &Path) -> Result<Summary> {
        match &self.script {
            Script::Succeed(summary) => {
                write_contract_files(output_dir, summary)?;
                Ok(summary.clone())
            }
            Script::Fail(message) => {
                write_contract_files(output_dir, &Summary::default())?;
                Err(anyhow!("{}", message))
            }
            Script::Panic(message) => {
                write_contract_files(output_dir, &Summary::default())?;
                panic!("{}", message);
            }
            Script::Silent(summary) => Ok(summary.clone()),
        }
    }
}
