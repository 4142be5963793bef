//! Tryline Worker
//!
//! A single-job-at-a-time worker that turns queued rugby video analysis
//! jobs into uploaded results.
//!
//! Architecture:
//! - Configuration: Load settings from the environment
//! - Repositories: HTTP access to the job table, object storage and remote media
//! - Services: Claim protocol, artifact transfer, isolated analysis
//! - Scheduler: Job polling and the per-job pipeline
//!
//! Any number of workers may share one job table; the conditional claim is
//! the only coordination between them.

mod config;
mod repository;
mod scheduler;
mod service;
#[cfg(test)]
mod testing;
mod workspace;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, UrlFetcher};
use crate::repository::{
    HttpJobRepository, HttpMediaFetcher, HttpStorageRepository, MediaFetcher, YtDlpFetcher,
};
use crate::scheduler::{JobPipeline, JobPoller};
use crate::service::{AnalysisInvoker, ArtifactTransfer, JobStore, PlaceholderAnalyzer};
use tryline_client::BackendClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tryline_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tryline Worker");

    // Missing credentials end the process here, before any polling
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;

    info!("Backend: {}", config.backend_url);
    info!(
        "Buckets: videos={}, results={}",
        config.videos_bucket, config.results_bucket
    );
    info!(
        "Poll interval: {:?}, workspace root: {}",
        config.poll_interval,
        config.work_dir.display()
    );

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.work_dir.display()))?;

    // Initialize backend client; storage transfers run without a deadline
    let client = Arc::new(
        BackendClient::new(config.backend_url.clone(), config.service_key.clone())
            .with_table_timeout(config.http_timeout),
    );

    info!("Backend client initialized");

    // Initialize services
    let store = Arc::new(JobStore::new(Arc::new(HttpJobRepository::new(Arc::clone(
        &client,
    )))));

    let media: Arc<dyn MediaFetcher> = match config.url_fetcher {
        UrlFetcher::YtDlp => Arc::new(YtDlpFetcher::new(config.yt_dlp_path.clone())),
        // No overall timeout for video downloads
        UrlFetcher::Http => Arc::new(HttpMediaFetcher::new(reqwest::Client::new())),
    };
    info!("URL fetcher: {:?}", config.url_fetcher);

    let transfer = ArtifactTransfer::new(
        Arc::new(HttpStorageRepository::new(Arc::clone(&client))),
        media,
        config.videos_bucket.clone(),
        config.results_bucket.clone(),
    );
    let invoker = AnalysisInvoker::new(Arc::new(PlaceholderAnalyzer));

    let pipeline = Arc::new(JobPipeline::new(
        Arc::clone(&store),
        transfer,
        invoker,
        config.work_dir.clone(),
    ));

    info!("Services initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown requested, finishing current job");
        let _ = shutdown_tx.send(true);
    });

    let poller = JobPoller::new(store, pipeline, config.poll_interval, shutdown_rx);

    info!("Worker initialized successfully");
    poller.run().await;

    info!("Worker stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
