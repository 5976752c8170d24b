//! GXP Worker - ingestion worker process
//!
//! Pulls jobs from the shared broker queue and runs the ingestion
//! pipeline for each. Multiple worker processes may point at the same
//! database; the claim query keeps dispatch exclusive.

use anyhow::{Context, Result};
use clap::Parser;
use gxp_common::logging::{init_logging, LogConfig};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

use gxp_ingest::registry::{RegistryClient, RegistryConfig};
use gxp_ingest::storage::{Storage, StorageConfig};
use gxp_ingest::{IngestConfig, JobQueue, Worker};

#[derive(Parser, Debug)]
#[command(name = "gxp-worker")]
#[command(author, version, about = "GXP ingestion worker")]
struct Cli {
    /// Number of concurrent workers (overrides INGEST_WORKERS)
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env()
        .unwrap_or_default()
        .with_prefix("gxp-worker")
        .with_directives("gxp_ingest=debug,sqlx=warn");
    init_logging(&log_config)?;

    info!("Starting GXP worker");

    let mut config = IngestConfig::from_env()?;
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    config.validate()?;

    let db = PgPoolOptions::new()
        // One broker connection per worker plus one session per
        // in-flight job.
        .max_connections((config.workers * 2 + 2) as u32)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Database connection pool established");

    let storage = Storage::new(StorageConfig::from_env()?);

    let registry_config = RegistryConfig::from_env()?;
    let registry_email = registry_config.email.clone();
    let registry = RegistryClient::new(registry_config)?;

    let queue = JobQueue::new(db.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(config.workers);
    for index in 0..config.workers {
        let worker = Worker::new(
            index,
            queue.clone(),
            db.clone(),
            storage.clone(),
            registry.clone(),
            registry_email.clone(),
            config.clone(),
        );
        let shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move { worker.run(shutdown).await }));
    }

    info!(workers = config.workers, "Workers started");

    shutdown_signal().await;
    info!("Shutdown signal received; waiting for in-flight jobs");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }

    info!("GXP worker shut down");
    Ok(())
}

/// Resolve on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
