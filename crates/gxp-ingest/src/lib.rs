//! GXP ingestion pipeline
//!
//! Task-queue-driven workers that pull gene-expression matrices from
//! object storage and study/sample metadata from the remote registry,
//! turn them into relational rows, and commit them in bounded-size
//! batches, with a derived-state reconciliation step at the end of
//! expression ingestion.
//!
//! # Architecture
//!
//! - **queue**: Postgres-backed job broker (submit/claim/status)
//! - **worker**: claims jobs and runs the pipeline for the job kind,
//!   each job owning one database session for its lifetime
//! - **storage**: S3 object store client
//! - **source**: streaming CSV decode of remote expression matrices
//! - **batch** / **loader**: bounded batching and one-transaction
//!   bulk inserts
//! - **registry**: registry queries, docsum parsing, study linking
//! - **pipelines**: per-job-kind wiring of the components
//! - **reconcile**: recomputes the `has_data` flag on studies

pub mod batch;
pub mod config;
pub mod loader;
pub mod models;
pub mod pipelines;
pub mod queue;
pub mod reconcile;
pub mod registry;
pub mod source;
pub mod storage;
pub mod worker;

pub use config::IngestConfig;
pub use queue::{JobKind, JobQueue, JobState};
pub use worker::Worker;
