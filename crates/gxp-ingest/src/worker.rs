//! Ingestion worker
//!
//! Claims jobs from the queue and runs the pipeline for the job kind.
//! A worker processes one job at a time to completion; the job owns a
//! dedicated pooled connection (its database session) for its whole
//! lifetime, and the queue handle plus session factory arrive at
//! construction; there is no process-wide broker state.

use gxp_common::IngestError;
use serde_json::{json, Value};
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::IngestConfig;
use crate::loader::classify_db_error;
use crate::pipelines;
use crate::queue::{
    ClaimedJob, ExpressionJobPayload, JobKind, JobQueue, MetadataJobPayload,
};
use crate::registry::RegistryClient;
use crate::source::ExpressionSource;
use crate::storage::Storage;

/// Result of executing one claimed job.
struct JobOutcome {
    result: Value,
    cancelled: bool,
}

/// One worker loop. Spawn several for parallel job throughput; jobs
/// themselves never share a session.
pub struct Worker {
    index: usize,
    queue: JobQueue,
    db: PgPool,
    storage: Storage,
    registry: RegistryClient,
    registry_email: String,
    config: IngestConfig,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        queue: JobQueue,
        db: PgPool,
        storage: Storage,
        registry: RegistryClient,
        registry_email: String,
        config: IngestConfig,
    ) -> Self {
        Self {
            index,
            queue,
            db,
            storage,
            registry,
            registry_email,
            config,
        }
    }

    /// Poll-claim-execute until shutdown flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(worker = self.index, "Worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.queue.claim().await {
                Ok(Some(job)) => self.process(job).await,
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval()) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) => {
                    error!(worker = self.index, error = %e, "Failed to poll queue");
                    tokio::time::sleep(self.config.poll_interval()).await;
                }
            }
        }

        info!(worker = self.index, "Worker stopped");
    }

    /// Run one job to a terminal state. Jobs may block on remote I/O
    /// for minutes; the configured job timeout bounds a stalled source.
    async fn process(&self, job: ClaimedJob) {
        info!(worker = self.index, job_id = %job.id, kind = %job.kind, "Job claimed");

        let terminal = match tokio::time::timeout(self.config.job_timeout(), self.execute(&job))
            .await
        {
            Ok(Ok(outcome)) if outcome.cancelled => {
                warn!(job_id = %job.id, "Job cancelled");
                self.queue
                    .fail(
                        job.id,
                        json!({
                            "error": "cancelled",
                            "message": "cancel requested; job stopped before its next batch",
                            "partial": outcome.result,
                        }),
                    )
                    .await
            }
            Ok(Ok(outcome)) => {
                info!(job_id = %job.id, "Job succeeded");
                self.queue.complete(job.id, outcome.result).await
            }
            Ok(Err(e)) => {
                warn!(job_id = %job.id, error = %e, "Job failed");
                self.queue.fail(job.id, e.to_result_payload()).await
            }
            Err(_) => {
                warn!(job_id = %job.id, "Job timed out");
                self.queue
                    .fail(
                        job.id,
                        json!({
                            "error": "timeout",
                            "message": format!(
                                "job exceeded the {}s budget and was abandoned",
                                self.config.job_timeout_secs
                            ),
                        }),
                    )
                    .await
            }
        };

        if let Err(e) = terminal {
            // The broker row keeps whatever state it last had; the
            // next poller sees a running job that never finishes.
            error!(job_id = %job.id, error = %e, "Failed to record terminal job state");
        }
    }

    async fn execute(&self, job: &ClaimedJob) -> Result<JobOutcome, IngestError> {
        let kind = JobKind::parse(&job.kind)
            .ok_or_else(|| IngestError::Decode(format!("unknown job kind: {}", job.kind)))?;

        // The job's session: one connection, exclusively held until
        // the job reaches a terminal state.
        let mut session = self.db.acquire().await.map_err(classify_db_error)?;

        match kind {
            JobKind::IngestGeneExpressionData => {
                let payload: ExpressionJobPayload = decode_payload(&job.payload)?;
                let source = ExpressionSource::new(self.storage.clone(), self.config.io_timeout());
                let report = pipelines::expression::run(
                    &mut session,
                    &source,
                    &self.queue,
                    job.id,
                    &payload.object_key,
                    self.config.batch_size,
                )
                .await?;

                Ok(JobOutcome {
                    cancelled: report.cancelled,
                    result: report.to_result_payload(),
                })
            }
            JobKind::AddMetadata => {
                let payload: MetadataJobPayload = decode_payload(&job.payload)?;
                let report = pipelines::metadata::run(
                    &mut session,
                    &self.registry,
                    &payload.email,
                    &payload.query,
                )
                .await?;

                Ok(JobOutcome {
                    cancelled: false,
                    result: report.to_result_payload(),
                })
            }
            JobKind::AddSampleMetadata => {
                let report = pipelines::samples::run(
                    &mut session,
                    &self.registry,
                    &self.registry_email,
                    self.config.batch_size,
                )
                .await?;

                Ok(JobOutcome {
                    cancelled: false,
                    result: report.to_result_payload(),
                })
            }
        }
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(payload: &Value) -> Result<T, IngestError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| IngestError::Decode(format!("invalid job payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_payload_reports_missing_fields() {
        let err =
            decode_payload::<ExpressionJobPayload>(&json!({"bucket": "wrong"})).unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));
        assert!(err.to_string().contains("invalid job payload"));
    }

    #[test]
    fn test_decode_payload_accepts_valid_payload() {
        let payload: ExpressionJobPayload =
            decode_payload(&json!({"object_key": "compendia/GSE1.csv"})).unwrap();
        assert_eq!(payload.object_key, "compendia/GSE1.csv");
    }
}
