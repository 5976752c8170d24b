//! Gene-expression ingestion pipeline
//!
//! Streams the remote object row-by-row, commits bounded batches in
//! source order, then reconciles the derived `has_data` flags. Within
//! one job, batches commit strictly in input order; atomicity is per
//! batch, so an insert failure leaves earlier batches committed and
//! the job failed.

use futures::StreamExt;
use gxp_common::IngestError;
use serde_json::{json, Value};
use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::BatchBuffer;
use crate::loader::{self, classify_db_error};
use crate::models::ExpressionRow;
use crate::queue::JobQueue;
use crate::reconcile;
use crate::source::ExpressionSource;

/// Outcome of one expression-ingestion run.
#[derive(Debug, Clone)]
pub struct ExpressionReport {
    pub object_key: String,
    pub rows_loaded: u64,
    pub batches_committed: u32,
    pub studies_flagged: u64,
    /// Set when a cancel request stopped the job between batches
    pub cancelled: bool,
}

impl ExpressionReport {
    pub fn to_result_payload(&self) -> Value {
        json!({
            "status": if self.cancelled { "cancelled" } else { "ok" },
            "object_key": self.object_key,
            "rows_loaded": self.rows_loaded,
            "batches_committed": self.batches_committed,
            "studies_flagged": self.studies_flagged,
        })
    }
}

pub async fn run(
    conn: &mut PgConnection,
    source: &ExpressionSource,
    queue: &JobQueue,
    job_id: Uuid,
    object_key: &str,
    batch_size: usize,
) -> Result<ExpressionReport, IngestError> {
    info!(job_id = %job_id, object_key = %object_key, batch_size, "Starting expression ingestion");

    let stream = source.rows(object_key).await?;
    futures::pin_mut!(stream);

    let mut buffer = BatchBuffer::new(batch_size);
    let mut report = ExpressionReport {
        object_key: object_key.to_string(),
        rows_loaded: 0,
        batches_committed: 0,
        studies_flagged: 0,
        cancelled: false,
    };

    while let Some(row) = stream.next().await {
        let row: ExpressionRow = row?;

        if let Some(batch) = buffer.accept(row) {
            if cancel_requested(queue, job_id).await? {
                warn!(job_id = %job_id, "Cancel requested; stopping before next batch");
                report.cancelled = true;
                return Ok(report);
            }

            report.rows_loaded += loader::insert_expression(conn, &batch).await?;
            report.batches_committed += 1;
            info!(
                job_id = %job_id,
                batch = report.batches_committed,
                total_rows = report.rows_loaded,
                "Batch committed"
            );
        }
    }

    // The final partial batch must never be dropped.
    let remainder = buffer.flush();
    if !remainder.is_empty() {
        if cancel_requested(queue, job_id).await? {
            warn!(job_id = %job_id, "Cancel requested; stopping before final batch");
            report.cancelled = true;
            return Ok(report);
        }
        report.rows_loaded += loader::insert_expression(conn, &remainder).await?;
        report.batches_committed += 1;
    }

    report.studies_flagged = reconcile::mark_studies_with_data(conn).await?;

    info!(
        job_id = %job_id,
        rows_loaded = report.rows_loaded,
        batches = report.batches_committed,
        studies_flagged = report.studies_flagged,
        "Expression ingestion completed"
    );
    Ok(report)
}

async fn cancel_requested(queue: &JobQueue, job_id: Uuid) -> Result<bool, IngestError> {
    queue.cancel_requested(job_id).await.map_err(classify_db_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_payload_ok() {
        let report = ExpressionReport {
            object_key: "compendia/GSE1.csv".into(),
            rows_loaded: 3,
            batches_committed: 1,
            studies_flagged: 1,
            cancelled: false,
        };
        let payload = report.to_result_payload();
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["rows_loaded"], 3);
        assert_eq!(payload["studies_flagged"], 1);
    }

    #[test]
    fn test_report_payload_cancelled() {
        let report = ExpressionReport {
            object_key: "compendia/GSE1.csv".into(),
            rows_loaded: 500_000,
            batches_committed: 2,
            studies_flagged: 0,
            cancelled: true,
        };
        assert_eq!(report.to_result_payload()["status"], "cancelled");
    }
}
