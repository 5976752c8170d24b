//! Sample-metadata synchronizer
//!
//! For every study the registry linker resolved to a series, fetches
//! the per-sample metadata and bulk-inserts it. The "needing" predicate
//! is a non-empty external id (the linking output), not the absence of
//! existing sample rows, so re-running the job can insert duplicate
//! rows for studies that were already synchronized.

use gxp_common::IngestError;
use serde_json::{json, Value};
use sqlx::PgConnection;
use tracing::{debug, info};

use crate::batch::BatchBuffer;
use crate::loader::{self, classify_db_error};
use crate::registry::RegistryClient;

/// Outcome of one sample-synchronization run.
#[derive(Debug, Clone)]
pub struct SampleSyncReport {
    pub studies_considered: usize,
    pub studies_synced: usize,
    pub studies_without_samples: usize,
    pub rows_inserted: u64,
}

impl SampleSyncReport {
    pub fn to_result_payload(&self) -> Value {
        json!({
            "status": "ok",
            "studies_considered": self.studies_considered,
            "studies_synced": self.studies_synced,
            "studies_without_samples": self.studies_without_samples,
            "rows_inserted": self.rows_inserted,
        })
    }
}

/// Studies eligible for sample synchronization: those the linker gave
/// a non-empty external series accession.
pub async fn list_studies_needing_sample_metadata(
    conn: &mut PgConnection,
) -> Result<Vec<String>, IngestError> {
    sqlx::query_scalar(
        r#"
        SELECT DISTINCT external_db_id
        FROM studies
        WHERE external_db_id IS NOT NULL AND external_db_id <> ''
        ORDER BY external_db_id
        "#,
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(classify_db_error)
}

/// An empty candidate list is a reported precondition failure, not a
/// success and not a crash: there is nothing to synchronize until
/// study metadata has been ingested.
pub fn require_candidates(ids: Vec<String>) -> Result<Vec<String>, IngestError> {
    if ids.is_empty() {
        Err(IngestError::PreconditionFailed(
            "no series accessions found in the study table; ingest study metadata to continue"
                .to_string(),
        ))
    } else {
        Ok(ids)
    }
}

pub async fn run(
    conn: &mut PgConnection,
    registry: &RegistryClient,
    email: &str,
    batch_size: usize,
) -> Result<SampleSyncReport, IngestError> {
    let candidates = require_candidates(list_studies_needing_sample_metadata(conn).await?)?;
    info!(candidates = candidates.len(), "Starting sample-metadata sync");

    let mut report = SampleSyncReport {
        studies_considered: candidates.len(),
        studies_synced: 0,
        studies_without_samples: 0,
        rows_inserted: 0,
    };

    for accession in &candidates {
        let rows = registry.fetch_sample_metadata(email, accession).await?;
        if rows.is_empty() {
            debug!(series = %accession, "Series has no sample metadata");
            report.studies_without_samples += 1;
            continue;
        }

        let mut buffer = BatchBuffer::new(batch_size);
        for row in rows {
            if let Some(batch) = buffer.accept(row) {
                report.rows_inserted += loader::insert_samples(conn, &batch).await?;
            }
        }
        let remainder = buffer.flush();
        if !remainder.is_empty() {
            report.rows_inserted += loader::insert_samples(conn, &remainder).await?;
        }

        report.studies_synced += 1;
        debug!(series = %accession, "Sample metadata loaded");
    }

    info!(
        synced = report.studies_synced,
        skipped = report.studies_without_samples,
        rows = report.rows_inserted,
        "Sample-metadata sync completed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_candidate_list_is_precondition_failure() {
        let err = require_candidates(Vec::new()).unwrap_err();
        assert!(matches!(err, IngestError::PreconditionFailed(_)));
        assert!(err.to_string().contains("ingest study metadata"));
    }

    #[test]
    fn test_non_empty_candidates_pass_through() {
        let ids = vec!["GSE1".to_string(), "GSE2".to_string()];
        assert_eq!(require_candidates(ids.clone()).unwrap(), ids);
    }

    #[test]
    fn test_report_payload() {
        let report = SampleSyncReport {
            studies_considered: 3,
            studies_synced: 2,
            studies_without_samples: 1,
            rows_inserted: 48,
        };
        let payload = report.to_result_payload();
        assert_eq!(payload["studies_synced"], 2);
        assert_eq!(payload["rows_inserted"], 48);
    }
}
