//! Job queue
//!
//! Postgres-backed broker for asynchronous ingestion jobs. The
//! `ingest_jobs` table is the durable queue state: submission inserts
//! a pending row, workers claim with `FOR UPDATE SKIP LOCKED` (so no
//! two workers ever run the same job), and the claiming worker writes
//! the terminal state. No automatic retry and no re-queue: every job
//! kind is append-only or idempotent-by-replacement, so re-submission
//! is safe but deliberate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

/// The three job kinds accepted by the submission surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    IngestGeneExpressionData,
    AddMetadata,
    AddSampleMetadata,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::IngestGeneExpressionData => "ingest_gene_expression_data",
            JobKind::AddMetadata => "add_metadata",
            JobKind::AddSampleMetadata => "add_sample_metadata",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ingest_gene_expression_data" => Some(JobKind::IngestGeneExpressionData),
            "add_metadata" => Some(JobKind::AddMetadata),
            "add_sample_metadata" => Some(JobKind::AddSampleMetadata),
            _ => None,
        }
    }
}

/// Job lifecycle: pending -> running -> {succeeded, failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }
}

impl From<String> for JobState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "running" => JobState::Running,
            "succeeded" => JobState::Succeeded,
            "failed" => JobState::Failed,
            _ => JobState::Pending,
        }
    }
}

/// Payload for `ingest_gene_expression_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionJobPayload {
    /// Object key of the expression matrix in the configured bucket
    pub object_key: String,
}

/// Payload for `add_metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataJobPayload {
    /// Contact address forwarded to the registry
    pub email: String,
    /// Registry search expression
    pub query: String,
}

/// A claimed job, exclusively owned by one worker until terminal.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub kind: String,
    pub payload: Value,
}

/// Status view returned to pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: Uuid,
    pub kind: String,
    pub state: JobState,
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct JobStatusRow {
    id: Uuid,
    kind: String,
    status: String,
    result: Option<Value>,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// Handle on the broker. Cheap to clone; workers receive one at
/// construction instead of reaching for process-wide state.
#[derive(Clone)]
pub struct JobQueue {
    db: PgPool,
}

impl JobQueue {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Enqueue a job and return its id.
    pub async fn submit(&self, kind: JobKind, payload: Value) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO ingest_jobs (id, kind, payload, status)
            VALUES ($1, $2, $3, 'pending')
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(&payload)
        .execute(&self.db)
        .await?;

        debug!(job_id = %id, kind = kind.as_str(), "Job submitted");
        Ok(id)
    }

    /// Claim the oldest pending job, if any. The row-level lock plus
    /// SKIP LOCKED guarantees single-worker dispatch.
    pub async fn claim(&self) -> Result<Option<ClaimedJob>, sqlx::Error> {
        let row: Option<(Uuid, String, Value)> = sqlx::query_as(
            r#"
            UPDATE ingest_jobs
            SET status = 'running', started_at = NOW()
            WHERE id = (
                SELECT id FROM ingest_jobs
                WHERE status = 'pending'
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, kind, payload
            "#,
        )
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|(id, kind, payload)| ClaimedJob { id, kind, payload }))
    }

    /// Record a successful terminal state with its result payload.
    pub async fn complete(&self, id: Uuid, result: Value) -> Result<(), sqlx::Error> {
        self.finish(id, JobState::Succeeded, result).await
    }

    /// Record a failed terminal state with the diagnostic payload.
    pub async fn fail(&self, id: Uuid, result: Value) -> Result<(), sqlx::Error> {
        self.finish(id, JobState::Failed, result).await
    }

    async fn finish(&self, id: Uuid, state: JobState, result: Value) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET status = $2, result = $3, finished_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(state.as_str())
        .bind(&result)
        .execute(&self.db)
        .await?;

        debug!(job_id = %id, state = state.as_str(), "Job finished");
        Ok(())
    }

    /// Status lookup; `None` for an unknown id (the surface maps that
    /// to NotFound).
    pub async fn status(&self, id: Uuid) -> Result<Option<JobStatus>, sqlx::Error> {
        let row: Option<JobStatusRow> = sqlx::query_as(
            r#"
            SELECT id, kind, status, result, created_at, finished_at
            FROM ingest_jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| JobStatus {
            id: r.id,
            kind: r.kind,
            state: JobState::from(r.status),
            result: r.result,
            created_at: r.created_at,
            finished_at: r.finished_at,
        }))
    }

    /// Ask a running job to stop. Honored cooperatively: the pipeline
    /// checks before starting its next batch, never mid-batch.
    pub async fn request_cancel(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET cancel_requested = TRUE
            WHERE id = $1 AND status IN ('pending', 'running')
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Poll the cooperative-cancellation flag.
    pub async fn cancel_requested(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let requested: Option<bool> =
            sqlx::query_scalar("SELECT cancel_requested FROM ingest_jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;

        Ok(requested.unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            JobKind::IngestGeneExpressionData,
            JobKind::AddMetadata,
            JobKind::AddSampleMetadata,
        ] {
            assert_eq!(JobKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(JobKind::parse("reindex"), None);
    }

    #[test]
    fn test_state_from_string_defaults_to_pending() {
        assert_eq!(JobState::from("running".to_string()), JobState::Running);
        assert_eq!(JobState::from("failed".to_string()), JobState::Failed);
        assert_eq!(JobState::from("garbage".to_string()), JobState::Pending);
    }

    #[test]
    fn test_payload_serde() {
        let payload = ExpressionJobPayload {
            object_key: "compendia/GSE1.csv".to_string(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["object_key"], "compendia/GSE1.csv");

        let parsed: MetadataJobPayload = serde_json::from_value(serde_json::json!({
            "email": "curator@example.org",
            "query": "lung disease transcriptome"
        }))
        .unwrap();
        assert_eq!(parsed.query, "lung disease transcriptome");
    }
}
