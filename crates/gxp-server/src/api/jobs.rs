//! Job submission and polling handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use gxp_ingest::queue::{ExpressionJobPayload, MetadataJobPayload};
use gxp_ingest::JobKind;
use serde_json::json;
use uuid::Uuid;

use super::AppState;
use crate::db::{JobStatusResponse, QueuedJob};
use crate::error::{AppError, AppResult};

/// Submit an expression-data ingestion job for one object key.
pub async fn submit_expression(
    State(state): State<AppState>,
    Json(payload): Json<ExpressionJobPayload>,
) -> AppResult<(StatusCode, Json<QueuedJob>)> {
    if payload.object_key.trim().is_empty() {
        return Err(AppError::Validation("object_key is required".to_string()));
    }

    submit(&state, JobKind::IngestGeneExpressionData, json!(payload)).await
}

/// Submit a study-metadata ingestion job for one registry query.
pub async fn submit_metadata(
    State(state): State<AppState>,
    Json(payload): Json<MetadataJobPayload>,
) -> AppResult<(StatusCode, Json<QueuedJob>)> {
    if payload.email.trim().is_empty() {
        return Err(AppError::Validation("email is required".to_string()));
    }
    if payload.query.trim().is_empty() {
        return Err(AppError::Validation("query is required".to_string()));
    }

    submit(&state, JobKind::AddMetadata, json!(payload)).await
}

/// Submit a sample-metadata synchronization job.
pub async fn submit_sample_metadata(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<QueuedJob>)> {
    submit(&state, JobKind::AddSampleMetadata, json!({})).await
}

async fn submit(
    state: &AppState,
    kind: JobKind,
    payload: serde_json::Value,
) -> AppResult<(StatusCode, Json<QueuedJob>)> {
    let job_id = state.queue.submit(kind, payload).await?;

    tracing::info!(job_id = %job_id, kind = kind.as_str(), "Job accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedJob {
            job_id,
            kind: kind.as_str().to_string(),
        }),
    ))
}

/// Poll a job's state and result.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<JobStatusResponse>> {
    let status = state
        .queue
        .status(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("job {} not found", id)))?;

    Ok(Json(JobStatusResponse {
        job_id: status.id,
        kind: status.kind,
        state: status.state.as_str().to_string(),
        result: status.result,
        created_at: status.created_at,
        finished_at: status.finished_at,
    }))
}

/// Request cooperative cancellation; the worker stops before its next
/// batch.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let requested = state.queue.request_cancel(id).await?;

    if !requested {
        return Err(AppError::NotFound(format!(
            "job {} not found or already finished",
            id
        )));
    }

    Ok(Json(json!({ "job_id": id, "cancel_requested": true })))
}
