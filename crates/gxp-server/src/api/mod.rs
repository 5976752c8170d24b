//! HTTP routes
//!
//! Submission and polling for ingestion jobs, plus the study
//! search/browse queries. Handlers validate, enqueue or query, and
//! shape the response; they never run pipeline work inline.

pub mod jobs;
pub mod studies;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use gxp_ingest::JobQueue;
use serde_json::json;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsConfig;

/// Shared handler state: the pool for read queries and the queue
/// handle for submissions.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: JobQueue,
}

impl AppState {
    pub fn new(db: PgPool) -> Self {
        let queue = JobQueue::new(db.clone());
        Self { db, queue }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/data/expression", post(jobs::submit_expression))
        .route("/v1/metadata", post(jobs::submit_metadata))
        .route("/v1/metadata/samples", post(jobs::submit_sample_metadata))
        .route("/v1/jobs/:id", get(jobs::get_job_status))
        .route("/v1/jobs/:id/cancel", post(jobs::cancel_job))
        .route("/v1/studies/search", post(studies::search))
        .route("/v1/studies/organisms", get(studies::organisms))
        .route("/v1/studies/profiling-methods", get(studies::profiling_methods))
        .with_state(state)
}

/// Permissive-by-configuration CORS layer.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}

/// Health probe with a database connectivity check.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "connected" })),
        ),
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "database": "unreachable" })),
            )
        }
    }
}
