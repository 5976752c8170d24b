//! Route-level tests for the submission surface.
//!
//! These exercise validation and routing without a live database: the
//! pool is lazy and every asserted path rejects the request before a
//! query would run.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use gxp_server::api::{self, AppState};

fn test_app() -> axum::Router {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgresql://localhost/gxp-test")
        .expect("lazy pool");
    api::router(AppState::new(pool))
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn test_expression_submission_rejects_blank_object_key() {
    let response = test_app()
        .oneshot(post_json("/v1/data/expression", r#"{"object_key": "   "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expression_submission_rejects_missing_field() {
    let response = test_app()
        .oneshot(post_json("/v1/data/expression", r#"{"bucket": "wrong"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_metadata_submission_rejects_blank_query() {
    let response = test_app()
        .oneshot(post_json(
            "/v1/metadata",
            r#"{"email": "curator@example.org", "query": ""}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metadata_submission_rejects_blank_email() {
    let response = test_app()
        .oneshot(post_json(
            "/v1/metadata",
            r#"{"email": " ", "query": "airway transcriptome"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_job_status_rejects_malformed_id() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/v1/jobs/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/v1/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
