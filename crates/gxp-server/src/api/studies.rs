//! Study search/browse handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::db::{self, StudyRecord, StudySearch};
use crate::error::AppResult;

#[derive(Debug, Deserialize)]
pub struct HasDataFilter {
    /// Defaults to 1: browse lists only show studies with data.
    pub has_data: Option<i32>,
}

/// Search study metadata with the full filter set.
pub async fn search(
    State(state): State<AppState>,
    Json(search): Json<StudySearch>,
) -> AppResult<Json<Vec<StudyRecord>>> {
    let studies = db::search_studies(&state.db, &search).await?;
    Ok(Json(studies))
}

/// Distinct organisms available in the database.
pub async fn organisms(
    State(state): State<AppState>,
    Query(filter): Query<HasDataFilter>,
) -> AppResult<Json<Vec<String>>> {
    let organisms = db::list_organisms(&state.db, filter.has_data.unwrap_or(1)).await?;
    Ok(Json(organisms))
}

/// Distinct profiling methods available in the database.
pub async fn profiling_methods(
    State(state): State<AppState>,
    Query(filter): Query<HasDataFilter>,
) -> AppResult<Json<Vec<String>>> {
    let methods = db::list_profiling_methods(&state.db, filter.has_data.unwrap_or(1)).await?;
    Ok(Json(methods))
}
