//! Import job audit and reconciliation API
//!
//! GET /ingest/jobs, GET /ingest/jobs/:id, GET /ingest/reconcile

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::ImportJob;
use crate::services::{reconcile, ReconciliationReport};
use crate::AppState;

/// GET /ingest/jobs query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListQuery {
    pub dataset_name: String,
}

/// GET /ingest/reconcile query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileQuery {
    pub dataset_name: String,
    pub year: i32,
    pub observed_total: f64,
}

fn bad_query(rejection: QueryRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

/// GET /ingest/jobs?datasetName=
///
/// Jobs of one dataset, oldest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    query: Result<Query<JobListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ImportJob>>> {
    let Query(query) = query.map_err(bad_query)?;
    let jobs = state.jobs.list_by_dataset(&query.dataset_name).await?;
    Ok(Json(jobs))
}

/// GET /ingest/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<ImportJob>> {
    let job = state
        .jobs
        .get(job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Import job not found: {}", job_id)))?;
    Ok(Json(job))
}

/// GET /ingest/reconcile?datasetName=&year=&observedTotal=
pub async fn reconcile_dataset(
    State(state): State<AppState>,
    query: Result<Query<ReconcileQuery>, QueryRejection>,
) -> ApiResult<Json<ReconciliationReport>> {
    let Query(query) = query.map_err(bad_query)?;
    if !query.observed_total.is_finite() {
        return Err(ApiError::BadRequest("observedTotal must be finite".to_string()));
    }

    let report = reconcile(
        state.records.as_ref(),
        state.jobs.as_ref(),
        &query.dataset_name,
        query.year,
        query.observed_total,
    )
    .await?;
    Ok(Json(report))
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/ingest/jobs", get(list_jobs))
        .route("/ingest/jobs/:id", get(get_job))
        .route("/ingest/reconcile", get(reconcile_dataset))
}
