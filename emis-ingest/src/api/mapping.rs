//! Assisted column mapping
//!
//! POST /ai/map-columns

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::models::HeaderMapping;
use crate::AppState;

/// POST /ai/map-columns request
#[derive(Debug, Deserialize)]
pub struct MapColumnsRequest {
    pub headers: Vec<String>,
}

/// POST /ai/map-columns
///
/// Always 200: a failing suggester yields an all-null mapping with a note.
pub async fn map_columns(
    State(state): State<AppState>,
    Json(request): Json<MapColumnsRequest>,
) -> Json<HeaderMapping> {
    let mapping = state.mapper.suggest(&request.headers).await;

    tracing::info!(
        suggester = state.mapper.suggester_name(),
        headers = request.headers.len(),
        assigned = mapping.mapping.values().filter(|t| t.field().is_some()).count(),
        "Column mapping suggested"
    );

    Json(mapping)
}

/// Build mapping routes
pub fn mapping_routes() -> Router<AppState> {
    Router::new().route("/ai/map-columns", post(map_columns))
}
