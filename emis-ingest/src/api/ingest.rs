//! Ingest API handlers
//!
//! POST /ingest/preview, POST /ingest/commit
//!
//! Both take a multipart upload. When the request carries no `mapping`
//! part, the mapping is derived from the detected adapter, so preview and
//! commit of the same file always agree.

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use emis_common::DatasetVersion;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult};
use crate::models::{Adapter, DuplicatePolicy, HeaderMapping};
use crate::services::{
    parse_delimited, preview, signature_matcher, CommitRequest, CommitSummary, HeaderMapper,
    ParsedFile, PreviewReport, RowValidator,
};
use crate::AppState;

/// Multipart parts shared by preview and commit
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    mapping: Option<String>,
    dataset_version: Option<String>,
    dataset_name: Option<String>,
    duplicate_policy: Option<String>,
}

impl UploadForm {
    fn take_file(&mut self) -> ApiResult<Vec<u8>> {
        self.file
            .take()
            .ok_or_else(|| ApiError::BadRequest("multipart part \"file\" is required".to_string()))
    }
}

/// Blank text parts count as absent
fn non_blank(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn read_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => form.file = Some(field.bytes().await?.to_vec()),
            "mapping" => form.mapping = non_blank(field.text().await?),
            "datasetVersion" => form.dataset_version = non_blank(field.text().await?),
            "datasetName" => form.dataset_name = non_blank(field.text().await?),
            "duplicatePolicy" => form.duplicate_policy = non_blank(field.text().await?),
            other => tracing::debug!(part = other, "Ignoring unknown multipart part"),
        }
    }

    Ok(form)
}

/// Detect the adapter and settle the mapping for a parsed file
fn resolve_mapping(parsed: &ParsedFile, mapping_json: Option<&str>) -> ApiResult<(Adapter, HeaderMapping)> {
    let adapter = signature_matcher::detect(&parsed.headers);
    let mapping = match mapping_json {
        Some(json) => serde_json::from_str::<HeaderMapping>(json)
            .map_err(|e| ApiError::BadRequest(format!("mapping is not a valid column mapping: {}", e)))?,
        None => HeaderMapper::derive_default(adapter, &parsed.headers),
    };
    Ok((adapter, mapping))
}

/// POST /ingest/preview
///
/// Dry run over the upload. Nothing is persisted.
pub async fn preview_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<PreviewReport>> {
    let mut form = read_form(multipart).await?;
    let file = form.take_file()?;

    let parsed = parse_delimited(&file)?;
    let (adapter, mapping) = resolve_mapping(&parsed, form.mapping.as_deref())?;
    let version = DatasetVersion::new(form.dataset_version.unwrap_or_default());
    let validator = RowValidator::new(
        adapter,
        &parsed.headers,
        &mapping,
        version,
        state.engine.rules(),
    )?;

    let report = preview(&parsed, &validator, mapping, state.preview_options());

    tracing::info!(
        adapter = adapter.as_str(),
        checked = report.preview_stats.checked,
        ok = report.preview_stats.ok,
        problem_count = report.preview_stats.problem_count,
        "Preview served"
    );

    Ok(Json(report))
}

/// POST /ingest/commit
///
/// The engine runs on its own task. If the client disconnects, the drop
/// guard cancels the token and the engine stops at the next row boundary.
pub async fn commit_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<CommitSummary>> {
    let mut form = read_form(multipart).await?;
    let file = form.take_file()?;

    let dataset_version = form
        .dataset_version
        .take()
        .map(DatasetVersion::new)
        .ok_or_else(|| ApiError::BadRequest("datasetVersion is required".to_string()))?;
    let duplicate_policy = form
        .duplicate_policy
        .take()
        .ok_or_else(|| ApiError::BadRequest("duplicatePolicy is required".to_string()))?
        .parse::<DuplicatePolicy>()
        .map_err(ApiError::BadRequest)?;

    let parsed = parse_delimited(&file)?;
    drop(file);
    let (adapter, mapping) = resolve_mapping(&parsed, form.mapping.as_deref())?;

    let request = CommitRequest {
        adapter,
        mapping,
        dataset_version,
        dataset_name: form.dataset_name.take(),
        duplicate_policy,
    };

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let engine = state.engine.clone();

    let handle = tokio::spawn(async move { engine.commit(&parsed, request, &cancel).await });
    let result = handle
        .await
        .map_err(|e| ApiError::Internal(format!("Commit task failed: {}", e)))?;
    guard.disarm();

    let job = result?;
    Ok(Json(CommitSummary::from(&job)))
}

/// Build ingest routes
pub fn ingest_routes() -> Router<AppState> {
    Router::new()
        .route("/ingest/preview", post(preview_upload))
        .route("/ingest/commit", post(commit_upload))
}
