//! Error types for emis-ingest
//!
//! - [`IngestError`]: whole-request rejections raised before any row is processed
//! - [`CommitError`]: commit failures, carrying the audit record when rows may
//!   already have been written
//! - [`ApiError`]: HTTP-facing error with a JSON envelope

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CanonicalField, ImportJob};

/// Fatal, request-level ingestion errors
#[derive(Debug, Error)]
pub enum IngestError {
    /// The upload is not well-formed delimited text
    #[error("File is not well-formed delimited text: {0}")]
    Parse(String),

    /// Required canonical fields have no column assigned
    #[error("Required fields are not mapped: {}", join_fields(.missing))]
    SchemaMismatch { missing: Vec<CanonicalField> },

    /// One canonical field assigned to several columns of the file
    #[error("Field {field} is assigned to more than one column: {}", .headers.join(", "))]
    DuplicateAssignment {
        field: CanonicalField,
        headers: Vec<String>,
    },
}

fn join_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Commit failures
#[derive(Debug, Error)]
pub enum CommitError {
    /// Rejected before any row was processed; nothing written, no job recorded
    #[error(transparent)]
    Rejected(#[from] IngestError),

    /// A write failed; earlier rows stand and an incomplete job was recorded
    #[error("Commit stopped by storage fault after row {:?}: {source}", .job.last_processed_row_index)]
    StorageFault {
        job: Box<ImportJob>,
        #[source]
        source: emis_common::Error,
    },

    /// Cancelled by the caller; earlier rows stand and a cancelled job was recorded
    #[error("Commit cancelled after row {:?}", .job.last_processed_row_index)]
    Cancelled { job: Box<ImportJob> },

    /// Rows were processed but the audit record could not be written
    #[error("Failed to record import job {job_id}: {source}")]
    AuditWrite {
        job_id: Uuid,
        #[source]
        source: emis_common::Error,
    },
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload exceeds the configured limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Ingestion rejected the file as a whole
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Commit failed part-way or could not be recorded
    #[error(transparent)]
    Commit(CommitError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// emis-common error
    #[error("Common error: {0}")]
    Common(#[from] emis_common::Error),
}

impl From<CommitError> for ApiError {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::Rejected(inner) => ApiError::Ingest(inner),
            other => ApiError::Commit(other),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

fn job_details(job: &ImportJob) -> Value {
    json!({
        "importJobId": job.id,
        "status": job.status,
        "lastProcessedRowIndex": job.last_processed_row_index,
        "rowsTotal": job.rows_total,
        "rowsImported": job.rows_imported,
        "rowsSkipped": job.rows_skipped,
        "duplicates": job.duplicates,
        "invalid": job.invalid,
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_code, details) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
            ApiError::PayloadTooLarge(_) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", None)
            }
            ApiError::Ingest(IngestError::Parse(_)) => {
                (StatusCode::BAD_REQUEST, "PARSE_ERROR", None)
            }
            ApiError::Ingest(IngestError::SchemaMismatch { missing }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "SCHEMA_MISMATCH",
                Some(json!({ "missingFields": missing })),
            ),
            ApiError::Ingest(IngestError::DuplicateAssignment { field, headers }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "DUPLICATE_ASSIGNMENT",
                Some(json!({ "field": field, "headers": headers })),
            ),
            ApiError::Commit(CommitError::StorageFault { job, .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PARTIAL_COMMIT",
                Some(job_details(job)),
            ),
            ApiError::Commit(CommitError::Cancelled { job }) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "COMMIT_CANCELLED",
                Some(job_details(job)),
            ),
            ApiError::Commit(CommitError::AuditWrite { job_id, .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUDIT_WRITE_FAILED",
                Some(json!({ "importJobId": job_id })),
            ),
            ApiError::Commit(CommitError::Rejected(_)) => {
                (StatusCode::BAD_REQUEST, "REJECTED", None)
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None),
            ApiError::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", None),
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
