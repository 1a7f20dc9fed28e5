//! emis-ingest library interface
//!
//! Exposes the pipeline and the HTTP router for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, CommitError, IngestError};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use emis_common::config::IngestSettings;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::db::{ImportJobStore, RecordStore, SqliteImportJobStore, SqliteRecordStore};
use crate::services::{ColumnSuggester, CommitEngine, HeaderMapper, PreviewOptions};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub mapper: Arc<HeaderMapper>,
    pub engine: Arc<CommitEngine>,
    pub records: Arc<dyn RecordStore>,
    pub jobs: Arc<dyn ImportJobStore>,
    pub settings: IngestSettings,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, settings: IngestSettings, suggester: Arc<dyn ColumnSuggester>) -> Self {
        let records: Arc<dyn RecordStore> =
            Arc::new(SqliteRecordStore::new(db.clone(), settings.max_lock_wait_ms));
        let jobs: Arc<dyn ImportJobStore> =
            Arc::new(SqliteImportJobStore::new(db.clone(), settings.max_lock_wait_ms));
        Self::with_stores(db, settings, suggester, records, jobs)
    }

    /// State over caller-supplied stores
    pub fn with_stores(
        db: SqlitePool,
        settings: IngestSettings,
        suggester: Arc<dyn ColumnSuggester>,
        records: Arc<dyn RecordStore>,
        jobs: Arc<dyn ImportJobStore>,
    ) -> Self {
        let engine = CommitEngine::new(records.clone(), jobs.clone());
        Self {
            db,
            mapper: Arc::new(HeaderMapper::new(suggester)),
            engine: Arc::new(engine),
            records,
            jobs,
            settings,
            startup_time: Utc::now(),
        }
    }

    pub fn preview_options(&self) -> PreviewOptions {
        PreviewOptions {
            problem_cap: self.settings.problem_cap,
            sample_rows: self.settings.preview_sample_rows,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings.max_upload_bytes;

    Router::new()
        .merge(api::ingest_routes())
        .merge(api::mapping_routes())
        .merge(api::job_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
