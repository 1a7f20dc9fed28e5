//! Storage seams for the ingest pipeline
//!
//! The commit engine talks to storage only through [`RecordStore`] and
//! [`ImportJobStore`], so tests can substitute faulting or instrumented
//! implementations. The SQLite implementations live in [`records`] and
//! [`import_jobs`].

pub mod import_jobs;
pub mod records;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use emis_common::{DatasetVersion, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{CanonicalRow, ImportJob, NaturalKey, Scope};

pub use import_jobs::SqliteImportJobStore;
pub use records::SqliteRecordStore;

/// A canonical row as persisted, with provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: i64,
    pub facility_name: String,
    pub year: i32,
    pub month: Option<u8>,
    pub co2e_tonnes: f64,
    pub scope: Option<Scope>,
    pub source: String,
    pub method: Option<String>,
    pub dataset_version: DatasetVersion,
    pub dataset_name: Option<String>,
    pub import_job_id: Uuid,
    pub row_index: usize,
    pub is_current: bool,
    pub superseded_by_job: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// One row write issued by the commit engine
#[derive(Debug, Clone, Copy)]
pub struct RecordWrite<'a> {
    pub row: &'a CanonicalRow,
    pub key: &'a NaturalKey,
    pub dataset_name: Option<&'a str>,
    pub job_id: Uuid,
    pub row_index: usize,
}

/// Sum of current rows for one dataset and year
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetTotals {
    pub row_count: usize,
    pub co2e_tonnes: f64,
}

/// Versioned canonical row store
///
/// Writes are compare-and-swap operations: each returns `Ok(false)` when the
/// expected state no longer holds (another writer won), never a partial write.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Current row for a natural key, if any
    async fn fetch_current(&self, key: &NaturalKey) -> Result<Option<StoredRecord>>;

    /// Insert as the current row; `false` if a current row already exists
    async fn insert_if_absent(&self, write: RecordWrite<'_>) -> Result<bool>;

    /// Supersede `expected` and insert the new current row atomically;
    /// `false` if `expected` is no longer the current row
    async fn replace_current(&self, expected: &StoredRecord, write: RecordWrite<'_>) -> Result<bool>;

    /// Every row ever stored for a key (superseded and current), oldest first
    async fn history(&self, key: &NaturalKey) -> Result<Vec<StoredRecord>>;

    /// Totals of current rows committed under `dataset_name` for `year`
    async fn current_totals(&self, dataset_name: &str, year: i32) -> Result<DatasetTotals>;
}

/// Append-only audit trail of import jobs
#[async_trait]
pub trait ImportJobStore: Send + Sync {
    async fn record(&self, job: &ImportJob) -> Result<()>;

    /// Jobs of a dataset, oldest first
    async fn list_by_dataset(&self, dataset_name: &str) -> Result<Vec<ImportJob>>;

    async fn get(&self, id: Uuid) -> Result<Option<ImportJob>>;
}
