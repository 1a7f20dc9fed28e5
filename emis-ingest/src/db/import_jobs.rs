//! Import job audit store
//!
//! Insert-only: the table itself rejects UPDATE and DELETE via triggers.

use async_trait::async_trait;
use chrono::Utc;
use emis_common::{DatasetVersion, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::ImportJobStore;
use crate::models::{Adapter, DuplicatePolicy, ImportJob, JobStatus};
use crate::utils::retry_on_lock;

const SELECT_COLUMNS: &str = r#"
    SELECT id, adapter, dataset_name, dataset_version, duplicate_policy, status,
           rows_total, rows_imported, rows_skipped, duplicates, invalid,
           last_processed_row_index, created_at
    FROM import_jobs
"#;

/// Audit store over the shared SQLite pool
#[derive(Clone)]
pub struct SqliteImportJobStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteImportJobStore {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            max_lock_wait_ms,
        }
    }
}

fn job_from_row(row: &SqliteRow) -> Result<ImportJob> {
    let id: String = row.get("id");
    let adapter: String = row.get("adapter");
    let policy: String = row.get("duplicate_policy");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let last_index: Option<i64> = row.get("last_processed_row_index");

    Ok(ImportJob {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Invalid import job id {:?}: {}", id, e)))?,
        adapter: adapter.parse::<Adapter>().map_err(Error::Internal)?,
        dataset_name: row.get("dataset_name"),
        dataset_version: DatasetVersion::new(row.get::<String, _>("dataset_version")),
        duplicate_policy: policy.parse::<DuplicatePolicy>().map_err(Error::Internal)?,
        status: status.parse::<JobStatus>().map_err(Error::Internal)?,
        rows_total: row.get::<i64, _>("rows_total") as usize,
        rows_imported: row.get::<i64, _>("rows_imported") as usize,
        rows_skipped: row.get::<i64, _>("rows_skipped") as usize,
        duplicates: row.get::<i64, _>("duplicates") as usize,
        invalid: row.get::<i64, _>("invalid") as usize,
        last_processed_row_index: last_index.map(|i| i as usize),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
            .with_timezone(&Utc),
    })
}

#[async_trait]
impl ImportJobStore for SqliteImportJobStore {
    async fn record(&self, job: &ImportJob) -> Result<()> {
        // Prepare all data BEFORE acquiring a connection
        let id = job.id.to_string();
        let created_at = job.created_at.to_rfc3339();
        let last_index = job.last_processed_row_index.map(|i| i as i64);

        retry_on_lock("import job record", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                INSERT INTO import_jobs (
                    id, adapter, dataset_name, dataset_version, duplicate_policy, status,
                    rows_total, rows_imported, rows_skipped, duplicates, invalid,
                    last_processed_row_index, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(job.adapter.as_str())
            .bind(job.dataset_name.as_deref())
            .bind(job.dataset_version.as_str())
            .bind(job.duplicate_policy.as_str())
            .bind(job.status.as_str())
            .bind(job.rows_total as i64)
            .bind(job.rows_imported as i64)
            .bind(job.rows_skipped as i64)
            .bind(job.duplicates as i64)
            .bind(job.invalid as i64)
            .bind(last_index)
            .bind(&created_at)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            Ok(())
        })
        .await?;

        tracing::debug!(job_id = %job.id, status = job.status.as_str(), "Import job recorded");
        Ok(())
    }

    async fn list_by_dataset(&self, dataset_name: &str) -> Result<Vec<ImportJob>> {
        let sql = format!("{} WHERE dataset_name = ? ORDER BY created_at, id", SELECT_COLUMNS);
        let rows = sqlx::query(&sql)
            .bind(dataset_name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<ImportJob>> {
        let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteImportJobStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        emis_common::db::init_schema(&pool).await.unwrap();
        SqliteImportJobStore::new(pool, 1000)
    }

    fn job(dataset: &str, status: JobStatus) -> ImportJob {
        ImportJob {
            id: Uuid::new_v4(),
            adapter: Adapter::GenericOperator,
            dataset_name: Some(dataset.to_string()),
            dataset_version: DatasetVersion::new("v1"),
            duplicate_policy: DuplicatePolicy::Skip,
            status,
            rows_total: 3,
            rows_imported: 2,
            rows_skipped: 0,
            duplicates: 0,
            invalid: 1,
            last_processed_row_index: Some(2),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_and_get() {
        let store = store().await;
        let job = job("ds", JobStatus::Completed);
        store.record(&job).await.unwrap();

        let loaded = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.rows_total, job.rows_total);
        assert_eq!(loaded.rows_imported, job.rows_imported);
        assert_eq!(loaded.rows_skipped, job.rows_skipped);
        assert_eq!(loaded.duplicates, job.duplicates);
        assert_eq!(loaded.invalid, job.invalid);
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.last_processed_row_index, Some(2));

        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_same_id_twice_fails() {
        let store = store().await;
        let job = job("ds", JobStatus::Completed);
        store.record(&job).await.unwrap();
        assert!(store.record(&job).await.is_err());
    }

    #[tokio::test]
    async fn test_list_by_dataset_filters() {
        let store = store().await;
        store.record(&job("a", JobStatus::Completed)).await.unwrap();
        store.record(&job("a", JobStatus::Incomplete)).await.unwrap();
        store.record(&job("b", JobStatus::Completed)).await.unwrap();

        let jobs = store.list_by_dataset("a").await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.dataset_name.as_deref() == Some("a")));
        assert!(store.list_by_dataset("missing").await.unwrap().is_empty());
    }
}
