//! SQLite-backed canonical record store
//!
//! One table holds every version of every row; `is_current = 1` marks the
//! live version and a partial unique index guarantees at most one per key.
//! Superseded rows are kept with `superseded_by_job` set.

use async_trait::async_trait;
use chrono::Utc;
use emis_common::{DatasetVersion, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{DatasetTotals, RecordStore, RecordWrite, StoredRecord};
use crate::models::{NaturalKey, Scope};
use crate::utils::retry_on_lock;

const SELECT_COLUMNS: &str = r#"
    SELECT id, facility_name, year, month_key, co2e_tonnes, scope, source, method,
           dataset_version, dataset_name, import_job_id, row_index, is_current,
           superseded_by_job, created_at
    FROM emission_records
"#;

const INSERT_SQL: &str = r#"
    INSERT INTO emission_records (
        facility_key, facility_name, year, month_key, source_key, source,
        co2e_tonnes, scope, method, dataset_version, dataset_name,
        import_job_id, row_index, is_current, created_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
"#;

/// Record store over the shared SQLite pool
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            max_lock_wait_ms,
        }
    }

    async fn try_replace(&self, expected_id: i64, write: RecordWrite<'_>) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let superseded = sqlx::query(
            "UPDATE emission_records SET is_current = 0, superseded_by_job = ? WHERE id = ? AND is_current = 1",
        )
        .bind(write.job_id.to_string())
        .bind(expected_id)
        .execute(&mut *tx)
        .await?;

        if superseded.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        match bind_insert(sqlx::query(INSERT_SQL), write)
            .execute(&mut *tx)
            .await
        {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await?;
                return Ok(false);
            }
            Err(err) => return Err(Error::Database(err)),
        }

        tx.commit().await?;
        Ok(true)
    }
}

fn bind_insert<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    write: RecordWrite<'q>,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    let row = write.row;
    query
        .bind(&write.key.facility_key)
        .bind(&row.facility_name)
        .bind(row.year)
        .bind(write.key.month_key as i64)
        .bind(&write.key.source_key)
        .bind(&row.source)
        .bind(row.co2e_tonnes)
        .bind(row.scope.map(|s| s.as_str()))
        .bind(row.method.as_deref())
        .bind(row.dataset_version.as_str())
        .bind(write.dataset_name)
        .bind(write.job_id.to_string())
        .bind(write.row_index as i64)
        .bind(Utc::now().to_rfc3339())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn parse_uuid(raw: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| Error::Internal(format!("Invalid {} {:?}: {}", column, raw, e)))
}

fn record_from_row(row: &SqliteRow) -> Result<StoredRecord> {
    let month_key: i64 = row.get("month_key");
    let scope: Option<String> = row.get("scope");
    let scope = scope
        .map(|s| {
            s.parse::<Scope>()
                .map_err(|_| Error::Internal(format!("Invalid stored scope: {}", s)))
        })
        .transpose()?;

    let import_job_id: String = row.get("import_job_id");
    let superseded_by_job: Option<String> = row.get("superseded_by_job");
    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&Utc);

    Ok(StoredRecord {
        id: row.get("id"),
        facility_name: row.get("facility_name"),
        year: row.get::<i64, _>("year") as i32,
        month: (month_key != 0).then_some(month_key as u8),
        co2e_tonnes: row.get("co2e_tonnes"),
        scope,
        source: row.get("source"),
        method: row.get("method"),
        dataset_version: DatasetVersion::new(row.get::<String, _>("dataset_version")),
        dataset_name: row.get("dataset_name"),
        import_job_id: parse_uuid(&import_job_id, "import_job_id")?,
        row_index: row.get::<i64, _>("row_index") as usize,
        is_current: row.get::<i64, _>("is_current") != 0,
        superseded_by_job: superseded_by_job
            .map(|s| parse_uuid(&s, "superseded_by_job"))
            .transpose()?,
        created_at,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn fetch_current(&self, key: &NaturalKey) -> Result<Option<StoredRecord>> {
        let sql = format!(
            "{} WHERE facility_key = ? AND year = ? AND month_key = ? AND source_key = ? AND is_current = 1",
            SELECT_COLUMNS
        );

        let row = retry_on_lock("record lookup", self.max_lock_wait_ms, || async {
            sqlx::query(&sql)
                .bind(&key.facility_key)
                .bind(key.year)
                .bind(key.month_key as i64)
                .bind(&key.source_key)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)
        })
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn insert_if_absent(&self, write: RecordWrite<'_>) -> Result<bool> {
        retry_on_lock("record insert", self.max_lock_wait_ms, || async {
            match bind_insert(sqlx::query(INSERT_SQL), write)
                .execute(&self.pool)
                .await
            {
                Ok(_) => Ok(true),
                Err(err) if is_unique_violation(&err) => Ok(false),
                Err(err) => Err(Error::Database(err)),
            }
        })
        .await
    }

    async fn replace_current(&self, expected: &StoredRecord, write: RecordWrite<'_>) -> Result<bool> {
        retry_on_lock("record replace", self.max_lock_wait_ms, || {
            self.try_replace(expected.id, write)
        })
        .await
    }

    async fn history(&self, key: &NaturalKey) -> Result<Vec<StoredRecord>> {
        let sql = format!(
            "{} WHERE facility_key = ? AND year = ? AND month_key = ? AND source_key = ? ORDER BY id",
            SELECT_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(&key.facility_key)
            .bind(key.year)
            .bind(key.month_key as i64)
            .bind(&key.source_key)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn current_totals(&self, dataset_name: &str, year: i32) -> Result<DatasetTotals> {
        let (row_count, total): (i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), SUM(co2e_tonnes)
            FROM emission_records
            WHERE dataset_name = ? AND year = ? AND is_current = 1
            "#,
        )
        .bind(dataset_name)
        .bind(year)
        .fetch_one(&self.pool)
        .await?;

        Ok(DatasetTotals {
            row_count: row_count as usize,
            co2e_tonnes: total.unwrap_or(0.0),
        })
    }
}
