//! Database initialization
//!
//! Opens (or creates) the SQLite store and applies the idempotent schema:
//! - `emission_records`: canonical rows, one *current* row per natural key
//! - `import_jobs`: append-only audit trail of commit invocations

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Per-connection SQLite busy_timeout; longer contention is handled by retry_on_lock
pub const BUSY_TIMEOUT_MS: u64 = 250;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas go on the connect options so every pooled connection gets them.
    // WAL allows concurrent readers (previews, job listings) alongside one writer.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create tables, indexes and triggers (idempotent)
///
/// Safe to call on an already-initialized database and on `sqlite::memory:`
/// pools used by tests.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_emission_records_table(pool).await?;
    create_import_jobs_table(pool).await?;

    info!("Database tables initialized (emission_records, import_jobs)");
    Ok(())
}

async fn create_emission_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS emission_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            facility_key TEXT NOT NULL,
            facility_name TEXT NOT NULL,
            year INTEGER NOT NULL,
            month_key INTEGER NOT NULL CHECK (month_key BETWEEN 0 AND 12),
            source_key TEXT NOT NULL,
            source TEXT NOT NULL,
            co2e_tonnes REAL NOT NULL CHECK (co2e_tonnes >= 0),
            scope TEXT,
            method TEXT,
            dataset_version TEXT NOT NULL,
            dataset_name TEXT,
            import_job_id TEXT NOT NULL,
            row_index INTEGER NOT NULL,
            is_current INTEGER NOT NULL DEFAULT 1,
            superseded_by_job TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one current row per natural key; the insert half of the
    // compare-and-swap relies on this index rejecting a racing writer.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_emission_records_current_key
        ON emission_records (facility_key, year, month_key, source_key)
        WHERE is_current = 1
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_emission_records_dataset_year
        ON emission_records (dataset_name, year)
        WHERE is_current = 1
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_import_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_jobs (
            id TEXT PRIMARY KEY,
            adapter TEXT NOT NULL,
            dataset_name TEXT,
            dataset_version TEXT NOT NULL,
            duplicate_policy TEXT NOT NULL,
            status TEXT NOT NULL,
            rows_total INTEGER NOT NULL,
            rows_imported INTEGER NOT NULL,
            rows_skipped INTEGER NOT NULL,
            duplicates INTEGER NOT NULL,
            invalid INTEGER NOT NULL,
            last_processed_row_index INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_import_jobs_dataset
        ON import_jobs (dataset_name, created_at)
        "#,
    )
    .execute(pool)
    .await?;

    // Audit trail is append-only
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS import_jobs_no_update
        BEFORE UPDATE ON import_jobs
        BEGIN
            SELECT RAISE(ABORT, 'import_jobs is append-only');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS import_jobs_no_delete
        BEFORE DELETE ON import_jobs
        BEGIN
            SELECT RAISE(ABORT, 'import_jobs is append-only');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
