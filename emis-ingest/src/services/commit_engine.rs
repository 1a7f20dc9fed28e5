//! Commit Engine
//!
//! Re-validates the whole file with the preview's rules, then writes the
//! valid rows one by one under the duplicate policy. Every write is a
//! compare-and-swap against the record store; a lost race re-reads the key
//! and decides again. One [`ImportJob`] is recorded per call, whatever the
//! outcome.
//!
//! **Failure model:**
//! - Storage fault: remaining rows are abandoned, written rows stand, the job
//!   is recorded as `incomplete`
//! - Cancellation: checked between rows, the job is recorded as `cancelled`

use chrono::Utc;
use emis_common::{DatasetVersion, Error};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::delimited::ParsedFile;
use super::row_validator::{RowOutcome, RowValidator, ValidationRules};
use crate::db::{ImportJobStore, RecordStore, RecordWrite, StoredRecord};
use crate::error::CommitError;
use crate::models::{
    Adapter, CanonicalRow, CommitCounts, DuplicatePolicy, HeaderMapping, ImportJob, JobStatus,
};

/// Compare-and-swap attempts per row before the row counts as a storage fault
const MAX_CAS_ATTEMPTS: usize = 5;

/// Parameters of one commit call
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub adapter: Adapter,
    pub mapping: HeaderMapping,
    pub dataset_version: DatasetVersion,
    pub dataset_name: Option<String>,
    pub duplicate_policy: DuplicatePolicy,
}

/// Client-facing counts of a finished commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSummary {
    pub rows_total: usize,
    pub rows_imported: usize,
    pub rows_skipped: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub import_job_id: Uuid,
}

impl From<&ImportJob> for CommitSummary {
    fn from(job: &ImportJob) -> Self {
        Self {
            rows_total: job.rows_total,
            rows_imported: job.rows_imported,
            rows_skipped: job.rows_skipped,
            duplicates: job.duplicates,
            invalid: job.invalid,
            import_job_id: job.id,
        }
    }
}

/// What to do with a valid row given the key's current stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDecision {
    Insert,
    /// Supersede the current row
    Replace,
    /// Leave the current row; count a duplicate
    Keep,
}

/// Duplicate-policy decision
///
/// A current row written earlier by the same job is always replaced, so the
/// last occurrence of a key within one file wins.
pub fn decide(
    current: Option<&StoredRecord>,
    incoming: &DatasetVersion,
    policy: DuplicatePolicy,
    job_id: Uuid,
) -> WriteDecision {
    match current {
        None => WriteDecision::Insert,
        Some(stored) if stored.import_job_id == job_id => WriteDecision::Replace,
        Some(_) if policy == DuplicatePolicy::Skip => WriteDecision::Keep,
        Some(stored) if incoming.is_newer_than(&stored.dataset_version) => WriteDecision::Replace,
        Some(_) => WriteDecision::Keep,
    }
}

enum RowResult {
    Imported,
    Duplicate,
}

/// Versioned, duplicate-aware writer
pub struct CommitEngine {
    records: Arc<dyn RecordStore>,
    jobs: Arc<dyn ImportJobStore>,
    rules: ValidationRules,
}

impl CommitEngine {
    pub fn new(records: Arc<dyn RecordStore>, jobs: Arc<dyn ImportJobStore>) -> Self {
        Self {
            records,
            jobs,
            rules: ValidationRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> ValidationRules {
        self.rules
    }

    /// Commit a parsed file
    ///
    /// Returns the recorded job on success. Mapping errors reject the call
    /// before any row is processed and no job is recorded.
    pub async fn commit(
        &self,
        parsed: &ParsedFile,
        request: CommitRequest,
        cancel: &CancellationToken,
    ) -> Result<ImportJob, CommitError> {
        let validator = RowValidator::new(
            request.adapter,
            &parsed.headers,
            &request.mapping,
            request.dataset_version.clone(),
            self.rules,
        )?;

        // Phase 1: validate everything before writing anything
        let mut counts = CommitCounts::default();
        let mut valid_rows: Vec<(usize, CanonicalRow)> = Vec::new();
        for (row_index, record) in parsed.records.iter().enumerate() {
            match validator.validate(row_index, record) {
                RowOutcome::Empty | RowOutcome::Filtered => {}
                RowOutcome::Valid(row) => {
                    counts.rows_total += 1;
                    valid_rows.push((row_index, row));
                }
                RowOutcome::Invalid(_) => {
                    counts.rows_total += 1;
                    counts.invalid += 1;
                }
            }
        }

        let job_id = Uuid::new_v4();
        tracing::info!(
            job_id = %job_id,
            adapter = request.adapter.as_str(),
            dataset_name = ?request.dataset_name,
            dataset_version = request.dataset_version.as_str(),
            policy = request.duplicate_policy.as_str(),
            rows_total = counts.rows_total,
            valid = valid_rows.len(),
            invalid = counts.invalid,
            "Starting commit"
        );

        // Phase 2: write valid rows in file order
        let mut last_processed_row_index = None;
        let mut status = JobStatus::Completed;
        let mut fault = None;

        for (row_index, row) in &valid_rows {
            if cancel.is_cancelled() {
                tracing::warn!(job_id = %job_id, row_index, "Commit cancelled");
                status = JobStatus::Cancelled;
                break;
            }

            match self
                .settle_row(job_id, &request, *row_index, row)
                .await
            {
                Ok(RowResult::Imported) => counts.rows_imported += 1,
                Ok(RowResult::Duplicate) => counts.duplicates += 1,
                Err(e) => {
                    tracing::error!(
                        job_id = %job_id,
                        row_index,
                        error = %e,
                        "Storage fault, abandoning remaining rows"
                    );
                    status = JobStatus::Incomplete;
                    fault = Some(e);
                    break;
                }
            }
            last_processed_row_index = Some(*row_index);
        }

        let job = ImportJob {
            id: job_id,
            adapter: request.adapter,
            dataset_name: request.dataset_name.clone(),
            dataset_version: request.dataset_version.clone(),
            duplicate_policy: request.duplicate_policy,
            status,
            rows_total: counts.rows_total,
            rows_imported: counts.rows_imported,
            rows_skipped: counts.rows_skipped(),
            duplicates: counts.duplicates,
            invalid: counts.invalid,
            last_processed_row_index,
            created_at: Utc::now(),
        };

        if let Err(source) = self.jobs.record(&job).await {
            tracing::error!(job_id = %job_id, error = %source, "Failed to record import job");
            return Err(CommitError::AuditWrite { job_id, source });
        }

        tracing::info!(
            job_id = %job_id,
            status = status.as_str(),
            rows_imported = counts.rows_imported,
            duplicates = counts.duplicates,
            invalid = counts.invalid,
            rows_skipped = job.rows_skipped,
            "Commit finished"
        );

        match (status, fault) {
            (JobStatus::Incomplete, Some(source)) => Err(CommitError::StorageFault {
                job: Box::new(job),
                source,
            }),
            (JobStatus::Cancelled, _) => Err(CommitError::Cancelled { job: Box::new(job) }),
            _ => Ok(job),
        }
    }

    /// Write one valid row, retrying lost compare-and-swaps
    async fn settle_row(
        &self,
        job_id: Uuid,
        request: &CommitRequest,
        row_index: usize,
        row: &CanonicalRow,
    ) -> emis_common::Result<RowResult> {
        let key = row.natural_key();
        let write = RecordWrite {
            row,
            key: &key,
            dataset_name: request.dataset_name.as_deref(),
            job_id,
            row_index,
        };

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.records.fetch_current(&key).await?;

            let won = match decide(
                current.as_ref(),
                &row.dataset_version,
                request.duplicate_policy,
                job_id,
            ) {
                WriteDecision::Keep => return Ok(RowResult::Duplicate),
                WriteDecision::Insert => self.records.insert_if_absent(write).await?,
                WriteDecision::Replace => match &current {
                    Some(stored) => self.records.replace_current(stored, write).await?,
                    None => false,
                },
            };

            if won {
                return Ok(RowResult::Imported);
            }

            tracing::debug!(
                job_id = %job_id,
                row_index,
                key = %key,
                attempt,
                "Lost write race, re-reading key"
            );
        }

        Err(Error::Internal(format!(
            "key {} still contended after {} attempts",
            key, MAX_CAS_ATTEMPTS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored(version: &str, job: Uuid) -> StoredRecord {
        StoredRecord {
            id: 1,
            facility_name: "Plant A".to_string(),
            year: 2022,
            month: None,
            co2e_tonnes: 1.0,
            scope: None,
            source: "operator".to_string(),
            method: None,
            dataset_version: DatasetVersion::new(version),
            dataset_name: None,
            import_job_id: job,
            row_index: 0,
            is_current: true,
            superseded_by_job: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_decide_absent_inserts() {
        let v2 = DatasetVersion::new("v2");
        for policy in [DuplicatePolicy::Skip, DuplicatePolicy::ReplaceIfNewer] {
            assert_eq!(decide(None, &v2, policy, Uuid::new_v4()), WriteDecision::Insert);
        }
    }

    #[test]
    fn test_decide_replace_if_newer() {
        let job = Uuid::new_v4();
        let existing = stored("v2", Uuid::new_v4());
        let policy = DuplicatePolicy::ReplaceIfNewer;

        assert_eq!(
            decide(Some(&existing), &DatasetVersion::new("v10"), policy, job),
            WriteDecision::Replace
        );
        assert_eq!(
            decide(Some(&existing), &DatasetVersion::new("v2"), policy, job),
            WriteDecision::Keep
        );
        assert_eq!(
            decide(Some(&existing), &DatasetVersion::new("v1"), policy, job),
            WriteDecision::Keep
        );
    }

    #[test]
    fn test_decide_case_and_padding_variants_keep() {
        let job = Uuid::new_v4();
        let policy = DuplicatePolicy::ReplaceIfNewer;

        let upper = stored("V2", Uuid::new_v4());
        assert_eq!(
            decide(Some(&upper), &DatasetVersion::new("v2"), policy, job),
            WriteDecision::Keep
        );

        let padded = stored("v1", Uuid::new_v4());
        assert_eq!(
            decide(Some(&padded), &DatasetVersion::new("v01"), policy, job),
            WriteDecision::Keep
        );
    }

    #[test]
    fn test_decide_skip_never_replaces_other_jobs() {
        let existing = stored("v1", Uuid::new_v4());
        assert_eq!(
            decide(
                Some(&existing),
                &DatasetVersion::new("v9"),
                DuplicatePolicy::Skip,
                Uuid::new_v4()
            ),
            WriteDecision::Keep
        );
    }

    #[test]
    fn test_decide_same_job_last_row_wins() {
        let job = Uuid::new_v4();
        let existing = stored("v2", job);
        for policy in [DuplicatePolicy::Skip, DuplicatePolicy::ReplaceIfNewer] {
            assert_eq!(
                decide(Some(&existing), &DatasetVersion::new("v2"), policy, job),
                WriteDecision::Replace
            );
        }
    }
}
