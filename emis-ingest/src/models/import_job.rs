//! Import job audit records
//!
//! One `ImportJob` is written per commit call, including commits that stop
//! early on a storage fault or cancellation. Jobs are never mutated.

use chrono::{DateTime, Utc};
use emis_common::DatasetVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::adapter::Adapter;

/// Rule governing whether a commit may overwrite an existing current row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Overwrite only when the incoming dataset version is strictly newer
    ReplaceIfNewer,
    /// Never overwrite an existing key
    Skip,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::ReplaceIfNewer => "replace_if_newer",
            DuplicatePolicy::Skip => "skip",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    /// Exactly `replace_if_newer` or `skip`; nothing else is accepted
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "replace_if_newer" => Ok(DuplicatePolicy::ReplaceIfNewer),
            "skip" => Ok(DuplicatePolicy::Skip),
            other => Err(format!(
                "duplicatePolicy must be \"replace_if_newer\" or \"skip\", got {:?}",
                other
            )),
        }
    }
}

/// How a commit invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Every row was processed
    Completed,
    /// A storage fault aborted the remaining rows
    Incomplete,
    /// The caller went away before all rows were processed
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Completed => "completed",
            JobStatus::Incomplete => "incomplete",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "completed" => Ok(JobStatus::Completed),
            "incomplete" => Ok(JobStatus::Incomplete),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// Row outcome counters accumulated by the commit engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitCounts {
    pub rows_total: usize,
    pub rows_imported: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

impl CommitCounts {
    /// Rows neither imported, duplicate nor invalid (unprocessed after an abort)
    pub fn rows_skipped(&self) -> usize {
        self.rows_total
            .saturating_sub(self.rows_imported + self.duplicates + self.invalid)
    }
}

/// Immutable audit record of one commit invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub id: Uuid,
    pub adapter: Adapter,
    pub dataset_name: Option<String>,
    pub dataset_version: DatasetVersion,
    pub duplicate_policy: DuplicatePolicy,
    pub status: JobStatus,
    pub rows_total: usize,
    pub rows_imported: usize,
    pub rows_skipped: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub last_processed_row_index: Option<usize>,
    pub created_at: DateTime<Utc>,
}
