//! Data models for the ingest pipeline

pub mod adapter;
pub mod canonical;
pub mod import_job;
pub mod mapping;
pub mod problem;

pub use adapter::{normalize_header, Adapter};
pub use canonical::{CanonicalField, CanonicalRow, NaturalKey, Scope};
pub use import_job::{CommitCounts, DuplicatePolicy, ImportJob, JobStatus};
pub use mapping::{ColumnTarget, HeaderMapping};
pub use problem::Problem;
