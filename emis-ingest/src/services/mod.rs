//! Ingest pipeline services

pub mod commit_engine;
pub mod delimited;
pub mod header_mapper;
pub mod reconciliation;
pub mod row_validator;
pub mod signature_matcher;

pub use commit_engine::{decide, CommitEngine, CommitRequest, CommitSummary, WriteDecision};
pub use delimited::{parse_delimited, ParsedFile};
pub use header_mapper::{
    ColumnSuggester, HeaderMapper, HeuristicSuggester, NoopSuggester, RemoteSuggester, SuggestError,
};
pub use reconciliation::{reconcile, ReconciliationReport};
pub use row_validator::{
    preview, PreviewOptions, PreviewReport, PreviewStats, RowOutcome, RowValidator, ValidationRules,
};
