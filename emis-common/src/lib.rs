//! # EMIS Common Library
//!
//! Shared code for the emissions ingest services:
//! - Error type used by storage and configuration code
//! - Bootstrap configuration loading (CLI → ENV → TOML → defaults)
//! - SQLite database initialization and schema
//! - Dataset version ordering

pub mod config;
pub mod db;
pub mod error;
pub mod version;

pub use error::{Error, Result};
pub use version::DatasetVersion;
