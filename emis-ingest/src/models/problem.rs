//! Per-row validation problems

use super::canonical::CanonicalField;
use serde::{Deserialize, Serialize};

/// One concrete row problem reported by preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    /// 0-based data record position (header excluded)
    pub row_index: usize,
    /// Raw header of the offending column, if the problem is column-specific
    pub column: Option<String>,
    pub field: Option<CanonicalField>,
    pub reason: String,
    pub raw_value: Option<String>,
}

impl Problem {
    pub fn for_field(
        row_index: usize,
        column: Option<&str>,
        field: CanonicalField,
        reason: impl Into<String>,
        raw_value: Option<&str>,
    ) -> Self {
        Self {
            row_index,
            column: column.map(str::to_string),
            field: Some(field),
            reason: reason.into(),
            raw_value: raw_value.map(str::to_string),
        }
    }

    pub fn for_row(row_index: usize, reason: impl Into<String>) -> Self {
        Self {
            row_index,
            column: None,
            field: None,
            reason: reason.into(),
            raw_value: None,
        }
    }
}
