//! Dataset version tags and their total order
//!
//! Version tags are caller-supplied strings such as `v2`, `2024.1`, `1.10.0`
//! or `2023-rev3`. They are compared "naturally": the tag is split into runs
//! of ASCII digits and runs of everything else; digit runs compare by numeric
//! value, other runs compare case-insensitively. A tag that is a strict prefix
//! of another (by runs) sorts first, so `1.0` < `1.0.1`.
//!
//! Tags that compare equal under the natural order but differ textually
//! (`v01` vs `v1`, `V2` vs `v2`) fall back to a bytewise comparison so the
//! order is total and consistent with `Eq`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Caller-supplied dataset version tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetVersion(String);

#[derive(Debug, PartialEq, Eq)]
enum Run<'a> {
    Number(&'a str),
    Text(&'a str),
}

impl DatasetVersion {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `self` is strictly newer than `other` under the natural order.
    ///
    /// Tags that differ only in case or zero-padding are not newer than each
    /// other.
    pub fn is_newer_than(&self, other: &DatasetVersion) -> bool {
        self.natural_cmp(other) == Ordering::Greater
    }

    /// Natural comparison without the bytewise tie-break
    pub fn natural_cmp(&self, other: &DatasetVersion) -> Ordering {
        let left = self.runs();
        let right = other.runs();

        for (a, b) in left.iter().zip(right.iter()) {
            let ord = match (a, b) {
                (Run::Number(x), Run::Number(y)) => compare_numeric(x, y),
                (Run::Text(x), Run::Text(y)) => compare_text(x, y),
                // Numbers sort before text at the same position ("1.0" < "1.0a")
                (Run::Number(_), Run::Text(_)) => Ordering::Less,
                (Run::Text(_), Run::Number(_)) => Ordering::Greater,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }

        left.len().cmp(&right.len())
    }

    fn runs(&self) -> Vec<Run<'_>> {
        let s = self.0.as_str();
        let mut runs = Vec::new();
        let mut start = 0;
        let mut in_digits: Option<bool> = None;

        for (idx, ch) in s.char_indices() {
            let is_digit = ch.is_ascii_digit();
            match in_digits {
                Some(prev) if prev != is_digit => {
                    runs.push(make_run(&s[start..idx], prev));
                    start = idx;
                }
                _ => {}
            }
            in_digits = Some(is_digit);
        }
        if let Some(prev) = in_digits {
            runs.push(make_run(&s[start..], prev));
        }
        runs
    }
}

fn make_run(text: &str, digits: bool) -> Run<'_> {
    if digits {
        Run::Number(text)
    } else {
        Run::Text(text)
    }
}

/// Compare two digit strings by numeric value without overflowing
fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.chars().map(|c| c.to_ascii_lowercase()))
}

impl Ord for DatasetVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.natural_cmp(other)
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for DatasetVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DatasetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DatasetVersion {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for DatasetVersion {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(tag: &str) -> DatasetVersion {
        DatasetVersion::new(tag)
    }

    #[test]
    fn test_numeric_runs_compare_by_value() {
        assert!(v("v10") > v("v2"));
        assert!(v("2024.10") > v("2024.9"));
        assert!(v("1.10.0") > v("1.9.12"));
    }

    #[test]
    fn test_prefix_sorts_first() {
        assert!(v("1.0") < v("1.0.1"));
        assert!(v("v1") < v("v1-rev2"));
    }

    #[test]
    fn test_equal_tags() {
        assert_eq!(v("v2").cmp(&v("v2")), Ordering::Equal);
        assert!(!v("v2").is_newer_than(&v("v2")));
    }

    #[test]
    fn test_textual_variants_are_totally_ordered() {
        // Naturally equal, textually different: must not compare Equal
        assert_ne!(v("v01").cmp(&v("v1")), Ordering::Equal);
        assert_ne!(v("V2").cmp(&v("v2")), Ordering::Equal);
        assert_eq!(v("v01").cmp(&v("v1")), v("v1").cmp(&v("v01")).reverse());
    }

    #[test]
    fn test_textual_variants_are_not_newer() {
        assert_eq!(v("V2").natural_cmp(&v("v2")), Ordering::Equal);
        assert!(!v("V2").is_newer_than(&v("v2")));
        assert!(!v("v2").is_newer_than(&v("V2")));
        assert!(!v("v01").is_newer_than(&v("v1")));
        assert!(!v("v1").is_newer_than(&v("v01")));
        assert!(v("v3").is_newer_than(&v("V2")));
    }

    #[test]
    fn test_huge_numbers_do_not_overflow() {
        assert!(v("99999999999999999999999999") > v("9999999999999999999999999"));
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        assert_eq!(v("  v3 "), v("v3"));
    }

    #[test]
    fn test_sorting_is_deterministic() {
        let mut tags = vec![v("v10"), v("v1"), v("v2"), v("v1.5"), v("v0")];
        tags.sort();
        let sorted: Vec<&str> = tags.iter().map(|t| t.as_str()).collect();
        assert_eq!(sorted, vec!["v0", "v1", "v1.5", "v2", "v10"]);
    }
}
