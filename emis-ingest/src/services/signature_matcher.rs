//! Schema Signature Matcher
//!
//! Classifies a file by its header set. Pure: the same set of headers, in
//! any order and with any spelling that normalizes identically, always maps
//! to the same adapter.

use std::collections::HashSet;

use crate::models::{normalize_header, Adapter};

/// Detect the adapter for a header row
///
/// Fingerprints are tried in [`Adapter::PRIORITY`] order; the first whose
/// columns are all present wins. No match falls back to
/// [`Adapter::GenericOperator`].
pub fn detect<S: AsRef<str>>(headers: &[S]) -> Adapter {
    let normalized: HashSet<String> = headers
        .iter()
        .map(|h| normalize_header(h.as_ref()))
        .collect();

    let adapter = Adapter::PRIORITY
        .into_iter()
        .find(|adapter| {
            adapter
                .fingerprint()
                .iter()
                .all(|column| normalized.contains(*column))
        })
        .unwrap_or(Adapter::GenericOperator);

    tracing::debug!(adapter = adapter.as_str(), columns = headers.len(), "Detected adapter");
    adapter
}
