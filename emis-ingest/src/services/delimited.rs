//! Delimited-text parsing
//!
//! Reads an uploaded file fully into memory (bounded by the upload limit)
//! and splits it into a header row and raw records. Ragged rows are kept;
//! the row validator reports them as row problems.

use csv::{ReaderBuilder, StringRecord};
use std::collections::HashSet;

use crate::error::IngestError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Header row plus raw data records
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub headers: Vec<String>,
    pub records: Vec<StringRecord>,
    pub delimiter: u8,
}

impl ParsedFile {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// Pick the delimiter occurring most often in the header line (`,` on ties)
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let header_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();

    let mut best = b',';
    let mut best_count = 0usize;
    for candidate in CANDIDATE_DELIMITERS {
        let count = header_line.iter().filter(|b| **b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

/// Parse an uploaded file into headers and records
///
/// Fails with [`IngestError::Parse`] when the file is empty, has no usable
/// header row, repeats a header, is not UTF-8, or is not valid delimited text.
pub fn parse_delimited(bytes: &[u8]) -> Result<ParsedFile, IngestError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(IngestError::Parse("file is empty".to_string()));
    }

    let delimiter = sniff_delimiter(bytes);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IngestError::Parse(format!("unreadable header row: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(IngestError::Parse("header row is empty".to_string()));
    }

    let mut seen = HashSet::new();
    for header in headers.iter().filter(|h| !h.is_empty()) {
        if !seen.insert(header.as_str()) {
            return Err(IngestError::Parse(format!("duplicate column header {:?}", header)));
        }
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or_default();
            IngestError::Parse(format!("line {}: {}", line, e))
        })?;
        records.push(record);
    }

    tracing::debug!(
        columns = headers.len(),
        records = records.len(),
        delimiter = %(delimiter as char).escape_default(),
        "Parsed delimited file"
    );

    Ok(ParsedFile {
        headers,
        records,
        delimiter,
    })
}
