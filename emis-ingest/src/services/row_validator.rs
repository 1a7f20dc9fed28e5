//! Row Validator / Previewer
//!
//! Applies a header mapping to raw records and coerces them into
//! [`CanonicalRow`]s. The same [`RowValidator`] drives both preview and
//! commit, so a row previewed as valid is committed as valid.

use chrono::{Datelike, NaiveDate, Utc};
use csv::StringRecord;
use emis_common::DatasetVersion;
use serde::Serialize;
use std::collections::BTreeMap;

use super::delimited::ParsedFile;
use super::header_mapper::HeaderMapper;
use crate::error::IngestError;
use crate::models::canonical::normalize_display_text;
use crate::models::{normalize_header, Adapter, CanonicalField, CanonicalRow, HeaderMapping, Problem, Scope};

/// Gas label of the CO2-equivalent rows in Climate TRACE exports
const TRACE_CO2E_GAS: &str = "co2e_100yr";

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Accepted year range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    pub min_year: i32,
    /// Fixed upper bound; `None` follows the calendar (next year)
    pub max_year: Option<i32>,
}

impl ValidationRules {
    /// Upper year bound as of `current_year`
    pub fn max_year_at(&self, current_year: i32) -> i32 {
        self.max_year.unwrap_or(current_year + 1)
    }
}

impl Default for ValidationRules {
    /// 1990 through next calendar year
    fn default() -> Self {
        Self {
            min_year: 1990,
            max_year: None,
        }
    }
}

/// Result of validating one record
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Every cell blank; not counted anywhere
    Empty,
    /// Excluded by an adapter row rule; not counted as checked
    Filtered,
    Valid(CanonicalRow),
    /// Every problem found in the row
    Invalid(Vec<Problem>),
}

/// A mapped field's position in the record
#[derive(Debug, Clone)]
struct Column {
    index: usize,
    header: String,
}

/// Mapping-bound validator for one file
#[derive(Debug, Clone)]
pub struct RowValidator {
    adapter: Adapter,
    width: usize,
    columns: BTreeMap<CanonicalField, Column>,
    gas_column: Option<usize>,
    granularity_column: Option<usize>,
    default_version: DatasetVersion,
    min_year: i32,
    max_year: i32,
}

impl RowValidator {
    /// Bind a mapping to the file's headers
    ///
    /// Fails when the mapping leaves a required field unassigned or assigns
    /// a field twice; no row is examined in that case.
    pub fn new(
        adapter: Adapter,
        headers: &[String],
        mapping: &HeaderMapping,
        default_version: DatasetVersion,
        rules: ValidationRules,
    ) -> Result<Self, IngestError> {
        HeaderMapper::validate(mapping, headers)?;

        let mut columns = BTreeMap::new();
        for (index, header) in headers.iter().enumerate() {
            if let Some(field) = mapping.target(header).field() {
                columns.insert(
                    field,
                    Column {
                        index,
                        header: header.clone(),
                    },
                );
            }
        }

        let find = |name: &str| headers.iter().position(|h| normalize_header(h) == name);
        let (gas_column, granularity_column) = match adapter {
            Adapter::TraceSector => (find("gas"), find("temporal_granularity")),
            _ => (None, None),
        };

        Ok(Self {
            adapter,
            width: headers.len(),
            columns,
            gas_column,
            granularity_column,
            default_version,
            min_year: rules.min_year,
            max_year: rules.max_year_at(Utc::now().year()),
        })
    }

    pub fn adapter(&self) -> Adapter {
        self.adapter
    }

    /// Validate one record; `row_index` is its 0-based position in the file
    pub fn validate(&self, row_index: usize, record: &StringRecord) -> RowOutcome {
        if record.iter().all(|cell| cell.trim().is_empty()) {
            return RowOutcome::Empty;
        }

        // Adapter filters apply even to ragged rows when the gas cell is present
        if self.is_filtered(record) {
            return RowOutcome::Filtered;
        }

        if record.len() != self.width {
            return RowOutcome::Invalid(vec![Problem::for_row(
                row_index,
                format!("expected {} fields, found {}", self.width, record.len()),
            )]);
        }

        let mut problems = Vec::new();

        let facility_name = self
            .required(row_index, record, CanonicalField::FacilityName, &mut problems)
            .map(normalize_display_text);

        let mut year_month = None;
        let year = self
            .required(row_index, record, CanonicalField::Year, &mut problems)
            .and_then(|raw| match parse_year(raw) {
                Some((year, month)) if (self.min_year..=self.max_year).contains(&year) => {
                    year_month = month;
                    Some(year)
                }
                Some((year, _)) => {
                    problems.push(self.problem(
                        row_index,
                        CanonicalField::Year,
                        format!(
                            "year {} outside {}..={}",
                            year, self.min_year, self.max_year
                        ),
                        raw,
                    ));
                    None
                }
                None => {
                    problems.push(self.problem(row_index, CanonicalField::Year, "not a valid year", raw));
                    None
                }
            });

        let co2e_tonnes = self
            .required(row_index, record, CanonicalField::Co2eTonnes, &mut problems)
            .and_then(|raw| match parse_quantity(raw) {
                Ok(value) => Some(value),
                Err(reason) => {
                    problems.push(self.problem(row_index, CanonicalField::Co2eTonnes, reason, raw));
                    None
                }
            });

        let month = match self.optional(record, CanonicalField::Month) {
            Some(raw) => match parse_month(raw) {
                Some(month) => Some(month),
                None => {
                    problems.push(self.problem(
                        row_index,
                        CanonicalField::Month,
                        "month must be 1-12",
                        raw,
                    ));
                    None
                }
            },
            None if self.is_monthly(record) => year_month,
            None => None,
        };

        let scope = match self.optional(record, CanonicalField::Scope) {
            Some(raw) => match raw.parse::<Scope>() {
                Ok(scope) => Some(scope),
                Err(()) => {
                    problems.push(self.problem(
                        row_index,
                        CanonicalField::Scope,
                        "unrecognised scope",
                        raw,
                    ));
                    None
                }
            },
            None => None,
        };

        let source = self
            .optional(record, CanonicalField::Source)
            .map(normalize_display_text)
            .unwrap_or_else(|| self.adapter.default_source().to_string());

        let method = self
            .optional(record, CanonicalField::Method)
            .map(normalize_display_text);

        let dataset_version = self
            .optional(record, CanonicalField::DatasetVersion)
            .map(DatasetVersion::new)
            .unwrap_or_else(|| self.default_version.clone());

        match (facility_name, year, co2e_tonnes) {
            (Some(facility_name), Some(year), Some(co2e_tonnes)) if problems.is_empty() => {
                RowOutcome::Valid(CanonicalRow {
                    facility_name,
                    year,
                    month,
                    co2e_tonnes,
                    scope,
                    source,
                    method,
                    dataset_version,
                })
            }
            _ => RowOutcome::Invalid(problems),
        }
    }

    fn cell<'r>(&self, record: &'r StringRecord, field: CanonicalField) -> Option<&'r str> {
        self.columns
            .get(&field)
            .and_then(|column| record.get(column.index))
            .map(str::trim)
    }

    /// Mapped, non-blank value
    fn optional<'r>(&self, record: &'r StringRecord, field: CanonicalField) -> Option<&'r str> {
        self.cell(record, field).filter(|raw| !raw.is_empty())
    }

    fn required<'r>(
        &self,
        row_index: usize,
        record: &'r StringRecord,
        field: CanonicalField,
        problems: &mut Vec<Problem>,
    ) -> Option<&'r str> {
        let value = self.optional(record, field);
        if value.is_none() {
            problems.push(Problem::for_field(
                row_index,
                self.columns.get(&field).map(|c| c.header.as_str()),
                field,
                "required value is missing",
                None,
            ));
        }
        value
    }

    fn problem(
        &self,
        row_index: usize,
        field: CanonicalField,
        reason: impl Into<String>,
        raw: &str,
    ) -> Problem {
        Problem::for_field(
            row_index,
            self.columns.get(&field).map(|c| c.header.as_str()),
            field,
            reason,
            Some(raw),
        )
    }

    fn is_filtered(&self, record: &StringRecord) -> bool {
        self.gas_column
            .and_then(|index| record.get(index))
            .map(str::trim)
            .is_some_and(|gas| !gas.is_empty() && !gas.eq_ignore_ascii_case(TRACE_CO2E_GAS))
    }

    fn is_monthly(&self, record: &StringRecord) -> bool {
        self.granularity_column
            .and_then(|index| record.get(index))
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("month"))
    }
}

/// Parse a year cell: `2022`, `2022.0`, or an ISO date/timestamp
///
/// Returns the month as well when the cell was a date.
fn parse_year(raw: &str) -> Option<(i32, Option<u8>)> {
    if let Ok(year) = raw.parse::<i32>() {
        return Some((year, None));
    }
    if let Some(year) = parse_integral(raw) {
        return i32::try_from(year).ok().map(|y| (y, None));
    }
    parse_date_prefix(raw).map(|date| (date.year(), Some(date.month() as u8)))
}

/// Parse a month cell: `1`-`12`, `3.0`, an ISO date, or an English month name
fn parse_month(raw: &str) -> Option<u8> {
    let number = raw
        .parse::<i64>()
        .ok()
        .or_else(|| parse_integral(raw))
        .or_else(|| parse_date_prefix(raw).map(|d| d.month() as i64));

    if let Some(number) = number {
        return (1..=12).contains(&number).then_some(number as u8);
    }

    let lower = raw.to_ascii_lowercase();
    MONTH_NAMES
        .iter()
        .position(|name| *name == lower || (lower.len() >= 3 && name.starts_with(lower.as_str())))
        .map(|idx| idx as u8 + 1)
}

/// `2022.0` → 2022; rejects fractional and non-finite values
fn parse_integral(raw: &str) -> Option<i64> {
    let value = raw.parse::<f64>().ok()?;
    (value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15).then_some(value as i64)
}

/// `YYYY-MM-DD` optionally followed by a time part
fn parse_date_prefix(raw: &str) -> Option<NaiveDate> {
    let prefix = raw.get(..10)?;
    match raw.as_bytes().get(10) {
        None | Some(b'T') | Some(b' ') => NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok(),
        _ => None,
    }
}

/// Parse a CO2e quantity
///
/// Accepts plain decimals and comma thousands separators (`1,234.5`). Blank
/// input never reaches here; unparsable input is an error, never zero.
fn parse_quantity(raw: &str) -> Result<f64, &'static str> {
    let cleaned = if raw.contains(',') {
        strip_thousands(raw).ok_or("not a number")?
    } else {
        raw.to_string()
    };

    let value: f64 = cleaned.parse().map_err(|_| "not a number")?;
    if !value.is_finite() {
        return Err("quantity must be finite");
    }
    if value < 0.0 {
        return Err("quantity must not be negative");
    }
    // -0.0 stores as 0
    Ok(value.abs())
}

/// Remove comma group separators, rejecting malformed grouping like `1,23`
fn strip_thousands(raw: &str) -> Option<String> {
    let (integer, fraction) = match raw.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (raw, None),
    };
    let unsigned = integer.strip_prefix(['-', '+']).unwrap_or(integer);

    let mut groups = unsigned.split(',');
    let first = groups.next()?;
    if first.is_empty() || first.len() > 3 || !first.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !groups.all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }
    if fraction.is_some_and(|f| f.contains(',')) {
        return None;
    }

    Some(raw.replace(',', ""))
}

/// Tuning for a preview run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewOptions {
    /// Maximum problems returned; the full count is always reported
    pub problem_cap: usize,
    /// Check at most this many non-empty rows; `None` checks the whole file
    pub sample_rows: Option<usize>,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            problem_cap: 10,
            sample_rows: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewStats {
    /// Rows examined: valid plus invalid
    pub checked: usize,
    pub ok: usize,
    /// First `problem_cap` problems in row order
    pub problems: Vec<Problem>,
    /// Every problem found, including those beyond the cap
    pub problem_count: usize,
    pub filtered: usize,
    /// True when a sample limit stopped the preview before the end of the file
    pub sampled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub adapter: Adapter,
    pub mapping: HeaderMapping,
    pub preview_stats: PreviewStats,
}

/// Dry-run validation; writes nothing
pub fn preview(
    parsed: &ParsedFile,
    validator: &RowValidator,
    mapping: HeaderMapping,
    options: PreviewOptions,
) -> PreviewReport {
    let mut stats = PreviewStats {
        checked: 0,
        ok: 0,
        problems: Vec::new(),
        problem_count: 0,
        filtered: 0,
        sampled: false,
    };

    for (row_index, record) in parsed.records.iter().enumerate() {
        if options.sample_rows.is_some_and(|limit| stats.checked >= limit) {
            stats.sampled = true;
            break;
        }

        match validator.validate(row_index, record) {
            RowOutcome::Empty => {}
            RowOutcome::Filtered => stats.filtered += 1,
            RowOutcome::Valid(_) => {
                stats.checked += 1;
                stats.ok += 1;
            }
            RowOutcome::Invalid(problems) => {
                stats.checked += 1;
                stats.problem_count += problems.len();
                let room = options.problem_cap.saturating_sub(stats.problems.len());
                stats.problems.extend(problems.into_iter().take(room));
            }
        }
    }

    tracing::debug!(
        adapter = validator.adapter().as_str(),
        checked = stats.checked,
        ok = stats.ok,
        problem_count = stats.problem_count,
        filtered = stats.filtered,
        "Preview complete"
    );

    PreviewReport {
        adapter: validator.adapter(),
        mapping,
        preview_stats: stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::delimited::parse_delimited;

    fn rules() -> ValidationRules {
        ValidationRules {
            min_year: 1990,
            max_year: Some(2030),
        }
    }

    #[test]
    fn test_default_year_ceiling_follows_calendar() {
        let calendar = ValidationRules::default();
        assert_eq!(calendar.max_year_at(2025), 2026);
        assert_eq!(calendar.max_year_at(2031), 2032);
        assert_eq!(rules().max_year_at(2031), 2030);

        let next_year = Utc::now().year() + 1;
        let headers = vec!["Site".to_string(), "Yr".to_string(), "Tons".to_string()];
        let mapping = HeaderMapper::derive_default(Adapter::GenericOperator, &headers);
        let validator = RowValidator::new(
            Adapter::GenericOperator,
            &headers,
            &mapping,
            DatasetVersion::new("v1"),
            calendar,
        )
        .unwrap();
        let accepted = StringRecord::from(vec!["A".to_string(), next_year.to_string(), "1".to_string()]);
        let rejected = StringRecord::from(vec!["A".to_string(), (next_year + 1).to_string(), "1".to_string()]);
        assert!(matches!(validator.validate(0, &accepted), RowOutcome::Valid(_)));
        assert!(matches!(validator.validate(1, &rejected), RowOutcome::Invalid(_)));
    }

    fn generic_validator(headers: &[String]) -> RowValidator {
        let mapping = HeaderMapper::derive_default(Adapter::GenericOperator, headers);
        RowValidator::new(
            Adapter::GenericOperator,
            headers,
            &mapping,
            DatasetVersion::new("v1"),
            rules(),
        )
        .unwrap()
    }

    fn validate_one(csv: &str) -> RowOutcome {
        let parsed = parse_delimited(csv.as_bytes()).unwrap();
        let validator = generic_validator(&parsed.headers);
        validator.validate(0, &parsed.records[0])
    }

    fn problems(outcome: RowOutcome) -> Vec<Problem> {
        match outcome {
            RowOutcome::Invalid(problems) => problems,
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_row_with_defaults() {
        let outcome = validate_one("Site,Yr,Tons\n  Plant   A ,2022,\"1,234.5\"\n");
        match outcome {
            RowOutcome::Valid(row) => {
                assert_eq!(row.facility_name, "Plant A");
                assert_eq!(row.year, 2022);
                assert_eq!(row.month, None);
                assert_eq!(row.co2e_tonnes, 1234.5);
                assert_eq!(row.source, "operator");
                assert_eq!(row.dataset_version.as_str(), "v1");
            }
            other => panic!("expected Valid, got {:?}", other),
        }
    }

    #[test]
    fn test_unparsable_quantity_is_problem_not_zero() {
        let problems = problems(validate_one("Site,Yr,Tons\nB,2022,n/a\n"));
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].row_index, 0);
        assert_eq!(problems[0].field, Some(CanonicalField::Co2eTonnes));
        assert_eq!(problems[0].column.as_deref(), Some("Tons"));
        assert_eq!(problems[0].raw_value.as_deref(), Some("n/a"));
    }

    #[test]
    fn test_collects_every_problem_of_a_row() {
        let problems = problems(validate_one("Site,Yr,Tons,Scope\n,1800,-5,scope 9\n"));
        let fields: Vec<_> = problems.iter().filter_map(|p| p.field).collect();
        assert_eq!(
            fields,
            vec![
                CanonicalField::FacilityName,
                CanonicalField::Year,
                CanonicalField::Co2eTonnes,
                CanonicalField::Scope,
            ]
        );
    }

    #[test]
    fn test_ragged_row_is_single_problem() {
        let problems = problems(validate_one("Site,Yr,Tons\nA,2022\n"));
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].field, None);
        assert_eq!(problems[0].reason, "expected 3 fields, found 2");
    }

    #[test]
    fn test_blank_row_is_empty() {
        let parsed = parse_delimited(b"Site,Yr,Tons\n , ,\nA,2022,1\n").unwrap();
        let validator = generic_validator(&parsed.headers);
        assert_eq!(validator.validate(0, &parsed.records[0]), RowOutcome::Empty);
    }

    #[test]
    fn test_optional_fields() {
        let outcome = validate_one(
            "Site,Yr,Month,Tons,Scope,Source,Method,Version\nA,2022,March,5,S2,  EPA  ,,v9\n",
        );
        match outcome {
            RowOutcome::Valid(row) => {
                assert_eq!(row.month, Some(3));
                assert_eq!(row.scope, Some(Scope::Scope2));
                assert_eq!(row.source, "EPA");
                assert_eq!(row.method, None);
                assert_eq!(row.dataset_version.as_str(), "v9");
            }
            other => panic!("expected Valid, got {:?}", other),
        }
    }

    #[test]
    fn test_month_out_of_range() {
        let problems = problems(validate_one("Site,Yr,Month,Tons\nA,2022,13,5\n"));
        assert_eq!(problems[0].field, Some(CanonicalField::Month));
    }

    #[test]
    fn test_parse_year_forms() {
        assert_eq!(parse_year("2022"), Some((2022, None)));
        assert_eq!(parse_year("2022.0"), Some((2022, None)));
        assert_eq!(parse_year("2021-07-01T00:00:00Z"), Some((2021, Some(7))));
        assert_eq!(parse_year("2021-07-01 00:00:00"), Some((2021, Some(7))));
        assert_eq!(parse_year("2021-07-01"), Some((2021, Some(7))));
        assert_eq!(parse_year("2022.5"), None);
        assert_eq!(parse_year("twenty"), None);
    }

    #[test]
    fn test_parse_quantity_forms() {
        assert_eq!(parse_quantity("100"), Ok(100.0));
        assert_eq!(parse_quantity("1,234,567.25"), Ok(1_234_567.25));
        assert_eq!(parse_quantity("1e3"), Ok(1000.0));
        assert_eq!(parse_quantity("-0"), Ok(0.0));
        assert!(parse_quantity("1,23").is_err());
        assert!(parse_quantity("1,5").is_err());
        assert!(parse_quantity("NaN").is_err());
        assert!(parse_quantity("inf").is_err());
        assert!(parse_quantity("-1").is_err());
        assert!(parse_quantity("12 t").is_err());
    }

    #[test]
    fn test_parse_month_names() {
        assert_eq!(parse_month("jan"), Some(1));
        assert_eq!(parse_month("December"), Some(12));
        assert_eq!(parse_month("2.0"), Some(2));
        assert_eq!(parse_month("ma"), None);
        assert_eq!(parse_month("0"), None);
    }

    #[test]
    fn test_trace_filters_non_co2e_gas_and_derives_month() {
        let csv = "source_name,start_time,gas,emissions_quantity,temporal_granularity\n\
                   Mine A,2022-03-01T00:00:00Z,ch4,10,month\n\
                   Mine A,2022-03-01T00:00:00Z,co2e_100yr,12,month\n\
                   Mine B,2022-01-01T00:00:00Z,co2e_100yr,7,annual\n";
        let parsed = parse_delimited(csv.as_bytes()).unwrap();
        let mapping = HeaderMapper::derive_default(Adapter::TraceSector, &parsed.headers);
        let validator = RowValidator::new(
            Adapter::TraceSector,
            &parsed.headers,
            &mapping,
            DatasetVersion::new("v1"),
            rules(),
        )
        .unwrap();

        assert_eq!(validator.validate(0, &parsed.records[0]), RowOutcome::Filtered);
        match validator.validate(1, &parsed.records[1]) {
            RowOutcome::Valid(row) => {
                assert_eq!(row.month, Some(3));
                assert_eq!(row.source, "climate_trace");
            }
            other => panic!("expected Valid, got {:?}", other),
        }
        match validator.validate(2, &parsed.records[2]) {
            RowOutcome::Valid(row) => assert_eq!(row.month, None),
            other => panic!("expected Valid, got {:?}", other),
        }
    }

    #[test]
    fn test_trace_ragged_non_co2e_row_is_filtered() {
        let csv = "source_name,start_time,gas,emissions_quantity,temporal_granularity\n\
                   Mine A,2022-03-01T00:00:00Z,ch4,10\n\
                   Mine B,2022-03-01T00:00:00Z,co2e_100yr,10\n";
        let parsed = parse_delimited(csv.as_bytes()).unwrap();
        let mapping = HeaderMapper::derive_default(Adapter::TraceSector, &parsed.headers);
        let validator = RowValidator::new(
            Adapter::TraceSector,
            &parsed.headers,
            &mapping,
            DatasetVersion::new("v1"),
            rules(),
        )
        .unwrap();

        assert_eq!(validator.validate(0, &parsed.records[0]), RowOutcome::Filtered);
        assert!(matches!(validator.validate(1, &parsed.records[1]), RowOutcome::Invalid(_)));
    }

    #[test]
    fn test_new_rejects_incomplete_mapping() {
        let headers = vec!["Site".to_string(), "Notes".to_string()];
        let mapping = HeaderMapper::derive_default(Adapter::GenericOperator, &headers);
        let result = RowValidator::new(
            Adapter::GenericOperator,
            &headers,
            &mapping,
            DatasetVersion::new("v1"),
            rules(),
        );
        assert!(matches!(result, Err(IngestError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_preview_scenario() {
        let parsed = parse_delimited(b"Site,Yr,Tons\nA,2022,100\nB,2022,n/a\nA,2022,120\n").unwrap();
        let validator = generic_validator(&parsed.headers);
        let mapping = HeaderMapper::derive_default(Adapter::GenericOperator, &parsed.headers);

        let report = preview(&parsed, &validator, mapping, PreviewOptions::default());

        assert_eq!(report.adapter, Adapter::GenericOperator);
        assert_eq!(report.preview_stats.checked, 3);
        assert_eq!(report.preview_stats.ok, 2);
        assert_eq!(report.preview_stats.problems.len(), 1);
        assert_eq!(report.preview_stats.problems[0].row_index, 1);
        assert!(!report.preview_stats.sampled);
    }

    #[test]
    fn test_preview_caps_problems() {
        let mut csv = String::from("Site,Yr,Tons\n");
        for i in 0..500 {
            csv.push_str(&format!("Plant {},2022,bad\n", i));
        }
        let parsed = parse_delimited(csv.as_bytes()).unwrap();
        let validator = generic_validator(&parsed.headers);
        let mapping = HeaderMapper::derive_default(Adapter::GenericOperator, &parsed.headers);

        let report = preview(&parsed, &validator, mapping, PreviewOptions::default());
        let stats = report.preview_stats;

        assert_eq!(stats.checked - stats.ok, 500);
        assert_eq!(stats.problems.len(), 10);
        assert_eq!(stats.problem_count, 500);
    }

    #[test]
    fn test_preview_sample_limit() {
        let parsed = parse_delimited(b"Site,Yr,Tons\nA,2022,1\nB,2022,2\nC,2022,3\n").unwrap();
        let validator = generic_validator(&parsed.headers);
        let mapping = HeaderMapper::derive_default(Adapter::GenericOperator, &parsed.headers);

        let report = preview(
            &parsed,
            &validator,
            mapping,
            PreviewOptions {
                problem_cap: 10,
                sample_rows: Some(2),
            },
        );

        assert_eq!(report.preview_stats.checked, 2);
        assert!(report.preview_stats.sampled);
    }

    #[test]
    fn test_preview_serializes_camel_case() {
        let parsed = parse_delimited(b"Site,Yr,Tons\nA,2022,1\n").unwrap();
        let validator = generic_validator(&parsed.headers);
        let mapping = HeaderMapper::derive_default(Adapter::GenericOperator, &parsed.headers);
        let report = preview(&parsed, &validator, mapping, PreviewOptions::default());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["adapter"], "generic_operator");
        assert_eq!(json["previewStats"]["problemCount"], 0);
        assert_eq!(json["mapping"]["mapping"]["Site"], "facility_name");
    }
}
