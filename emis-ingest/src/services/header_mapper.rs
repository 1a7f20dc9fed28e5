//! Header Mapper
//!
//! Resolves raw column names to canonical fields.
//!
//! Three ways a mapping comes to exist:
//! - **Manual**: the caller supplies one with the request
//! - **Default**: [`HeaderMapper::derive_default`], deterministic, used when a
//!   preview/commit request carries no mapping so both phases agree
//! - **Assisted**: [`HeaderMapper::suggest`] through an injected
//!   [`ColumnSuggester`]; never fails, degrades to an all-ignored mapping

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::signature_matcher;
use crate::error::IngestError;
use crate::models::{normalize_header, Adapter, CanonicalField, ColumnTarget, HeaderMapping};

/// Generic-template aliases (normalized header → field)
const ALIASES: &[(&str, CanonicalField)] = &[
    ("facility_name", CanonicalField::FacilityName),
    ("facility", CanonicalField::FacilityName),
    ("site", CanonicalField::FacilityName),
    ("site_name", CanonicalField::FacilityName),
    ("plant", CanonicalField::FacilityName),
    ("plant_name", CanonicalField::FacilityName),
    ("installation", CanonicalField::FacilityName),
    ("asset_name", CanonicalField::FacilityName),
    ("year", CanonicalField::Year),
    ("yr", CanonicalField::Year),
    ("reporting_year", CanonicalField::Year),
    ("report_year", CanonicalField::Year),
    ("month", CanonicalField::Month),
    ("mo", CanonicalField::Month),
    ("reporting_month", CanonicalField::Month),
    ("co2e_tonnes", CanonicalField::Co2eTonnes),
    ("co2e", CanonicalField::Co2eTonnes),
    ("tco2e", CanonicalField::Co2eTonnes),
    ("tons", CanonicalField::Co2eTonnes),
    ("tonnes", CanonicalField::Co2eTonnes),
    ("tons_co2e", CanonicalField::Co2eTonnes),
    ("tonnes_co2e", CanonicalField::Co2eTonnes),
    ("metric_tons_co2e", CanonicalField::Co2eTonnes),
    ("emissions", CanonicalField::Co2eTonnes),
    ("emissions_tonnes", CanonicalField::Co2eTonnes),
    ("scope", CanonicalField::Scope),
    ("ghg_scope", CanonicalField::Scope),
    ("emission_scope", CanonicalField::Scope),
    ("source", CanonicalField::Source),
    ("data_source", CanonicalField::Source),
    ("method", CanonicalField::Method),
    ("methodology", CanonicalField::Method),
    ("calculation_method", CanonicalField::Method),
    ("dataset_version", CanonicalField::DatasetVersion),
    ("data_version", CanonicalField::DatasetVersion),
    ("version", CanonicalField::DatasetVersion),
];

/// Suggestion backend failure
#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("Suggester unavailable: {0}")]
    Unavailable(String),

    #[error("Suggester returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Assisted column-mapping collaborator
#[async_trait]
pub trait ColumnSuggester: Send + Sync {
    /// Name for logging and notes
    fn name(&self) -> &'static str;

    async fn suggest(&self, headers: &[String]) -> Result<HeaderMapping, SuggestError>;
}

/// Alias-table suggester; detects the adapter first so known exports map fully
pub struct HeuristicSuggester;

#[async_trait]
impl ColumnSuggester for HeuristicSuggester {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn suggest(&self, headers: &[String]) -> Result<HeaderMapping, SuggestError> {
        let adapter = signature_matcher::detect(headers);
        Ok(HeaderMapper::derive_default(adapter, headers))
    }
}

/// Fallback suggester that assigns nothing
pub struct NoopSuggester;

#[async_trait]
impl ColumnSuggester for NoopSuggester {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn suggest(&self, headers: &[String]) -> Result<HeaderMapping, SuggestError> {
        Ok(HeaderMapping::all_ignored(
            headers,
            Some("Assisted mapping is disabled; map columns manually".to_string()),
        ))
    }
}

#[derive(Serialize)]
struct RemoteRequest<'a> {
    headers: &'a [String],
}

/// Suggester backed by an external HTTP service
///
/// POSTs `{"headers": [...]}` and expects a [`HeaderMapping`] JSON body.
pub struct RemoteSuggester {
    http_client: reqwest::Client,
    url: String,
}

impl RemoteSuggester {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SuggestError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ColumnSuggester for RemoteSuggester {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn suggest(&self, headers: &[String]) -> Result<HeaderMapping, SuggestError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&RemoteRequest { headers })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SuggestError::Unavailable(format!(
                "{} returned HTTP {}",
                self.url,
                response.status()
            )));
        }

        response
            .json::<HeaderMapping>()
            .await
            .map_err(|e| SuggestError::InvalidResponse(e.to_string()))
    }
}

/// Header mapping operations
pub struct HeaderMapper {
    suggester: Arc<dyn ColumnSuggester>,
}

impl HeaderMapper {
    pub fn new(suggester: Arc<dyn ColumnSuggester>) -> Self {
        Self { suggester }
    }

    pub fn suggester_name(&self) -> &'static str {
        self.suggester.name()
    }

    /// Assisted suggestion; never fails
    ///
    /// The result always has exactly one entry per input header. On
    /// collaborator failure every header is ignored and `notes` says why.
    pub async fn suggest(&self, headers: &[String]) -> HeaderMapping {
        match self.suggester.suggest(headers).await {
            Ok(mapping) => conform_to_headers(mapping, headers),
            Err(e) => {
                tracing::warn!(
                    suggester = self.suggester.name(),
                    error = %e,
                    "Column suggestion failed, falling back to manual mapping"
                );
                HeaderMapping::all_ignored(
                    headers,
                    Some(format!("Assisted mapping unavailable ({}); map columns manually", e)),
                )
            }
        }
    }

    /// Deterministic mapping from the adapter's table, then generic aliases
    ///
    /// A field is assigned to the first matching header only, so the result
    /// never contains duplicate assignments.
    pub fn derive_default<S: AsRef<str>>(adapter: Adapter, headers: &[S]) -> HeaderMapping {
        let mut mapping = HeaderMapping::all_ignored(headers, None);
        let mut assigned: HashSet<CanonicalField> = HashSet::new();

        let lookup = |normalized: &str| {
            adapter
                .default_columns()
                .iter()
                .chain(ALIASES.iter())
                .find(|(alias, _)| *alias == normalized)
                .map(|(_, field)| *field)
        };

        // Adapter columns take precedence over aliases regardless of position
        for pass_adapter_only in [true, false] {
            for header in headers {
                let header = header.as_ref();
                if mapping.target(header) != ColumnTarget::Ignored {
                    continue;
                }
                let normalized = normalize_header(header);
                let field = if pass_adapter_only {
                    adapter
                        .default_columns()
                        .iter()
                        .find(|(column, _)| *column == normalized)
                        .map(|(_, field)| *field)
                } else {
                    lookup(&normalized)
                };
                if let Some(field) = field {
                    if assigned.insert(field) {
                        mapping.assign(header, field);
                    }
                }
            }
        }

        let unmapped: Vec<&str> = CanonicalField::REQUIRED
            .iter()
            .filter(|f| !assigned.contains(*f))
            .map(|f| f.as_str())
            .collect();
        if !unmapped.is_empty() {
            mapping.notes = Some(format!(
                "No column recognised for: {}",
                unmapped.join(", ")
            ));
        }

        mapping
    }

    /// Required fields with no column of the file assigned
    pub fn missing_fields<S: AsRef<str>>(mapping: &HeaderMapping, headers: &[S]) -> Vec<CanonicalField> {
        let present = assignments(mapping, headers);
        CanonicalField::REQUIRED
            .into_iter()
            .filter(|field| !present.contains_key(field))
            .collect()
    }

    /// Check a mapping against the file's headers
    ///
    /// Errors when a canonical field is assigned to two columns present in
    /// the file, or when a required field has no column.
    pub fn validate<S: AsRef<str>>(mapping: &HeaderMapping, headers: &[S]) -> Result<(), IngestError> {
        let present = assignments(mapping, headers);

        if let Some((field, columns)) = present.iter().find(|(_, columns)| columns.len() > 1) {
            return Err(IngestError::DuplicateAssignment {
                field: *field,
                headers: columns.clone(),
            });
        }

        let missing = Self::missing_fields(mapping, headers);
        if !missing.is_empty() {
            return Err(IngestError::SchemaMismatch { missing });
        }

        Ok(())
    }
}

/// Field → columns of the file assigned to it
fn assignments<S: AsRef<str>>(
    mapping: &HeaderMapping,
    headers: &[S],
) -> BTreeMap<CanonicalField, Vec<String>> {
    let mut present: BTreeMap<CanonicalField, Vec<String>> = BTreeMap::new();
    for header in headers {
        let header = header.as_ref();
        if let Some(field) = mapping.target(header).field() {
            present.entry(field).or_default().push(header.to_string());
        }
    }
    present
}

/// Keep only entries for `headers`, adding `Ignored` for any left out
fn conform_to_headers(mapping: HeaderMapping, headers: &[String]) -> HeaderMapping {
    let mut conformed = HeaderMapping::all_ignored(headers, mapping.notes.clone());
    for header in headers {
        if let ColumnTarget::Field(field) = mapping.target(header) {
            conformed.assign(header.as_str(), field);
        }
    }
    conformed
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSuggester;

    #[async_trait]
    impl ColumnSuggester for FailingSuggester {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn suggest(&self, _headers: &[String]) -> Result<HeaderMapping, SuggestError> {
            Err(SuggestError::Unavailable("backend down".to_string()))
        }
    }

    struct SloppySuggester;

    #[async_trait]
    impl ColumnSuggester for SloppySuggester {
        fn name(&self) -> &'static str {
            "sloppy"
        }

        async fn suggest(&self, _headers: &[String]) -> Result<HeaderMapping, SuggestError> {
            let mut mapping = HeaderMapping::default();
            mapping.assign("Site", CanonicalField::FacilityName);
            mapping.assign("Invented", CanonicalField::Year);
            Ok(mapping)
        }
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_maps_generic_aliases() {
        let mapping = HeaderMapper::derive_default(Adapter::GenericOperator, &["Site", "Yr", "Tons", "Notes"]);
        assert_eq!(mapping.target("Site"), ColumnTarget::Field(CanonicalField::FacilityName));
        assert_eq!(mapping.target("Yr"), ColumnTarget::Field(CanonicalField::Year));
        assert_eq!(mapping.target("Tons"), ColumnTarget::Field(CanonicalField::Co2eTonnes));
        assert_eq!(mapping.target("Notes"), ColumnTarget::Ignored);
        assert_eq!(mapping.notes, None);
    }

    #[test]
    fn test_default_never_assigns_field_twice() {
        let mapping = HeaderMapper::derive_default(Adapter::GenericOperator, &["Tons", "Tonnes", "Site", "Year"]);
        assert_eq!(mapping.headers_for(CanonicalField::Co2eTonnes), vec!["Tons"]);
        assert!(HeaderMapper::validate(&mapping, &["Tons", "Tonnes", "Site", "Year"]).is_ok());
    }

    #[test]
    fn test_default_prefers_adapter_columns() {
        // GHGRP exports carry both "Facility Id" and "Facility Name"
        let cols = [
            "Facility Id",
            "Reporting Year",
            "Facility Name",
            "GHG Quantity (Metric Tons CO2e)",
        ];
        let mapping = HeaderMapper::derive_default(Adapter::GhgrpFacility, &cols);
        assert_eq!(
            mapping.target("Facility Name"),
            ColumnTarget::Field(CanonicalField::FacilityName)
        );
        assert_eq!(
            mapping.target("GHG Quantity (Metric Tons CO2e)"),
            ColumnTarget::Field(CanonicalField::Co2eTonnes)
        );
        assert_eq!(mapping.target("Facility Id"), ColumnTarget::Ignored);
    }

    #[test]
    fn test_default_notes_unrecognised_required_fields() {
        let mapping = HeaderMapper::derive_default(Adapter::GenericOperator, &["Col1", "Yr"]);
        let notes = mapping.notes.unwrap();
        assert!(notes.contains("facility_name"));
        assert!(notes.contains("co2e_tonnes"));
        assert!(!notes.contains("year"));
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        let mut mapping = HeaderMapping::default();
        mapping.assign("Site", CanonicalField::FacilityName);

        match HeaderMapper::validate(&mapping, &["Site", "Yr"]) {
            Err(IngestError::SchemaMismatch { missing }) => {
                assert_eq!(missing, vec![CanonicalField::Year, CanonicalField::Co2eTonnes]);
            }
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_ignores_headers_absent_from_file() {
        let mut mapping = HeaderMapping::default();
        mapping.assign("Site", CanonicalField::FacilityName);
        mapping.assign("Yr", CanonicalField::Year);
        mapping.assign("Tons", CanonicalField::Co2eTonnes);

        let missing = HeaderMapper::missing_fields(&mapping, &["Site", "Yr"]);
        assert_eq!(missing, vec![CanonicalField::Co2eTonnes]);
    }

    #[test]
    fn test_validate_rejects_duplicate_assignment() {
        let mut mapping = HeaderMapping::default();
        mapping.assign("Site", CanonicalField::FacilityName);
        mapping.assign("Plant", CanonicalField::FacilityName);
        mapping.assign("Yr", CanonicalField::Year);
        mapping.assign("Tons", CanonicalField::Co2eTonnes);

        match HeaderMapper::validate(&mapping, &["Site", "Plant", "Yr", "Tons"]) {
            Err(IngestError::DuplicateAssignment { field, headers }) => {
                assert_eq!(field, CanonicalField::FacilityName);
                assert_eq!(headers, vec!["Site", "Plant"]);
            }
            other => panic!("expected DuplicateAssignment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_suggest_fails_open() {
        let mapper = HeaderMapper::new(Arc::new(FailingSuggester));
        let cols = headers(&["Site", "Yr"]);

        let mapping = mapper.suggest(&cols).await;

        assert_eq!(mapping.mapping.len(), 2);
        assert!(mapping.is_empty_assignment());
        assert!(mapping.notes.unwrap().contains("backend down"));
    }

    #[tokio::test]
    async fn test_suggest_conforms_to_headers() {
        let mapper = HeaderMapper::new(Arc::new(SloppySuggester));
        let cols = headers(&["Site", "Yr"]);

        let mapping = mapper.suggest(&cols).await;

        assert_eq!(mapping.mapping.len(), 2);
        assert_eq!(mapping.target("Site"), ColumnTarget::Field(CanonicalField::FacilityName));
        assert_eq!(mapping.target("Yr"), ColumnTarget::Ignored);
        assert!(!mapping.mapping.contains_key("Invented"));
    }

    #[tokio::test]
    async fn test_heuristic_suggester_detects_adapter() {
        let mapper = HeaderMapper::new(Arc::new(HeuristicSuggester));
        let cols = headers(&["source_name", "start_time", "gas", "emissions_quantity"]);

        let mapping = mapper.suggest(&cols).await;

        assert_eq!(mapping.target("source_name"), ColumnTarget::Field(CanonicalField::FacilityName));
        assert_eq!(mapping.target("start_time"), ColumnTarget::Field(CanonicalField::Year));
        assert_eq!(mapping.target("gas"), ColumnTarget::Ignored);
    }

    #[tokio::test]
    async fn test_noop_suggester_assigns_nothing() {
        let mapper = HeaderMapper::new(Arc::new(NoopSuggester));
        let mapping = mapper.suggest(&headers(&["Site"])).await;
        assert!(mapping.is_empty_assignment());
        assert!(mapping.notes.is_some());
    }

    #[tokio::test]
    async fn test_remote_suggester_unreachable_degrades() {
        // Nothing listens on port 9 (discard) locally
        let remote = RemoteSuggester::new("http://127.0.0.1:9/map", Duration::from_millis(200)).unwrap();
        let mapper = HeaderMapper::new(Arc::new(remote));

        let mapping = mapper.suggest(&headers(&["Site", "Yr"])).await;

        assert!(mapping.is_empty_assignment());
        assert!(mapping.notes.is_some());
    }
}
