//! Known source-schema families

use super::canonical::CanonicalField;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Detected source-schema family of an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adapter {
    /// Satellite/model-derived sector dataset (Climate TRACE export)
    TraceSector,
    /// EPA GHGRP facility-level summary export
    GhgrpFacility,
    /// Operator-filled template; fallback when nothing else matches
    GenericOperator,
}

impl Adapter {
    /// Fingerprinted adapters in match priority order
    pub const PRIORITY: [Adapter; 2] = [Adapter::TraceSector, Adapter::GhgrpFacility];

    pub fn as_str(&self) -> &'static str {
        match self {
            Adapter::TraceSector => "trace_sector",
            Adapter::GhgrpFacility => "ghgrp_facility",
            Adapter::GenericOperator => "generic_operator",
        }
    }

    /// Normalized headers that must all be present for a match
    pub fn fingerprint(&self) -> &'static [&'static str] {
        match self {
            Adapter::TraceSector => &["source_name", "start_time", "gas", "emissions_quantity"],
            Adapter::GhgrpFacility => &[
                "facility_id",
                "facility_name",
                "reporting_year",
                "ghg_quantity_metric_tons_co2e",
            ],
            Adapter::GenericOperator => &[],
        }
    }

    /// Source label used when no `source` column is mapped or it is blank
    pub fn default_source(&self) -> &'static str {
        match self {
            Adapter::TraceSector => "climate_trace",
            Adapter::GhgrpFacility => "epa_ghgrp",
            Adapter::GenericOperator => "operator",
        }
    }

    /// Built-in normalized header → field table
    pub fn default_columns(&self) -> &'static [(&'static str, CanonicalField)] {
        match self {
            Adapter::TraceSector => &[
                ("source_name", CanonicalField::FacilityName),
                ("start_time", CanonicalField::Year),
                ("emissions_quantity", CanonicalField::Co2eTonnes),
            ],
            Adapter::GhgrpFacility => &[
                ("facility_name", CanonicalField::FacilityName),
                ("reporting_year", CanonicalField::Year),
                ("ghg_quantity_metric_tons_co2e", CanonicalField::Co2eTonnes),
            ],
            Adapter::GenericOperator => &[],
        }
    }
}

impl fmt::Display for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Adapter {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "trace_sector" => Ok(Adapter::TraceSector),
            "ghgrp_facility" => Ok(Adapter::GhgrpFacility),
            "generic_operator" => Ok(Adapter::GenericOperator),
            other => Err(format!("unknown adapter: {}", other)),
        }
    }
}

/// Normalize a raw header for fingerprint and alias matching
///
/// Lower-cases and collapses every run of non-alphanumerics to one `_`:
/// `"GHG Quantity (Metric Tons CO2e)"` → `"ghg_quantity_metric_tons_co2e"`.
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(
            normalize_header("GHG Quantity (Metric Tons CO2e)"),
            "ghg_quantity_metric_tons_co2e"
        );
        assert_eq!(normalize_header("  Facility  Name "), "facility_name");
        assert_eq!(normalize_header("co2e_tonnes"), "co2e_tonnes");
        assert_eq!(normalize_header("__Yr__"), "yr");
        assert_eq!(normalize_header("---"), "");
    }

    #[test]
    fn test_adapter_round_trip_names() {
        for adapter in [Adapter::TraceSector, Adapter::GhgrpFacility, Adapter::GenericOperator] {
            assert_eq!(adapter.as_str().parse::<Adapter>(), Ok(adapter));
            let json = serde_json::to_string(&adapter).unwrap();
            assert_eq!(json, format!("\"{}\"", adapter.as_str()));
        }
    }

    #[test]
    fn test_default_columns_cover_required_fields() {
        for adapter in Adapter::PRIORITY {
            for field in CanonicalField::REQUIRED {
                assert!(
                    adapter.default_columns().iter().any(|(_, f)| *f == field),
                    "{} lacks a default column for {}",
                    adapter,
                    field
                );
            }
        }
    }
}
