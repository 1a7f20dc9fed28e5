//! Canonical emission rows and their natural key

use emis_common::DatasetVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical target attribute of a raw column
///
/// Wire-stable names: `facility_name | year | month | co2e_tonnes | scope |
/// source | method | dataset_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    FacilityName,
    Year,
    Month,
    Co2eTonnes,
    Scope,
    Source,
    Method,
    DatasetVersion,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::FacilityName,
        CanonicalField::Year,
        CanonicalField::Month,
        CanonicalField::Co2eTonnes,
        CanonicalField::Scope,
        CanonicalField::Source,
        CanonicalField::Method,
        CanonicalField::DatasetVersion,
    ];

    /// Fields every mapping must assign
    pub const REQUIRED: [CanonicalField; 3] = [
        CanonicalField::FacilityName,
        CanonicalField::Year,
        CanonicalField::Co2eTonnes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::FacilityName => "facility_name",
            CanonicalField::Year => "year",
            CanonicalField::Month => "month",
            CanonicalField::Co2eTonnes => "co2e_tonnes",
            CanonicalField::Scope => "scope",
            CanonicalField::Source => "source",
            CanonicalField::Method => "method",
            CanonicalField::DatasetVersion => "dataset_version",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GHG Protocol emission scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "scope_1")]
    Scope1,
    #[serde(rename = "scope_2")]
    Scope2,
    #[serde(rename = "scope_3")]
    Scope3,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Scope1 => "scope_1",
            Scope::Scope2 => "scope_2",
            Scope::Scope3 => "scope_3",
        }
    }
}

impl FromStr for Scope {
    type Err = ();

    /// Accepts `1`, `scope 1`, `Scope1`, `scope_1`, `S1` (any case)
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        let digit = compact
            .strip_prefix("scope")
            .or_else(|| compact.strip_prefix('s'))
            .unwrap_or(&compact);
        match digit {
            "1" => Ok(Scope::Scope1),
            "2" => Ok(Scope::Scope2),
            "3" => Ok(Scope::Scope3),
            _ => Err(()),
        }
    }
}

/// A validated row, the unit of committed data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRow {
    pub facility_name: String,
    pub year: i32,
    pub month: Option<u8>,
    pub co2e_tonnes: f64,
    pub scope: Option<Scope>,
    pub source: String,
    pub method: Option<String>,
    pub dataset_version: DatasetVersion,
}

impl CanonicalRow {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&self.facility_name, self.year, self.month, &self.source)
    }
}

/// `(normalizedFacilityName, year, month, source)` identifying "the same fact"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
    pub facility_key: String,
    pub year: i32,
    /// 0 when the row carries no month
    pub month_key: u8,
    pub source_key: String,
}

impl NaturalKey {
    pub fn new(facility_name: &str, year: i32, month: Option<u8>, source: &str) -> Self {
        Self {
            facility_key: normalize_key_text(facility_name),
            year,
            month_key: month.unwrap_or(0),
            source_key: normalize_key_text(source),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.facility_key, self.year, self.month_key, self.source_key
        )
    }
}

/// Trim, collapse whitespace runs, lower-case
pub fn normalize_key_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Trim and collapse whitespace runs, keeping the original case
pub fn normalize_display_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
