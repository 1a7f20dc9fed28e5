//! Raw header → canonical field assignments

use super::canonical::CanonicalField;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Target of one raw column
///
/// Serialized as the canonical field name, or `null` for [`ColumnTarget::Ignored`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<CanonicalField>", into = "Option<CanonicalField>")]
pub enum ColumnTarget {
    Field(CanonicalField),
    Ignored,
}

impl ColumnTarget {
    pub fn field(&self) -> Option<CanonicalField> {
        match self {
            ColumnTarget::Field(field) => Some(*field),
            ColumnTarget::Ignored => None,
        }
    }
}

impl From<Option<CanonicalField>> for ColumnTarget {
    fn from(value: Option<CanonicalField>) -> Self {
        value.map_or(ColumnTarget::Ignored, ColumnTarget::Field)
    }
}

impl From<ColumnTarget> for Option<CanonicalField> {
    fn from(value: ColumnTarget) -> Self {
        value.field()
    }
}

/// Column mapping produced by assisted suggestion or manual edit
///
/// Both preview and commit consume the same value; headers absent from the
/// uploaded file are inert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMapping {
    pub mapping: BTreeMap<String, ColumnTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl HeaderMapping {
    /// Every header explicitly ignored
    pub fn all_ignored<S: AsRef<str>>(headers: &[S], notes: Option<String>) -> Self {
        Self {
            mapping: headers
                .iter()
                .map(|h| (h.as_ref().to_string(), ColumnTarget::Ignored))
                .collect(),
            notes,
        }
    }

    pub fn assign(&mut self, header: impl Into<String>, field: CanonicalField) {
        self.mapping.insert(header.into(), ColumnTarget::Field(field));
    }

    pub fn target(&self, header: &str) -> ColumnTarget {
        self.mapping
            .get(header)
            .copied()
            .unwrap_or(ColumnTarget::Ignored)
    }

    /// Raw headers assigned to `field`, in mapping order
    pub fn headers_for(&self, field: CanonicalField) -> Vec<&str> {
        self.mapping
            .iter()
            .filter(|(_, target)| target.field() == Some(field))
            .map(|(header, _)| header.as_str())
            .collect()
    }

    pub fn is_empty_assignment(&self) -> bool {
        self.mapping.values().all(|t| *t == ColumnTarget::Ignored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_deserializes_to_ignored() {
        let mapping: HeaderMapping = serde_json::from_str(
            r#"{"mapping": {"Site": "facility_name", "Notes": null}}"#,
        )
        .unwrap();

        assert_eq!(
            mapping.target("Site"),
            ColumnTarget::Field(CanonicalField::FacilityName)
        );
        assert_eq!(mapping.target("Notes"), ColumnTarget::Ignored);
        assert_eq!(mapping.target("Missing"), ColumnTarget::Ignored);
        assert_eq!(mapping.notes, None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = serde_json::from_str::<HeaderMapping>(r#"{"mapping": {"Site": "site"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serializes_ignored_as_null() {
        let mut mapping = HeaderMapping::all_ignored(&["A", "B"], Some("note".to_string()));
        mapping.assign("A", CanonicalField::Year);

        let json = serde_json::to_value(&mapping).unwrap();
        assert_eq!(json["mapping"]["A"], "year");
        assert!(json["mapping"]["B"].is_null());
        assert_eq!(json["notes"], "note");
    }

    #[test]
    fn test_headers_for() {
        let mut mapping = HeaderMapping::default();
        mapping.assign("Tons", CanonicalField::Co2eTonnes);
        mapping.assign("Tonnes", CanonicalField::Co2eTonnes);
        mapping.assign("Yr", CanonicalField::Year);

        assert_eq!(mapping.headers_for(CanonicalField::Co2eTonnes), vec!["Tonnes", "Tons"]);
        assert!(mapping.headers_for(CanonicalField::Month).is_empty());
        assert!(!mapping.is_empty_assignment());
    }
}
