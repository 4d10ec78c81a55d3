// src/models/core.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static NPI_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{10}$").unwrap());

/// Which upstream feed a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Claims,
    License,
    Affiliation,
    Publication,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Claims => "claims",
            SourceType::License => "license",
            SourceType::Affiliation => "affiliation",
            SourceType::Publication => "publication",
        }
    }

    /// Attribute-selection priority when merging a cluster (higher wins).
    pub fn priority(&self) -> u8 {
        match self {
            SourceType::Claims => 4,
            SourceType::License => 3,
            SourceType::Affiliation => 2,
            SourceType::Publication => 1,
        }
    }

    /// Entity confidence assigned to a cluster made of a single record from this source.
    pub fn base_confidence(&self) -> f64 {
        match self {
            SourceType::Claims => 0.85,
            SourceType::License => 0.80,
            SourceType::Affiliation => 0.70,
            SourceType::Publication => 0.50,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the trimmed NPI if it is exactly ten ASCII digits.
pub fn well_formed_npi(raw: Option<&str>) -> Option<&str> {
    let trimmed = raw?.trim();
    if NPI_PATTERN.is_match(trimmed) {
        Some(trimmed)
    } else {
        None
    }
}

/// Treats empty and whitespace-only strings as absent.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A physician record as produced by the normalization stage.
///
/// Records are read-only inside the resolution core. Every optional field
/// degrades to "unknown" during scoring when it is missing or blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub source: SourceType,
    /// Unique within a run; used as the identity-graph node key.
    pub source_id: String,
    #[serde(default)]
    pub npi: Option<String>,

    #[serde(default)]
    pub name_raw: Option<String>,
    #[serde(default)]
    pub name_first: Option<String>,
    pub name_last: String,
    #[serde(default)]
    pub name_middle: Option<String>,
    #[serde(default)]
    pub name_suffix: Option<String>,

    #[serde(default)]
    pub specialty: Option<String>,

    #[serde(default)]
    pub facility_name: Option<String>,
    #[serde(default)]
    pub facility_address: Option<String>,
    #[serde(default)]
    pub facility_city: Option<String>,
    #[serde(default)]
    pub facility_state: Option<String>,
    #[serde(default)]
    pub facility_zip: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl NormalizedRecord {
    pub fn new(source: SourceType, source_id: impl Into<String>, name_last: impl Into<String>) -> Self {
        Self {
            source,
            source_id: source_id.into(),
            npi: None,
            name_raw: None,
            name_first: None,
            name_last: name_last.into(),
            name_middle: None,
            name_suffix: None,
            specialty: None,
            facility_name: None,
            facility_address: None,
            facility_city: None,
            facility_state: None,
            facility_zip: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn with_npi(mut self, npi: impl Into<String>) -> Self {
        self.npi = Some(npi.into());
        self
    }

    pub fn with_first_name(mut self, first: impl Into<String>) -> Self {
        self.name_first = Some(first.into());
        self
    }

    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    pub fn with_facility(
        mut self,
        name: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        self.facility_name = Some(name.into());
        self.facility_city = Some(city.into());
        self.facility_state = Some(state.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.facility_state = Some(state.into());
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// The NPI, only when it is present and well-formed.
    pub fn valid_npi(&self) -> Option<&str> {
        well_formed_npi(self.npi.as_deref())
    }

    pub fn last_name(&self) -> Option<&str> {
        non_blank(Some(self.name_last.as_str()))
    }

    pub fn first_name(&self) -> Option<&str> {
        non_blank(self.name_first.as_deref())
    }

    pub fn state(&self) -> Option<&str> {
        non_blank(self.facility_state.as_deref())
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    /// The name as the source printed it, or "First Middle Last Suffix" when it did not.
    pub fn display_name(&self) -> Option<String> {
        if let Some(raw) = non_blank(self.name_raw.as_deref()) {
            return Some(raw.to_string());
        }
        let parts: Vec<&str> = [
            non_blank(self.name_first.as_deref()),
            non_blank(self.name_middle.as_deref()),
            self.last_name(),
            non_blank(self.name_suffix.as_deref()),
        ]
        .into_iter()
        .flatten()
        .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_npi() {
        assert_eq!(well_formed_npi(Some("1234567890")), Some("1234567890"));
        assert_eq!(well_formed_npi(Some(" 1234567890 ")), Some("1234567890"));
        assert_eq!(well_formed_npi(Some("123456789")), None);
        assert_eq!(well_formed_npi(Some("12345678901")), None);
        assert_eq!(well_formed_npi(Some("12345abcde")), None);
        assert_eq!(well_formed_npi(Some("")), None);
        assert_eq!(well_formed_npi(None), None);
    }

    #[test]
    fn test_display_name_prefers_raw() {
        let mut record = NormalizedRecord::new(SourceType::Claims, "c1", "Smith").with_first_name("John");
        assert_eq!(record.display_name().as_deref(), Some("John Smith"));

        record.name_raw = Some("Dr. John A. Smith, MD".to_string());
        assert_eq!(record.display_name().as_deref(), Some("Dr. John A. Smith, MD"));
    }

    #[test]
    fn test_blank_fields_are_absent() {
        let record = NormalizedRecord::new(SourceType::License, "l1", "  ")
            .with_first_name("")
            .with_state(" ");
        assert!(record.last_name().is_none());
        assert!(record.first_name().is_none());
        assert!(record.state().is_none());
        assert!(record.display_name().is_none());
    }

    #[test]
    fn test_source_priorities_are_ordered() {
        assert!(SourceType::Claims.priority() > SourceType::License.priority());
        assert!(SourceType::License.priority() > SourceType::Affiliation.priority());
        assert!(SourceType::Affiliation.priority() > SourceType::Publication.priority());
        assert_eq!(SourceType::Publication.base_confidence(), 0.50);
    }

    #[test]
    fn test_record_deserializes_with_missing_optionals() {
        let json = r#"{"source":"affiliation","source_id":"a-17","name_last":"Jones"}"#;
        let record: NormalizedRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.source, SourceType::Affiliation);
        assert!(record.npi.is_none());
        assert!(record.coordinates().is_none());
    }
}
