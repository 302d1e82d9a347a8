//! # Extraction Types: What the Extraction Stage Hands Over
//!
//! The extraction stage is an external sensor: it proposes candidate values
//! with a confidence and an evidence excerpt, and raises risk signals. It
//! never decides an outcome. Everything here is immutable once produced.
//!
//! Confidence is carried as integer basis points rather than a float so that
//! candidate ordering is exact and every stored candidate canonicalizes.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// A field of the normalized incident record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Short description of what happened.
    Summary,
    /// Canonical incident category.
    Category,
    /// Where it happened.
    Location,
    /// When it happened, as an absolute instant.
    EventTime,
}

impl Field {
    /// Fields that must be present for a submission to be accepted.
    pub const REQUIRED: [Field; 4] = [
        Field::Summary,
        Field::Category,
        Field::Location,
        Field::EventTime,
    ];

    /// Wire name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Category => "category",
            Self::Location => "location",
            Self::EventTime => "event_time",
        }
    }

    /// Look up a field by wire name. Unknown names return `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::REQUIRED.into_iter().find(|f| f.as_str() == name)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

/// A confidence score in basis points (`0..=10000`, i.e. `0.0..=1.0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Confidence(u16);

impl Confidence {
    /// Full confidence.
    pub const MAX: Confidence = Confidence(10_000);
    /// No confidence.
    pub const ZERO: Confidence = Confidence(0);

    /// Construct from basis points.
    pub fn from_basis_points(bp: u16) -> Result<Self, ValidationError> {
        if bp > 10_000 {
            return Err(ValidationError::InvalidConfidence(format!("{bp}bp")));
        }
        Ok(Self(bp))
    }

    /// Construct from a probability in `0.0..=1.0`, rounded to the nearest
    /// basis point.
    pub fn from_f64(p: f64) -> Result<Self, ValidationError> {
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(ValidationError::InvalidConfidence(p.to_string()));
        }
        Ok(Self((p * 10_000.0).round() as u16))
    }

    /// Basis points.
    pub fn basis_points(&self) -> u16 {
        self.0
    }

    /// As a probability.
    pub fn as_f64(&self) -> f64 {
        f64::from(self.0) / 10_000.0
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bp = u16::deserialize(deserializer)?;
        Self::from_basis_points(bp).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.as_f64())
    }
}

// ---------------------------------------------------------------------------
// ExtractionCandidate / ExtractionResult
// ---------------------------------------------------------------------------

/// One proposed value for one field.
///
/// `field` is kept as the extractor's raw name: fields the core does not know
/// are carried into the run bundle, not dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionCandidate {
    /// Field name as emitted by the extractor.
    pub field: String,
    /// Proposed value, verbatim.
    pub value: String,
    /// How strongly the extractor believes the value is supported.
    pub confidence: Confidence,
    /// Verbatim excerpt of the raw input supporting the value.
    pub evidence: Option<String>,
    /// Position of the candidate in the extractor's output.
    pub origin: u32,
}

impl ExtractionCandidate {
    /// The known field this candidate proposes a value for, if any.
    pub fn known_field(&self) -> Option<Field> {
        Field::from_name(&self.field)
    }
}

/// The typed result of the extraction stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Identifier of the model or extractor that produced the candidates.
    pub model: String,
    /// Zero or more candidates per field.
    #[serde(default)]
    pub candidates: Vec<ExtractionCandidate>,
    /// The extractor saw signs of a prompt-injection attempt.
    #[serde(default)]
    pub injection_suspected: bool,
    /// Fields the extractor considers weakly supported.
    #[serde(default)]
    pub low_confidence: BTreeSet<Field>,
    /// Free-form extractor notes.
    #[serde(default)]
    pub notes: Option<String>,
}

impl ExtractionResult {
    /// An empty result from `model`.
    pub fn empty(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            candidates: Vec::new(),
            injection_suspected: false,
            low_confidence: BTreeSet::new(),
            notes: None,
        }
    }

    /// Candidates proposing a value for `field`, in extractor order.
    pub fn candidates_for(&self, field: Field) -> impl Iterator<Item = &ExtractionCandidate> {
        self.candidates
            .iter()
            .filter(move |c| c.known_field() == Some(field))
    }

    /// Distinct candidate field names the core does not recognise.
    pub fn unknown_fields(&self) -> BTreeSet<&str> {
        self.candidates
            .iter()
            .filter(|c| c.known_field().is_none())
            .map(|c| c.field.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(field: &str, value: &str, origin: u32) -> ExtractionCandidate {
        ExtractionCandidate {
            field: field.to_string(),
            value: value.to_string(),
            confidence: Confidence::from_basis_points(9000).unwrap(),
            evidence: None,
            origin,
        }
    }

    #[test]
    fn field_names_round_trip() {
        for f in Field::REQUIRED {
            assert_eq!(Field::from_name(f.as_str()), Some(f));
        }
        assert_eq!(Field::from_name("severity"), None);
        assert_eq!(
            serde_json::to_string(&Field::EventTime).unwrap(),
            "\"event_time\""
        );
    }

    #[test]
    fn confidence_bounds() {
        assert!(Confidence::from_basis_points(10_000).is_ok());
        assert!(Confidence::from_basis_points(10_001).is_err());
        assert!(Confidence::from_f64(1.5).is_err());
        assert!(Confidence::from_f64(f64::NAN).is_err());
        assert_eq!(Confidence::from_f64(0.85).unwrap().basis_points(), 8500);
    }

    #[test]
    fn confidence_deserialize_rejects_out_of_range() {
        let bad: Result<Confidence, _> = serde_json::from_str("20000");
        assert!(bad.is_err());
        let ok: Confidence = serde_json::from_str("7500").unwrap();
        assert_eq!(ok.basis_points(), 7500);
    }

    #[test]
    fn candidates_for_filters_by_field() {
        let mut result = ExtractionResult::empty("test");
        result.candidates = vec![
            candidate("summary", "Forklift tipped", 0),
            candidate("location", "Building 4", 1),
            candidate("severity", "High", 2),
            candidate("summary", "Forklift fell", 3),
        ];
        let origins: Vec<u32> = result
            .candidates_for(Field::Summary)
            .map(|c| c.origin)
            .collect();
        assert_eq!(origins, vec![0, 3]);
        assert_eq!(result.unknown_fields().into_iter().collect::<Vec<_>>(), vec!["severity"]);
    }

    #[test]
    fn extraction_result_defaults_optional_sections() {
        let result: ExtractionResult = serde_json::from_str(r#"{"model": "m"}"#).unwrap();
        assert!(result.candidates.is_empty());
        assert!(!result.injection_suspected);
        assert!(result.low_confidence.is_empty());
    }
}
