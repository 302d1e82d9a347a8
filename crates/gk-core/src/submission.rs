//! # Submission Metadata
//!
//! Context captured at intake alongside the raw text. It travels with the run
//! into the bundle verbatim and never influences a decision.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::temporal::Timestamp;

/// Who sent a submission, from where, and when it arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    /// Intake channel, e.g. `email`, `form`, `cli`.
    #[serde(default)]
    pub source: Option<String>,
    /// Identity of the submitter as reported by the channel.
    #[serde(default)]
    pub submitted_by: Option<String>,
    /// Owning business unit.
    #[serde(default)]
    pub business_unit: Option<String>,
    /// When the submission was received. Defaulted at ingest when absent.
    pub received_at: Timestamp,
    /// Free-form channel attributes.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl SubmissionMetadata {
    /// Metadata with only a receipt time.
    pub fn received(at: Timestamp) -> Self {
        Self {
            source: None,
            submitted_by: None,
            business_unit: None,
            received_at: at,
            extra: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_sections_default() {
        let m: SubmissionMetadata =
            serde_json::from_str(r#"{"received_at": "2025-12-18T01:30:45Z"}"#).unwrap();
        assert_eq!(m, SubmissionMetadata::received(Timestamp::parse("2025-12-18T01:30:45Z").unwrap()));
    }

    #[test]
    fn extra_is_ordered() {
        let mut m = SubmissionMetadata::received(Timestamp::parse("2025-12-18T01:30:45Z").unwrap());
        m.extra.insert("z".into(), "1".into());
        m.extra.insert("a".into(), "2".into());
        let json = serde_json::to_string(&m.extra).unwrap();
        assert_eq!(json, r#"{"a":"2","z":"1"}"#);
    }
}
