//! # Intake
//!
//! Captures a submission exactly as received. The raw text is never trimmed
//! or rewritten; intake only checks that there is something to process and
//! that it is within the size limit, and defaults `received_at`.

use std::collections::BTreeMap;

use gk_core::{SubmissionMetadata, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};

/// A submission as handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Unstructured submission text.
    pub raw_text: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub submitted_by: Option<String>,
    #[serde(default)]
    pub business_unit: Option<String>,
    /// Receipt time; intake stamps the current time when absent.
    #[serde(default)]
    pub received_at: Option<Timestamp>,
    /// Any other channel attributes.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Submission {
    /// A bare submission with no metadata.
    pub fn from_text(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            source: None,
            submitted_by: None,
            business_unit: None,
            received_at: None,
            extra: BTreeMap::new(),
        }
    }

    /// Set the intake channel.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A submission that passed intake validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intake {
    /// Submission text, unchanged.
    pub raw_text: String,
    /// Metadata with the receive time filled in.
    pub metadata: SubmissionMetadata,
}

/// Validate a submission and complete its metadata.
///
/// # Errors
///
/// `EmptyInput` for blank text, `InputTooLarge` when the text exceeds
/// `max_input_bytes`.
pub fn ingest(
    submission: Submission,
    max_input_bytes: usize,
    now: Timestamp,
) -> Result<Intake, ValidationError> {
    if submission.raw_text.trim().is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    let actual = submission.raw_text.len();
    if actual > max_input_bytes {
        return Err(ValidationError::InputTooLarge {
            actual,
            limit: max_input_bytes,
        });
    }
    let Submission {
        raw_text,
        source,
        submitted_by,
        business_unit,
        received_at,
        extra,
    } = submission;
    Ok(Intake {
        raw_text,
        metadata: SubmissionMetadata {
            source,
            submitted_by,
            business_unit,
            received_at: received_at.unwrap_or(now),
            extra,
        },
    })
}
