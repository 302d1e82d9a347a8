//! # Normalization Engine
//!
//! Converts extraction candidates into one [`NormalizedRecord`] and the
//! complete set of [`QualityFlags`] for it. The engine is a pure function of
//! the raw text and the extraction result: no I/O, no clock, no failure mode.

use gk_core::{
    ExtractionCandidate, ExtractionResult, Field, NormalizedRecord, QualityFlag, QualityFlags,
};

use crate::taxonomy::{is_absent_value, Resolution, TaxonomyResolver};
use crate::time::{find_relative_time, resolve_event_time, TimeResolution};

/// A normalized record together with every flag raised while producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// The typed record.
    pub record: NormalizedRecord,
    /// Quality and risk flags.
    pub flags: QualityFlags,
}

/// Stateless normalizer. `Send + Sync`; share one instance across runs.
#[derive(Debug, Clone, Default)]
pub struct NormalizationEngine {
    taxonomy: TaxonomyResolver,
}

impl NormalizationEngine {
    /// An engine using `taxonomy` for category resolution.
    pub fn new(taxonomy: TaxonomyResolver) -> Self {
        Self { taxonomy }
    }

    /// Normalize one extraction result.
    ///
    /// `raw_text` is consulted only for relative-time expressions when no
    /// event time could be promoted.
    pub fn normalize(&self, raw_text: &str, extraction: &ExtractionResult) -> Normalized {
        let mut record = NormalizedRecord::default();
        let mut flags = QualityFlags::new();

        record.summary = select_candidate(extraction.candidates_for(Field::Summary))
            .map(|c| c.value.trim().to_string());
        record.location = select_candidate(extraction.candidates_for(Field::Location))
            .map(|c| c.value.trim().to_string());

        let category_signal = select_candidate(extraction.candidates_for(Field::Category));
        match self.taxonomy.resolve(category_signal.map(|c| c.value.as_str())) {
            Resolution::Matched(category) => record.category = Some(category),
            resolution => {
                tracing::debug!(
                    signal = category_signal.map(|c| c.value.as_str()),
                    absent = resolution == Resolution::Absent,
                    "category signal did not resolve"
                );
                flags.insert(QualityFlag::AmbiguousCategory);
            }
        }

        match select_candidate(extraction.candidates_for(Field::EventTime)) {
            Some(candidate) => match resolve_event_time(&candidate.value) {
                TimeResolution::Absolute(ts) => record.event_time = Some(ts),
                TimeResolution::Unresolved(why) => {
                    tracing::debug!(
                        value = %candidate.value,
                        reason = why.as_str(),
                        "event_time not promoted"
                    );
                    flags.insert(QualityFlag::RelativeTimeUnresolved);
                }
            },
            None => {
                if let Some(expr) = find_relative_time(raw_text) {
                    tracing::debug!(expression = expr, "relative time in raw text");
                    flags.insert(QualityFlag::RelativeTimeUnresolved);
                }
            }
        }

        flags.extend(record.missing_fields().into_iter().map(QualityFlag::MissingField));

        if extraction.injection_suspected {
            flags.insert(QualityFlag::InjectionSuspected);
        }
        flags.extend(
            extraction
                .low_confidence
                .iter()
                .copied()
                .map(QualityFlag::LowConfidence),
        );

        Normalized { record, flags }
    }
}

/// Pick the winning candidate: highest confidence, then earliest origin.
///
/// Blank values and the `UNKNOWN` sentinel are not candidates. The winner is
/// chosen before any validation, so a failing winner never lets a weaker
/// candidate through.
pub fn select_candidate<'a>(
    candidates: impl Iterator<Item = &'a ExtractionCandidate>,
) -> Option<&'a ExtractionCandidate> {
    candidates
        .filter(|c| !is_absent_value(&c.value))
        .min_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then(a.origin.cmp(&b.origin))
        })
}
