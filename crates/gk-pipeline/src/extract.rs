//! # Extraction Seam
//!
//! [`Extractor`] is where field candidates come from. The pipeline treats it
//! as an untrusted sensor: whatever it returns is normalized and gated, never
//! acted on directly, and an extractor has no way to express a decision.
//!
//! [`HeuristicExtractor`] is the deterministic offline implementation. It
//! reads `label: value` lines, screens the raw text for prompt-injection
//! phrasing and marks hedged values as low confidence. Same input, same
//! output, no network.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use gk_core::{Confidence, ExtractionCandidate, ExtractionResult, Field};
use regex::Regex;

use crate::error::ExtractionFailure;

/// Source of extraction candidates.
///
/// Implementations must be `Send + Sync` so one extractor can serve
/// concurrent runs.
pub trait Extractor: Send + Sync {
    /// Propose candidates for `raw_text`.
    fn extract(&self, raw_text: &str) -> Result<ExtractionResult, ExtractionFailure>;

    /// Identifier recorded as the extraction model.
    fn name(&self) -> &str;
}

/// Field name used for lines that carry no label.
pub const UNLABELLED_FIELD: &str = "unknown";

/// At most this many candidates are proposed per field.
pub const MAX_CANDIDATES_PER_FIELD: usize = 2;

const LABELLED: u16 = 9_000;
const FALLBACK_SUMMARY: u16 = 6_000;
const UNLABELLED: u16 = 3_000;
const HEDGED: u16 = 4_000;

fn label_line() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([A-Za-z][A-Za-z _/-]{0,31}?)\s*:\s*(.*?)\s*$").ok())
        .as_ref()
}

fn injection_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\bignore\s+(?:all\s+|any\s+)?(?:previous|prior)\s+instructions\b",
            r"(?i)\baccept\s+this\b",
            r"(?i)\bdo\s+not\s+escalate\b",
            r"(?i)\bforce\s+accept\b",
            r"(?i)\bbypass\b",
            r"(?i)\bpolicy\s+override\b",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn hedge_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:maybe|possibly|probably|perhaps|i\s+think|not\s+sure|unsure|roughly|approx(?:imately)?)\b|\?")
            .ok()
    })
    .as_ref()
}

/// The first prompt-injection phrase in `text`, if any.
pub fn find_injection(text: &str) -> Option<&str> {
    injection_patterns()
        .iter()
        .filter_map(|re| re.find(text))
        .min_by_key(|m| m.start())
        .map(|m| m.as_str())
}

/// Map a free-text label onto a record field name.
///
/// Known synonyms map to the four record fields; anything else becomes a
/// snake_case field name the core will carry but ignore.
fn field_for_label(label: &str) -> String {
    let key: String = label
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let field = match key.as_str() {
        "summary" | "description" | "what_happened" | "incident" => Field::Summary,
        "category" | "type" | "incident_type" => Field::Category,
        "location" | "where" | "site" | "place" => Field::Location,
        "event_time" | "when" | "time" | "date_time" | "occurred_at" => Field::EventTime,
        _ => return key,
    };
    field.as_str().to_string()
}

/// Deterministic line-oriented extractor.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicExtractor {
    low_confidence_threshold: Confidence,
}

impl HeuristicExtractor {
    /// Model identifier recorded in extraction results.
    pub const MODEL: &'static str = "heuristic-v1";

    /// An extractor marking fields whose best candidate is below `threshold`.
    pub fn new(low_confidence_threshold: Confidence) -> Self {
        Self {
            low_confidence_threshold,
        }
    }

    fn confidence(base: u16, value: &str) -> Confidence {
        let hedged = hedge_pattern().is_some_and(|re| re.is_match(value));
        let bp = if hedged { base.min(HEDGED) } else { base };
        Confidence::from_basis_points(bp).unwrap_or(Confidence::ZERO)
    }
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new(Confidence::from_basis_points(5_000).unwrap_or(Confidence::ZERO))
    }
}

impl Extractor for HeuristicExtractor {
    fn extract(&self, raw_text: &str) -> Result<ExtractionResult, ExtractionFailure> {
        let mut result = ExtractionResult::empty(Self::MODEL);
        let mut per_field: BTreeMap<String, usize> = BTreeMap::new();
        let mut first_unlabelled: Option<&str> = None;

        let mut push = |result: &mut ExtractionResult, field: String, value: &str, evidence: &str, base: u16| {
            let count = per_field.entry(field.clone()).or_insert(0);
            if *count >= MAX_CANDIDATES_PER_FIELD {
                return;
            }
            *count += 1;
            let origin = u32::try_from(result.candidates.len()).unwrap_or(u32::MAX);
            result.candidates.push(ExtractionCandidate {
                field,
                value: value.to_string(),
                confidence: Self::confidence(base, value),
                evidence: Some(evidence.to_string()),
                origin,
            });
        };

        for line in raw_text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let labelled = label_line()
                .and_then(|re| re.captures(trimmed))
                .and_then(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())));
            match labelled {
                Some((label, value)) => {
                    if value.is_empty() || value.eq_ignore_ascii_case("unknown") {
                        continue;
                    }
                    push(&mut result, field_for_label(label), value, trimmed, LABELLED);
                }
                None => {
                    first_unlabelled.get_or_insert(trimmed);
                    push(&mut result, UNLABELLED_FIELD.to_string(), trimmed, trimmed, UNLABELLED);
                }
            }
        }

        if result.candidates_for(Field::Summary).next().is_none() {
            if let Some(line) = first_unlabelled {
                push(&mut result, Field::Summary.as_str().to_string(), line, line, FALLBACK_SUMMARY);
            }
        }

        for field in Field::REQUIRED {
            let best = result.candidates_for(field).map(|c| c.confidence).max();
            if best.is_some_and(|c| c < self.low_confidence_threshold) {
                result.low_confidence.insert(field);
            }
        }

        if let Some(phrase) = find_injection(raw_text) {
            result.injection_suspected = true;
            result.notes = Some(format!("instruction-like phrase in submission: {phrase:?}"));
        }

        tracing::debug!(
            model = Self::MODEL,
            candidates = result.candidates.len(),
            injection_suspected = result.injection_suspected,
            low_confidence = result.low_confidence.len(),
            "heuristic extraction complete"
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        Self::MODEL
    }
}
