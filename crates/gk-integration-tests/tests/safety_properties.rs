//! # Safety Properties
//!
//! Property tests over arbitrary extraction results pushed through
//! normalization and the standard policy, plus audit replay of every
//! generated decision.

use gk_audit::{AuditBundleBuilder, ReplayEngine, StageTiming};
use gk_core::{
    Category, Confidence, ExtractionCandidate, ExtractionResult, Field, FlagKind, Outcome,
    QualityFlag, RunId, SubmissionMetadata, Timestamp,
};
use gk_normalize::taxonomy::match_key;
use gk_normalize::{NormalizationEngine, TaxonomyResolver};
use gk_policy::{standard_policy, PolicyEngine};
use proptest::prelude::*;

const FIELD_NAMES: [&str; 6] = [
    "summary",
    "category",
    "location",
    "event_time",
    "severity",
    "unknown",
];

fn value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("UNKNOWN".to_string()),
        Just("Near Miss".to_string()),
        Just("injury / ILLNESS".to_string()),
        Just("Chemical Spill".to_string()),
        Just("yesterday afternoon".to_string()),
        Just("2025-12-17T14:30:00Z".to_string()),
        Just("2025-12-17 14:30".to_string()),
        Just("2025-12-17".to_string()),
        Just("Dock 4".to_string()),
        "[A-Za-z0-9 :/-]{0,24}",
    ]
}

fn candidate_strategy() -> impl Strategy<Value = (usize, String, u16)> {
    (0..FIELD_NAMES.len(), value_strategy(), 0u16..=10_000)
}

fn extraction_strategy() -> impl Strategy<Value = ExtractionResult> {
    (
        prop::collection::vec(candidate_strategy(), 0..10),
        any::<bool>(),
        prop::collection::btree_set(prop::sample::select(Field::REQUIRED.to_vec()), 0..3),
    )
        .prop_map(|(candidates, injection, low)| {
            let mut result = ExtractionResult::empty("proptest");
            for (origin, (field, value, bp)) in candidates.into_iter().enumerate() {
                result.candidates.push(ExtractionCandidate {
                    field: FIELD_NAMES[field].to_string(),
                    value,
                    confidence: Confidence::from_basis_points(bp).unwrap(),
                    evidence: None,
                    origin: origin as u32,
                });
            }
            result.injection_suspected = injection;
            result.low_confidence = low;
            result
        })
}

fn raw_text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Incident report".to_string()),
        Just("it happened last night".to_string()),
        "[a-z ]{1,40}",
    ]
}

proptest! {
    #[test]
    fn missing_required_field_is_never_accepted(raw in raw_text_strategy(), extraction in extraction_strategy()) {
        let policy = standard_policy().unwrap();
        let n = NormalizationEngine::default().normalize(&raw, &extraction);
        let d = PolicyEngine::new().evaluate(&n.record, &n.flags, &policy);
        if !n.record.is_complete() {
            prop_assert_ne!(d.outcome, Outcome::Accepted);
        }
        for field in n.record.missing_fields() {
            prop_assert!(n.flags.contains(&QualityFlag::MissingField(field)));
        }
    }

    #[test]
    fn relative_time_is_never_accepted(raw in raw_text_strategy(), extraction in extraction_strategy()) {
        let policy = standard_policy().unwrap();
        let n = NormalizationEngine::default().normalize(&raw, &extraction);
        let d = PolicyEngine::new().evaluate(&n.record, &n.flags, &policy);
        if n.flags.contains(&QualityFlag::RelativeTimeUnresolved) {
            prop_assert!(matches!(d.outcome, Outcome::Escalated | Outcome::Rejected));
        }
    }

    #[test]
    fn rejected_always_has_reasons(raw in raw_text_strategy(), extraction in extraction_strategy()) {
        let policy = standard_policy().unwrap();
        let n = NormalizationEngine::default().normalize(&raw, &extraction);
        let d = PolicyEngine::new().evaluate(&n.record, &n.flags, &policy);
        if d.outcome == Outcome::Rejected {
            prop_assert!(!d.reason_codes.is_empty());
        }
        prop_assert!(policy.registry().check_decision(&d).is_ok());
    }

    #[test]
    fn injection_is_rejected(raw in raw_text_strategy(), mut extraction in extraction_strategy()) {
        extraction.injection_suspected = true;
        let policy = standard_policy().unwrap();
        let n = NormalizationEngine::default().normalize(&raw, &extraction);
        let d = PolicyEngine::new().evaluate(&n.record, &n.flags, &policy);
        prop_assert_eq!(d.outcome, Outcome::Rejected);
        prop_assert_eq!(d.reason_codes[0].as_str(), "INJECTION_DETECTED");
    }

    #[test]
    fn accepted_has_no_blockers(raw in raw_text_strategy(), extraction in extraction_strategy()) {
        let policy = standard_policy().unwrap();
        let n = NormalizationEngine::default().normalize(&raw, &extraction);
        let d = PolicyEngine::new().evaluate(&n.record, &n.flags, &policy);
        if d.outcome == Outcome::Accepted {
            prop_assert!(n.record.is_complete());
            prop_assert!(!n.flags.has_blocking());
            prop_assert!(!n.flags.has(FlagKind::MissingField, None));
        }
    }

    #[test]
    fn normalization_and_decision_are_idempotent(raw in raw_text_strategy(), extraction in extraction_strategy()) {
        let policy = standard_policy().unwrap();
        let engine = NormalizationEngine::default();
        let a = engine.normalize(&raw, &extraction);
        let b = engine.normalize(&raw, &extraction);
        prop_assert_eq!(&a, &b);
        let da = PolicyEngine::new().evaluate(&a.record, &a.flags, &policy);
        let db = PolicyEngine::new().evaluate(&b.record, &b.flags, &policy);
        prop_assert_eq!(da, db);
    }

    #[test]
    fn replay_reproduces_stored_decision(raw in raw_text_strategy(), extraction in extraction_strategy()) {
        let policy = standard_policy().unwrap();
        let at = Timestamp::parse("2025-12-18T01:30:45Z").unwrap();
        let n = NormalizationEngine::default().normalize(&raw, &extraction);
        let d = PolicyEngine::new().evaluate(&n.record, &n.flags, &policy);
        let bundle = AuditBundleBuilder::new()
            .run_id(RunId::generate("gk", at).unwrap())
            .raw_input(raw.clone(), SubmissionMetadata::received(at))
            .extraction_candidates(extraction.candidates.clone())
            .normalized(n.record, n.flags)
            .decision(d)
            .timing(StageTiming { ingested_at: at, extracted_at: at, normalized_at: at, decided_at: at })
            .build(&policy)
            .unwrap();

        let reloaded: gk_audit::RunBundle =
            serde_json::from_str(&serde_json::to_string(&bundle).unwrap()).unwrap();
        let outcome = ReplayEngine::new().replay(&reloaded, &policy).unwrap();
        prop_assert!(outcome.is_verified());
        prop_assert_eq!(outcome.decision(), &bundle.decision());
    }

    #[test]
    fn off_taxonomy_signal_never_maps(signal in "[A-Za-z /&-]{0,30}") {
        let resolver = TaxonomyResolver::standard();
        let key = match_key(&signal);
        prop_assume!(Category::ALL.iter().all(|c| match_key(c.label()) != key));

        let mut extraction = ExtractionResult::empty("proptest");
        extraction.candidates.push(ExtractionCandidate {
            field: "category".into(),
            value: signal.clone(),
            confidence: Confidence::MAX,
            evidence: None,
            origin: 0,
        });
        prop_assert_eq!(resolver.resolve(Some(&signal)).category(), None);
        let n = NormalizationEngine::default().normalize("report", &extraction);
        prop_assert_eq!(n.record.category, None);
        prop_assert!(n.flags.contains(&QualityFlag::AmbiguousCategory));
    }
}
