//! # Canonical Form Vectors
//!
//! Pins the canonical bytes and SHA-256 digests of the values that end up in
//! run bundles. Any change to field names, serde attributes or flag ordering
//! shows up here before it silently changes stored digests.

use gk_core::{
    sha256_digest, CanonicalBytes, Category, Field, NormalizedRecord, QualityFlag, QualityFlags,
    Timestamp,
};

fn record() -> NormalizedRecord {
    NormalizedRecord {
        summary: Some("Pallet fell from rack".into()),
        category: Some(Category::NearMiss),
        location: Some("Warehouse B, Dock 3".into()),
        event_time: Some(Timestamp::parse("2025-12-17T14:30:00Z").unwrap()),
    }
}

#[test]
fn normalized_record_canonical_bytes() {
    let cb = CanonicalBytes::new(&record()).unwrap();
    assert_eq!(
        std::str::from_utf8(cb.as_bytes()).unwrap(),
        r#"{"category":"Near Miss","event_time":"2025-12-17T14:30:00Z","location":"Warehouse B, Dock 3","summary":"Pallet fell from rack"}"#
    );
    assert_eq!(
        sha256_digest(&cb).to_hex(),
        "308355d24ae8706ed8538d219743f28718fb4097e22063a1367f57c12f32f277"
    );
}

#[test]
fn absent_fields_canonicalize_as_null() {
    let cb = CanonicalBytes::new(&NormalizedRecord::default()).unwrap();
    assert_eq!(
        cb.as_bytes(),
        br#"{"category":null,"event_time":null,"location":null,"summary":null}"#
    );
}

#[test]
fn quality_flags_canonical_bytes_ignore_insertion_order() {
    let forward: QualityFlags = [
        QualityFlag::MissingField(Field::Location),
        QualityFlag::AmbiguousCategory,
    ]
    .into_iter()
    .collect();
    let reverse: QualityFlags = [
        QualityFlag::AmbiguousCategory,
        QualityFlag::MissingField(Field::Location),
    ]
    .into_iter()
    .collect();

    let a = CanonicalBytes::new(&forward).unwrap();
    let b = CanonicalBytes::new(&reverse).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        std::str::from_utf8(a.as_bytes()).unwrap(),
        r#"[{"field":"location","flag":"missing_field"},{"flag":"ambiguous_category"}]"#
    );
    assert_eq!(
        sha256_digest(&a).to_hex(),
        "3dad5892720f3f191988aafdf2a8b2a73400bac5757a6321289e47e80cafd228"
    );
}

#[test]
fn record_key_order_in_source_is_irrelevant() {
    let a: serde_json::Value = serde_json::from_str(
        r#"{"summary":"x","location":"y","category":"Near Miss","event_time":null}"#,
    )
    .unwrap();
    let b: serde_json::Value = serde_json::from_str(
        r#"{"event_time":null,"category":"Near Miss","location":"y","summary":"x"}"#,
    )
    .unwrap();
    assert_eq!(
        sha256_digest(&CanonicalBytes::new(&a).unwrap()),
        sha256_digest(&CanonicalBytes::new(&b).unwrap())
    );
}
