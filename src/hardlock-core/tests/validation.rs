//! Scenario tests for the validation facade.
//!
//! These exercise the full pipeline (parse, MAC, expiry, hardware binding,
//! feature queries) in both lenient and strict modes, including the
//! layout-independence guarantees of the canonical codec.

use chrono::{TimeZone, Utc};
use serde_json::Value;

use hardlock_core::{
    FailureKind, HwidConfig, LicenseDraft, LicenseError, LicenseManager, LicenseToken,
    SCHEMA_VERSION, WILDCARD_HARDWARE,
};

const SECRET: &[u8] = b"s";

fn wildcard_draft(features: &[&str]) -> LicenseDraft {
    LicenseDraft {
        user_id: "u".to_string(),
        license_id: "lic-0001".to_string(),
        hardware_hash: WILDCARD_HARDWARE.to_string(),
        features: features.iter().map(|f| f.to_string()).collect(),
        issued_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        expiry: Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap(),
        version: Some(SCHEMA_VERSION),
    }
}

/// Parse, mutate through JSON, and re-serialize a token.
fn rewrite(bytes: &[u8], mutate: impl FnOnce(&mut Value)) -> Vec<u8> {
    let mut value: Value = serde_json::from_slice(bytes).unwrap();
    mutate(&mut value);
    value.to_string().into_bytes()
}

#[test]
fn round_trip_wildcard_license() {
    let mut manager = LicenseManager::new(SECRET);
    let token = manager.generate(wildcard_draft(&["a", "b"])).unwrap();

    let info = manager.load_and_validate(&token).unwrap();
    assert!(info.valid);
    assert_eq!(info.failure, None);
    assert_eq!(info.user_id, "u");
    assert_eq!(info.features, vec!["a".to_string(), "b".to_string()]);

    assert!(manager.has_feature("a").unwrap());
    assert!(!manager.has_feature("c").unwrap());
}

#[test]
fn expired_license_is_rejected() {
    let mut manager = LicenseManager::new(SECRET);
    let mut draft = wildcard_draft(&["a"]);
    draft.issued_at = Some(Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap());
    draft.expiry = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
    let token = manager.generate(draft).unwrap();

    let info = manager.load_and_validate(&token).unwrap();
    assert!(!info.valid);
    assert_eq!(info.failure, Some(FailureKind::Expired));

    manager.set_strict_validation(true);
    assert!(matches!(
        manager.load_and_validate(&token),
        Err(LicenseError::Expired { .. })
    ));
}

#[test]
fn tampered_user_id_is_an_invalid_signature() {
    let mut manager = LicenseManager::new(SECRET);
    let token = manager.generate(wildcard_draft(&["a"])).unwrap();

    let tampered = rewrite(&token, |value| {
        value["user_id"] = Value::String("v".to_string());
    });

    let info = manager.load_and_validate(&tampered).unwrap();
    assert!(!info.valid);
    assert_eq!(info.failure, Some(FailureKind::InvalidSignature));
    // The tampered fields are still reported back to the caller.
    assert_eq!(info.user_id, "v");
}

#[test]
fn hardware_bound_license_tracks_builder_configuration() {
    let mut manager = LicenseManager::new(SECRET);
    let fingerprint = manager.current_hardware_id().unwrap();

    let mut draft = wildcard_draft(&["a"]);
    draft.hardware_hash = fingerprint;
    let token = manager.generate(draft).unwrap();

    // Same machine, same configuration: valid.
    let info = manager.load_and_validate(&token).unwrap();
    assert!(info.valid);

    // Dropping a probe from the combination changes the fingerprint, so the
    // same token no longer matches this machine.
    manager.set_hardware_config(HwidConfig {
        mac_address: false,
        ..HwidConfig::default()
    });
    let info = manager.load_and_validate(&token).unwrap();
    assert!(!info.valid);
    assert_eq!(info.failure, Some(FailureKind::HardwareMismatch));

    manager.set_strict_validation(true);
    assert!(matches!(
        manager.load_and_validate(&token),
        Err(LicenseError::HardwareMismatch { .. })
    ));
}

#[test]
fn wildcard_license_still_fails_other_checks() {
    let mut manager = LicenseManager::new(SECRET);

    // Wildcard does not rescue an expired token.
    let mut expired = wildcard_draft(&["a"]);
    expired.issued_at = Some(Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap());
    expired.expiry = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
    let token = manager.generate(expired).unwrap();
    let info = manager.load_and_validate(&token).unwrap();
    assert_eq!(info.failure, Some(FailureKind::Expired));

    // Nor a tampered one: the MAC check runs before the binding
    // short-circuit.
    let token = manager.generate(wildcard_draft(&["a"])).unwrap();
    let tampered = rewrite(&token, |value| {
        value["license_id"] = Value::String("lic-9999".to_string());
    });
    let info = manager.load_and_validate(&tampered).unwrap();
    assert_eq!(info.failure, Some(FailureKind::InvalidSignature));

    // Nor does it grant features the license does not carry.
    manager.load_and_validate(&token).unwrap();
    assert!(matches!(
        manager.require_feature("absent"),
        Err(LicenseError::MissingFeature { .. })
    ));
}

#[test]
fn relayout_yields_identical_verdict() {
    let mut manager = LicenseManager::new(SECRET);
    let token = manager.generate(wildcard_draft(&["a", "b"])).unwrap();

    // Round-tripping through a serde_json::Value reorders the fields
    // (BTreeMap order) and pretty-printing adds whitespace: same logical
    // token, completely different bytes.
    let value: Value = serde_json::from_slice(&token).unwrap();
    let relaid = serde_json::to_string_pretty(&value).unwrap();
    assert_ne!(relaid.as_bytes(), &token[..]);

    let original = manager.load_and_validate(&token).unwrap();
    let reparsed = manager.load_and_validate(relaid.as_bytes()).unwrap();
    assert_eq!(original, reparsed);
    assert!(reparsed.valid);

    // The same holds for a failing token: the verdict kind is unchanged.
    let mut expired = wildcard_draft(&["a"]);
    expired.issued_at = Some(Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap());
    expired.expiry = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
    let token = manager.generate(expired).unwrap();
    let value: Value = serde_json::from_slice(&token).unwrap();
    let relaid = serde_json::to_string_pretty(&value).unwrap();

    let original = manager.load_and_validate(&token).unwrap();
    let reparsed = manager.load_and_validate(relaid.as_bytes()).unwrap();
    assert_eq!(original.failure, reparsed.failure);
}

#[test]
fn reordered_features_fail_the_mac() {
    let mut manager = LicenseManager::new(SECRET);
    let token = manager.generate(wildcard_draft(&["a", "b"])).unwrap();

    let reordered = rewrite(&token, |value| {
        value["features"] = serde_json::json!(["b", "a"]);
    });

    // Features are order-significant: this is a different license, and the
    // MAC says so.
    let info = manager.load_and_validate(&reordered).unwrap();
    assert!(!info.valid);
    assert_eq!(info.failure, Some(FailureKind::InvalidSignature));
}

#[test]
fn changing_any_signed_field_invalidates() {
    let mut manager = LicenseManager::new(SECRET);
    let token = manager.generate(wildcard_draft(&["a", "b"])).unwrap();

    let mutations: Vec<(&str, Value)> = vec![
        ("user_id", Value::String("x".to_string())),
        ("license_id", Value::String("x".to_string())),
        ("hardware_hash", Value::String("deadbeef".to_string())),
        ("features", serde_json::json!(["a"])),
        ("issued_at", Value::String("2024-06-01T00:00:00Z".to_string())),
        ("expiry", Value::String("2098-01-01T00:00:00Z".to_string())),
    ];

    for (field, replacement) in mutations {
        let tampered = rewrite(&token, |value| {
            value[field] = replacement;
        });
        let info = manager.load_and_validate(&tampered).unwrap();
        assert_eq!(
            info.failure,
            Some(FailureKind::InvalidSignature),
            "mutating '{field}' must invalidate the MAC"
        );
    }
}

#[test]
fn structural_failures_report_their_kind() {
    let mut manager = LicenseManager::new(SECRET);

    let cases: Vec<Vec<u8>> = vec![
        b"not json at all".to_vec(),
        b"{}".to_vec(),
        rewrite(
            &manager.generate(wildcard_draft(&["a"])).unwrap(),
            |value| value["version"] = serde_json::json!(7),
        ),
        rewrite(
            &manager.generate(wildcard_draft(&["a"])).unwrap(),
            |value| value["mac"] = Value::String("abc".to_string()),
        ),
        rewrite(
            &manager.generate(wildcard_draft(&["a"])).unwrap(),
            |value| value["issued_at"] = Value::String("yesterday".to_string()),
        ),
    ];

    for bytes in cases {
        let info = manager.load_and_validate(&bytes).unwrap();
        assert!(!info.valid);
        assert_eq!(info.failure, Some(FailureKind::Structural));
    }
}

#[test]
fn generated_tokens_parse_back_identically() {
    let manager = LicenseManager::new(SECRET);
    let bytes = manager.generate(wildcard_draft(&["a", "b", "a"])).unwrap();

    let parsed = LicenseToken::parse(&bytes).unwrap();
    // Duplicates and order survive the round trip.
    assert_eq!(
        parsed.features,
        vec!["a".to_string(), "b".to_string(), "a".to_string()]
    );

    let reparsed = LicenseToken::parse(&parsed.to_bytes()).unwrap();
    assert_eq!(reparsed, parsed);
}

#[test]
fn shared_builder_serves_multiple_managers() {
    use hardlock_core::FingerprintBuilder;
    use std::sync::Arc;

    let builder = Arc::new(FingerprintBuilder::default());
    let manager_a = LicenseManager::with_builder(b"ka", Arc::clone(&builder));
    let manager_b = LicenseManager::with_builder(b"kb", Arc::clone(&builder));

    let id_a = manager_a.current_hardware_id().unwrap();
    let id_b = manager_b.current_hardware_id().unwrap();
    assert_eq!(id_a, id_b);

    // Both managers were served by one probe run.
    let stats = builder.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}
