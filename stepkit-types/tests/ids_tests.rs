use stepkit_types::{CorrelationId, PrincipalId, RecordId};
use std::collections::HashSet;
use std::str::FromStr;

// ── CorrelationId ────────────────────────────────────────────────

#[test]
fn correlation_id_new_is_unique() {
    let a = CorrelationId::new();
    let b = CorrelationId::new();
    assert_ne!(a, b);
}

#[test]
fn correlation_id_display_and_parse() {
    let id = CorrelationId::new();
    let parsed = CorrelationId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn correlation_id_parse_invalid() {
    assert!(CorrelationId::parse("not-a-uuid").is_err());
}

// ── PrincipalId ──────────────────────────────────────────────────

#[test]
fn principal_id_nil_is_all_zero() {
    assert_eq!(
        PrincipalId::nil().to_string(),
        "00000000-0000-0000-0000-000000000000"
    );
}

#[test]
fn principal_id_from_uuid_roundtrip() {
    let uuid = uuid::Uuid::new_v4();
    assert_eq!(PrincipalId::from_uuid(uuid).as_uuid(), uuid);
}

// ── RecordId ─────────────────────────────────────────────────────

#[test]
fn record_id_from_str() {
    let id = RecordId::new();
    let parsed = RecordId::from_str(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn record_ids_hash_distinctly() {
    let set: HashSet<RecordId> = (0..50).map(|_| RecordId::new()).collect();
    assert_eq!(set.len(), 50);
}

#[test]
fn ids_serialize_transparently() {
    let id = CorrelationId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
}
