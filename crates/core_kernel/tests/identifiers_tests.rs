//! Tests for the typed identifiers

use core_kernel::{ClaimId, PolicyId, TransactionId, UserId};
use uuid::Uuid;

#[test]
fn test_new_generates_unique_ids() {
    assert_ne!(PolicyId::new(), PolicyId::new());
}

#[test]
fn test_new_v7_generates_time_ordered_ids() {
    let id1 = ClaimId::new_v7();
    std::thread::sleep(std::time::Duration::from_millis(1));
    let id2 = ClaimId::new_v7();
    assert!(id1.into_uuid() < id2.into_uuid());
}

#[test]
fn test_display_carries_prefix() {
    assert!(UserId::new().to_string().starts_with("USR-"));
    assert!(TransactionId::new().to_string().starts_with("TXN-"));
    assert_eq!(PolicyId::prefix(), "POL");
}

#[test]
fn test_parse_round_trip_with_prefix() {
    let id = PolicyId::new();
    let parsed: PolicyId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn test_parse_rejects_garbage() {
    assert!("POL-not-a-uuid".parse::<PolicyId>().is_err());
}

#[test]
fn test_serializes_transparently() {
    let uuid = Uuid::new_v4();
    let id = UserId::from_uuid(uuid);
    assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{}\"", uuid));
}
