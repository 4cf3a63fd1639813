use super::*;
use crate::constants::STATE_FILE_VERSION;
use crate::errors::FormatError;
use crate::test_utils::assoc;
use crate::test_utils::qos;
use crate::test_utils::user;
use crate::test_utils::wckey;
use crate::Error;

fn sample_snapshot() -> StateSnapshot {
    StateSnapshot {
        timestamp: 1_700_000_000,
        assocs: Some(vec![
            assoc(1, 0, "root", None, 1),
            assoc(2, 1, "acct", Some("alice"), 10),
        ]),
        qos: Some(vec![qos(5, "fast", 100)]),
        users: Some(vec![user("alice", 1000)]),
        wckeys: Some(vec![wckey(7, "proj-x", "alice")]),
    }
}

/// Derived linkage is not serialized; persistent fields round-trip
/// field-for-field.
#[test]
fn test_state_round_trip() {
    let mut snapshot = sample_snapshot();
    // Derived fields on the in-memory copy.
    if let Some(list) = snapshot.assocs.as_mut() {
        list[1].parent_ref = Some(1);
        list[1].shares_norm = 0.25;
    }

    let bytes = encode_state(&snapshot).unwrap();
    let decoded = decode_state(&bytes).unwrap();

    assert_eq!(decoded.timestamp, snapshot.timestamp);
    let decoded_assocs = decoded.assocs.unwrap();
    assert_eq!(decoded_assocs.len(), 2);
    assert_eq!(decoded_assocs[1].id, 2);
    assert_eq!(decoded_assocs[1].account, "acct");
    assert_eq!(decoded_assocs[1].shares_raw, 10);
    // Re-derived, not serialized.
    assert_eq!(decoded_assocs[1].parent_ref, None);
    assert_eq!(decoded_assocs[1].shares_norm, 0.0);

    assert_eq!(decoded.qos.unwrap()[0].name, "fast");
    assert_eq!(decoded.users.unwrap()[0].uid, Some(1000));
    assert_eq!(decoded.wckeys.unwrap()[0].id, 7);
}

#[test]
fn test_empty_tables_write_no_blocks() {
    let snapshot = StateSnapshot {
        timestamp: 5,
        assocs: Some(Vec::new()),
        ..StateSnapshot::default()
    };
    let bytes = encode_state(&snapshot).unwrap();
    // Header only: u16 version + i64 timestamp.
    assert_eq!(bytes.len(), 10);

    let decoded = decode_state(&bytes).unwrap();
    assert!(decoded.assocs.is_none());
}

#[test]
fn test_version_below_min_is_rejected() {
    let mut bytes = encode_state(&sample_snapshot()).unwrap();
    bytes[0..2].copy_from_slice(&0u16.to_le_bytes());

    let err = decode_state(&bytes).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::UnsupportedVersion { found: 0, .. })
    ));
}

#[test]
fn test_version_above_current_is_rejected() {
    let mut bytes = encode_state(&sample_snapshot()).unwrap();
    bytes[0..2].copy_from_slice(&(STATE_FILE_VERSION + 1).to_le_bytes());

    assert!(matches!(
        decode_state(&bytes).unwrap_err(),
        Error::Format(FormatError::UnsupportedVersion { .. })
    ));
}

#[test]
fn test_unknown_block_tag_aborts_load() {
    let snapshot = StateSnapshot {
        timestamp: 5,
        ..StateSnapshot::default()
    };
    let mut bytes = encode_state(&snapshot).unwrap();
    bytes.extend_from_slice(&99u16.to_le_bytes());
    bytes.extend_from_slice(&0u64.to_le_bytes());

    assert!(matches!(
        decode_state(&bytes).unwrap_err(),
        Error::Format(FormatError::UnknownBlockTag { tag: 99 })
    ));
}

#[test]
fn test_truncated_payload_aborts_load() {
    let bytes = encode_state(&sample_snapshot()).unwrap();
    let truncated = &bytes[..bytes.len() - 3];

    assert!(matches!(
        decode_state(truncated).unwrap_err(),
        Error::Format(FormatError::Truncated { .. })
    ));
}

#[test]
fn test_truncated_header_aborts_load() {
    assert!(matches!(
        decode_state(&[0x01]).unwrap_err(),
        Error::Format(FormatError::Truncated { .. })
    ));
}
