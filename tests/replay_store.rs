//! Replay store durability across process restarts

use alloy::primitives::B256;
use mint_relayer::error::StoreError;
use mint_relayer::store::ReplayStore;
use tempfile::tempdir;

#[test]
fn test_records_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("processed_events_db.json");

    {
        let mut store = ReplayStore::open(&path, "137").unwrap();
        store.record(B256::repeat_byte(0xaa)).unwrap();
        store.record(B256::repeat_byte(0xbb)).unwrap();
    }

    let store = ReplayStore::open(&path, "137").unwrap();
    assert_eq!(store.len(), 2);
    assert!(store.contains(&B256::repeat_byte(0xaa)));
    assert!(store.contains(&B256::repeat_byte(0xbb)));
    assert!(!store.contains(&B256::repeat_byte(0xcc)));
}

#[test]
fn test_document_layout() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut store = ReplayStore::open(&path, "80001").unwrap();
    store.record(B256::repeat_byte(0xaa)).unwrap();

    let doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(doc["partition"], "80001");
    assert_eq!(
        doc["processed_hashes"][0],
        format!("0x{}", "aa".repeat(32))
    );
    assert!(doc["updated_at"].is_string());

    // No temp file left behind after the atomic replace
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_other_partition_is_refused() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut store = ReplayStore::open(&path, "137").unwrap();
    store.record(B256::repeat_byte(0xaa)).unwrap();
    drop(store);

    let err = ReplayStore::open(&path, "80001").unwrap_err();
    assert!(matches!(err, StoreError::PartitionMismatch { .. }));
}

#[test]
fn test_truncated_file_is_refused() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"{\"processed_hashes\": [\"0xaa").unwrap();

    let err = ReplayStore::open(&path, "137").unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
}
