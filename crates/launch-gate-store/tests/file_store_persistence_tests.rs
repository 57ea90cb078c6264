//! Integration tests for completion state surviving process restarts.

use std::sync::Arc;

use launch_gate_core::Destination;
use launch_gate_store::{
    CompletionStore, HAS_LAUNCHED_BEFORE_KEY, JsonFileStore, KeyValueStore, RecordOutcome,
    StoreError, StoredValue,
};

#[test]
fn file_store_persistence_tests_record_survives_reopen() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("state").join("launch-state.json");
    let destination =
        Destination::parse("https://a.test/?data=YXBuc190b2tlbj1hYmM=").expect("valid destination");

    {
        let store = JsonFileStore::open(&path).expect("missing file should open empty");
        let completion = CompletionStore::new(Arc::new(store));
        assert!(!completion.has_launched_before());
        assert_eq!(
            completion.record_completion(&destination).expect("write should succeed"),
            RecordOutcome::Recorded
        );
    }

    let reopened = JsonFileStore::open(&path).expect("written file should reopen");
    let completion = CompletionStore::new(Arc::new(reopened));
    let record = completion.load().expect("record should load");
    assert!(record.has_launched_before);
    assert_eq!(record.restorable_destination(), Some(destination));
}

#[test]
fn file_store_persistence_tests_file_uses_documented_keys() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("launch-state.json");
    let store = JsonFileStore::open(&path).expect("store should open");
    store
        .set(HAS_LAUNCHED_BEFORE_KEY, StoredValue::Bool(true))
        .expect("write should succeed");

    let raw = std::fs::read_to_string(&path).expect("store file should exist");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("store file should be json");
    assert_eq!(json["hasLaunchedBefore"], true);
}

#[test]
fn file_store_persistence_tests_corrupt_file_is_a_decode_error() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("launch-state.json");
    std::fs::write(&path, "not json").expect("fixture should be written");

    assert!(matches!(JsonFileStore::open(&path), Err(StoreError::Decode(_))));
}
