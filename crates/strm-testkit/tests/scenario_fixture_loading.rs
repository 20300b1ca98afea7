//! Scenario: JSON fixtures for state, change lists and store snapshots load
//! into the engine's types and report which file was bad.

use std::fs;

use strm_state::{BackingStoreFacts, ChangeStatus, StreamChange};
use strm_testkit::{load_changes_json, load_state_json, load_store_json};

#[test]
fn fixtures_round_into_engine_types() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let changes_path = dir.path().join("changes.json");
    let store_path = dir.path().join("store.json");

    fs::write(
        &state_path,
        r#"{ "version": 3, "streams": [
            { "definition": { "kind": "wired", "name": "logs",
                              "lifecycle": { "type": "dsl", "data_retention": "30d" } } }
        ] }"#,
    )
    .unwrap();
    fs::write(
        &changes_path,
        r#"[ { "delete": "logs.old" },
             { "upsert": { "kind": "classic", "name": "logs-a" } } ]"#,
    )
    .unwrap();
    fs::write(
        &store_path,
        r#"{ "data_streams": { "logs-a": { "kind": "data_stream", "template": "logs" } } }"#,
    )
    .unwrap();

    let state = load_state_json(&state_path).unwrap();
    assert_eq!(state.version(), 3);
    assert_eq!(
        state.get("logs").unwrap().change_status(),
        ChangeStatus::Unchanged
    );

    let changes = load_changes_json(&changes_path).unwrap();
    assert_eq!(changes[0], StreamChange::Delete("logs.old".into()));
    assert_eq!(changes[1].name(), "logs-a");

    let store = load_store_json(&store_path).unwrap();
    assert_eq!(store.get_data_stream("logs-a").unwrap().template, "logs");
}

#[test]
fn bad_fixture_error_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");

    let err = load_state_json(&missing).unwrap_err();
    assert!(format!("{err:#}").contains("nope.json"));
}
