// crates/flagdeck-datasource/tests/filedata.rs
// ============================================================================
// Module: File Data Source Tests
// Description: Validate file loading, merging, and failure reporting.
// Purpose: Pin first-occurrence-wins merging and invalid-data status.
// Dependencies: flagdeck-datasource, flagdeck-core, tempfile, tokio
// ============================================================================

//! ## Overview
//! Exercises [`flagdeck_datasource::FileDataSource`] over temporary payload
//! files: merged loads, duplicate keys keeping the first occurrence, and
//! parse failures reporting `Interrupted` with invalid data.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use common::RecordingUpdates;
use flagdeck_core::DataSourceState;
use flagdeck_core::ErrorKind;
use flagdeck_core::interfaces::DataSourceUpdates;
use flagdeck_datasource::DataSource;
use flagdeck_datasource::FileDataSource;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn flag_payload(key: &str, version: u64, variation: bool) -> String {
    format!(
        concat!(
            "{{\"flags\":{{\"{key}\":{{\"key\":\"{key}\",\"version\":{version},",
            "\"on\":false,\"fallthrough\":{{\"variation\":0}},",
            "\"variations\":[{variation}]}}}},\"segments\":{{}}}}"
        ),
        key = key,
        version = version,
        variation = variation,
    )
}

// ============================================================================
// SECTION: Loading
// ============================================================================

#[tokio::test]
async fn loads_and_merges_files_in_order() {
    let dir = TempDir::new().unwrap();
    let first = write_file(&dir, "first.json", &flag_payload("f1", 1, true));
    let second = write_file(&dir, "second.json", &flag_payload("f2", 1, false));
    let updates = RecordingUpdates::new();
    let source = FileDataSource::new(vec![first, second], Arc::clone(&updates) as Arc<dyn DataSourceUpdates>);
    assert!(source.start().await.unwrap());
    let inits = updates.inits.lock().unwrap();
    assert_eq!(inits.len(), 1);
    assert!(inits[0].flags.contains_key("f1"));
    assert!(inits[0].flags.contains_key("f2"));
    drop(inits);
    assert!(updates.states().contains(&DataSourceState::Valid));
}

#[tokio::test]
async fn duplicate_keys_keep_the_first_occurrence() {
    let dir = TempDir::new().unwrap();
    let first = write_file(&dir, "first.json", &flag_payload("dup", 1, true));
    let second = write_file(&dir, "second.json", &flag_payload("dup", 2, false));
    let updates = RecordingUpdates::new();
    let source = FileDataSource::new(vec![first, second], Arc::clone(&updates) as Arc<dyn DataSourceUpdates>);
    assert!(source.start().await.unwrap());
    let inits = updates.inits.lock().unwrap();
    assert_eq!(inits[0].flags["dup"].version, 1);
}

#[tokio::test]
async fn parse_failure_reports_invalid_data() {
    let dir = TempDir::new().unwrap();
    let broken = write_file(&dir, "broken.json", "{not json");
    let updates = RecordingUpdates::new();
    let source = FileDataSource::new(vec![broken], Arc::clone(&updates) as Arc<dyn DataSourceUpdates>);
    assert!(!source.start().await.unwrap());
    assert!(updates.init_count() == 0);
    assert_eq!(
        updates.last_error().map(|error| error.kind),
        Some(ErrorKind::InvalidData)
    );
}

#[tokio::test]
async fn missing_file_reports_invalid_data() {
    let updates = RecordingUpdates::new();
    let source =
        FileDataSource::new(vec![PathBuf::from("/nonexistent/payload.json")], Arc::clone(&updates) as Arc<dyn DataSourceUpdates>);
    assert!(!source.start().await.unwrap());
    assert_eq!(
        updates.last_error().map(|error| error.kind),
        Some(ErrorKind::InvalidData)
    );
}

#[tokio::test]
async fn refresh_reloads_the_files() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "data.json", &flag_payload("f1", 1, true));
    let updates = RecordingUpdates::new();
    let source = FileDataSource::new(vec![path.clone()], Arc::clone(&updates) as Arc<dyn DataSourceUpdates>);
    assert!(source.start().await.unwrap());
    std::fs::write(&path, flag_payload("f1", 2, true)).unwrap();
    source.refresh();
    let inits = updates.inits.lock().unwrap();
    assert_eq!(inits.len(), 2);
    assert_eq!(inits[1].flags["f1"].version, 2);
}
