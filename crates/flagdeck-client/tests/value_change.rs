// crates/flagdeck-client/tests/value_change.rs
// ============================================================================
// Module: Value Change Listener Tests
// Description: Validate per-user flag-value change notifications.
// Purpose: Pin that listeners fire only when the evaluated value differs.
// Dependencies: flagdeck-client, flagdeck-core, flagdeck-datasource, tokio
// ============================================================================

//! ## Overview
//! Registers value-change listeners through a live client fed by the test
//! data source and asserts they fire only when re-evaluation produces a
//! different value for the watched user.

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

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use common::bool_flag;
use common::wait_until;
use flagdeck_client::Config;
use flagdeck_client::DataSourceKind;
use flagdeck_client::FlagClient;
use flagdeck_client::FlagValueChange;
use flagdeck_client::FlagValueChangeListener;
use flagdeck_core::User;
use flagdeck_datasource::TestDataSource;
use serde_json::json;

// ============================================================================
// SECTION: Recording Listener
// ============================================================================

/// Records every value change it hears.
#[derive(Default)]
struct ValueRecorder {
    /// Changes received, in delivery order.
    changes: Mutex<Vec<FlagValueChange>>,
}

impl ValueRecorder {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn count(&self) -> usize {
        self.changes.lock().unwrap().len()
    }
}

impl FlagValueChangeListener for ValueRecorder {
    fn flag_value_changed(&self, change: &FlagValueChange) {
        self.changes.lock().unwrap().push(change.clone());
    }
}

// ============================================================================
// SECTION: Behavior
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fires_only_when_the_value_actually_changes() {
    let td = TestDataSource::new();
    td.flag(bool_flag("watched", 1)).unwrap();
    let config = Config::builder("sdk-key")
        .data_source(DataSourceKind::TestData(td.clone()))
        .build()
        .unwrap();
    let client = FlagClient::new(config);
    assert!(client.wait_for_initialization(Duration::from_secs(5)).await);

    let recorder = ValueRecorder::new();
    let user = User::with_key("user").build();
    client.add_flag_value_change_listener("watched", user, recorder.clone());

    // A version bump without a value change stays silent.
    td.flag(bool_flag("watched", 2)).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.count(), 0);

    // Turning the flag off changes the evaluated value.
    let mut off = bool_flag("watched", 3);
    off.on = false;
    td.flag(off).unwrap();
    wait_until(|| recorder.count() >= 1).await;
    {
        let changes = recorder.changes.lock().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key, "watched");
        assert_eq!(changes[0].old_value, json!(true));
        assert_eq!(changes[0].new_value, json!(false));
    }
    client.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn changes_to_other_flags_are_ignored() {
    let td = TestDataSource::new();
    td.flag(bool_flag("watched", 1)).unwrap();
    td.flag(bool_flag("unrelated", 1)).unwrap();
    let config = Config::builder("sdk-key")
        .data_source(DataSourceKind::TestData(td.clone()))
        .build()
        .unwrap();
    let client = FlagClient::new(config);
    assert!(client.wait_for_initialization(Duration::from_secs(5)).await);

    let recorder = ValueRecorder::new();
    let user = User::with_key("user").build();
    client.add_flag_value_change_listener("watched", user, recorder.clone());

    let mut off = bool_flag("unrelated", 2);
    off.on = false;
    td.flag(off).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.count(), 0);
    client.close();
}
