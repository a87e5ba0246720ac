// crates/flagdeck-client/tests/status_machine.rs
// ============================================================================
// Module: Status Machine Tests
// Description: Validate exposed data-source status transitions.
// Purpose: Pin sticky-initializing, error retention, and event dedupe.
// Dependencies: flagdeck-client, flagdeck-core, time, tokio
// ============================================================================

//! ## Overview
//! Exercises the status surface of [`flagdeck_client::UpdateCoordinator`]:
//! the `Initializing` -> `Interrupted` transition never happens, error
//! details persist until replaced, and duplicate reports emit no events.

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
use std::time::Duration;

use common::StatusRecorder;
use common::wait_until;
use flagdeck_client::UpdateCoordinator;
use flagdeck_core::DataSourceState;
use flagdeck_core::ErrorInfo;
use flagdeck_core::ErrorKind;
use flagdeck_core::InMemoryDataStore;
use flagdeck_core::interfaces::DataSourceUpdates;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

fn coordinator() -> Arc<UpdateCoordinator> {
    UpdateCoordinator::new(Arc::new(InMemoryDataStore::new()), None)
}

fn error(kind: ErrorKind, message: &str) -> ErrorInfo {
    ErrorInfo::new(kind, Some(message.to_string()), OffsetDateTime::now_utc())
}

// ============================================================================
// SECTION: Sticky Initializing
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interruptions_while_initializing_stay_initializing() {
    let coordinator = coordinator();
    assert_eq!(coordinator.status().state, DataSourceState::Initializing);
    coordinator.update_status(
        DataSourceState::Interrupted,
        Some(error(ErrorKind::NetworkError, "connection refused")),
    );
    let status = coordinator.status();
    assert_eq!(status.state, DataSourceState::Initializing);
    // The error is still recorded even though the state was suppressed.
    assert_eq!(status.last_error.map(|e| e.kind), Some(ErrorKind::NetworkError));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interruptions_after_valid_are_exposed() {
    let coordinator = coordinator();
    coordinator.update_status(DataSourceState::Valid, None);
    coordinator.update_status(
        DataSourceState::Interrupted,
        Some(error(
            ErrorKind::ErrorResponse {
                status: 503,
            },
            "bad gateway",
        )),
    );
    assert_eq!(coordinator.status().state, DataSourceState::Interrupted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn state_never_returns_to_initializing() {
    let coordinator = coordinator();
    coordinator.update_status(DataSourceState::Valid, None);
    coordinator.update_status(DataSourceState::Initializing, None);
    assert_eq!(coordinator.status().state, DataSourceState::Valid);
}

// ============================================================================
// SECTION: Error Retention
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_error_info_leaves_the_previous_error_intact() {
    let coordinator = coordinator();
    coordinator.update_status(
        DataSourceState::Interrupted,
        Some(error(ErrorKind::InvalidData, "bad json")),
    );
    coordinator.update_status(DataSourceState::Valid, None);
    let status = coordinator.status();
    assert_eq!(status.state, DataSourceState::Valid);
    assert_eq!(status.last_error.map(|e| e.kind), Some(ErrorKind::InvalidData));
}

// ============================================================================
// SECTION: Event Delivery
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_reports_emit_no_events() {
    let coordinator = coordinator();
    let recorder = StatusRecorder::new();
    coordinator.add_status_listener(recorder.clone());
    coordinator.update_status(DataSourceState::Valid, None);
    wait_until(|| recorder.count() >= 1).await;
    coordinator.update_status(DataSourceState::Valid, None);
    coordinator.update_status(DataSourceState::Valid, None);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listeners_observe_transitions_in_order() {
    let coordinator = coordinator();
    let recorder = StatusRecorder::new();
    coordinator.add_status_listener(recorder.clone());
    coordinator.update_status(DataSourceState::Valid, None);
    coordinator.update_status(
        DataSourceState::Interrupted,
        Some(error(ErrorKind::NetworkError, "reset")),
    );
    coordinator.update_status(DataSourceState::Valid, None);
    wait_until(|| recorder.count() >= 3).await;
    let states: Vec<DataSourceState> =
        recorder.statuses.lock().unwrap().iter().map(|s| s.state).collect();
    assert_eq!(
        states,
        vec![
            DataSourceState::Valid,
            DataSourceState::Interrupted,
            DataSourceState::Valid
        ]
    );
}
