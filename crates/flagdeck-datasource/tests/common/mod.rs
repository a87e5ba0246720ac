// crates/flagdeck-datasource/tests/common/mod.rs
// ============================================================================
// Module: Data Source Test Support
// Description: Recording update sink and async wait helpers.
// Purpose: Observe what data sources write without a real coordinator.
// Dependencies: flagdeck-core, tokio
// ============================================================================

//! ## Overview
//! [`RecordingUpdates`] implements the update sink contract and records
//! every payload, upsert, and status transition for assertions.

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
    dead_code,
    reason = "Test-only support; not every helper is used by every suite."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use flagdeck_core::AllData;
use flagdeck_core::DataKind;
use flagdeck_core::DataSourceState;
use flagdeck_core::ErrorInfo;
use flagdeck_core::ItemDescriptor;
use flagdeck_core::StoreError;
use flagdeck_core::interfaces::DataSourceUpdates;

/// Records everything a data source writes.
#[derive(Default)]
pub struct RecordingUpdates {
    /// Full payloads received through `init`.
    pub inits: Mutex<Vec<AllData>>,
    /// Single-item updates received through `upsert`.
    pub upserts: Mutex<Vec<(DataKind, String, ItemDescriptor)>>,
    /// Status transitions received through `update_status`.
    pub statuses: Mutex<Vec<(DataSourceState, Option<ErrorInfo>)>>,
    /// When set, `init` fails with this error.
    pub fail_init: Mutex<Option<StoreError>>,
}

impl RecordingUpdates {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn init_count(&self) -> usize {
        self.inits.lock().unwrap().len()
    }

    pub fn states(&self) -> Vec<DataSourceState> {
        self.statuses.lock().unwrap().iter().map(|(state, _)| *state).collect()
    }

    pub fn last_error(&self) -> Option<ErrorInfo> {
        self.statuses.lock().unwrap().iter().rev().find_map(|(_, error)| error.clone())
    }
}

impl DataSourceUpdates for RecordingUpdates {
    fn init(&self, data: AllData) -> Result<(), StoreError> {
        if let Some(err) = self.fail_init.lock().unwrap().clone() {
            return Err(err);
        }
        self.inits.lock().unwrap().push(data);
        Ok(())
    }

    fn upsert(
        &self,
        kind: DataKind,
        key: &str,
        item: ItemDescriptor,
    ) -> Result<(), StoreError> {
        self.upserts.lock().unwrap().push((kind, key.to_string(), item));
        Ok(())
    }

    fn update_status(&self, state: DataSourceState, error: Option<ErrorInfo>) {
        self.statuses.lock().unwrap().push((state, error));
    }
}

/// Polls `predicate` until it holds or the timeout elapses.
pub async fn wait_until(predicate: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !predicate() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within the timeout"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
