// crates/flagdeck-client/src/outage.rs
// ============================================================================
// Module: Flagdeck Outage Tracker
// Description: Aggregates errors over continuous non-valid windows.
// Purpose: Emit one summary log line per outage instead of one per error.
// Dependencies: flagdeck-core, tokio
// ============================================================================

//! ## Overview
//! An outage is a continuous interval during which the data source is not
//! `Valid`. When a configured timeout elapses with the outage still open,
//! one aggregated error line enumerates every distinct error with its
//! count, e.g. `NETWORK_ERROR (1 time), ERROR_RESPONSE(501) (2 times)`.
//! Returning to `Valid` before the timeout disarms the timer and clears the
//! tally; every fresh outage re-arms cleanly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use flagdeck_core::DataSourceState;
use flagdeck_core::ErrorInfo;
use flagdeck_core::ErrorKind;
use tokio::task::JoinHandle;
use tracing::error;

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Mutable tracker state behind the lock.
#[derive(Default)]
struct OutageState {
    /// Whether an outage window is currently open.
    active: bool,
    /// Distinct errors observed during the open window, with counts.
    tally: BTreeMap<ErrorKind, u64>,
    /// Armed timeout task, when any.
    timer: Option<JoinHandle<()>>,
}

/// Aggregating outage tracker.
///
/// # Invariants
/// - At most one timer is armed at a time.
/// - The tally only accumulates while a window is open.
pub struct OutageTracker {
    /// Time an outage must persist before the summary is logged.
    timeout: Duration,
    /// Tracker state.
    state: Mutex<OutageState>,
}

impl OutageTracker {
    /// Creates a tracker that logs after `timeout` of continuous outage.
    #[must_use]
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            timeout,
            state: Mutex::new(OutageState::default()),
        })
    }

    /// Observes an exposed state transition and optional error.
    ///
    /// `Valid` closes any open window. `Interrupted` and `Off` open one if
    /// none is open and record the error; further errors accumulate while
    /// the window stays open. `Initializing` never opens a window.
    pub fn observe(self: &Arc<Self>, state: DataSourceState, error: Option<&ErrorInfo>) {
        let Ok(mut tracker) = self.state.lock() else {
            return;
        };
        match state {
            DataSourceState::Valid => {
                tracker.active = false;
                tracker.tally.clear();
                if let Some(timer) = tracker.timer.take() {
                    timer.abort();
                }
            }
            DataSourceState::Interrupted | DataSourceState::Off => {
                if !tracker.active {
                    tracker.active = true;
                    tracker.tally.clear();
                    let tracker_handle = Arc::clone(self);
                    let timeout = self.timeout;
                    tracker.timer = Some(tokio::spawn(async move {
                        tokio::time::sleep(timeout).await;
                        tracker_handle.report_if_still_out();
                    }));
                }
                if let Some(error) = error {
                    *tracker.tally.entry(error.kind.clone()).or_insert(0) += 1;
                }
            }
            DataSourceState::Initializing => {}
        }
    }

    /// Cancels any armed timer.
    pub fn close(&self) {
        if let Ok(mut tracker) = self.state.lock()
            && let Some(timer) = tracker.timer.take()
        {
            timer.abort();
        }
    }

    /// Logs the aggregated summary when the window is still open.
    fn report_if_still_out(&self) {
        let Ok(mut tracker) = self.state.lock() else {
            return;
        };
        if !tracker.active {
            return;
        }
        tracker.timer = None;
        let summary = summarize(&tracker.tally);
        let seconds = self.timeout.as_secs_f64();
        drop(tracker);
        error!(
            "data source has been unavailable for at least {seconds:.1}s with the following errors: {summary}"
        );
    }
}

// ============================================================================
// SECTION: Summary Rendering
// ============================================================================

/// Renders the tally as `KIND (n times)` entries joined with commas.
fn summarize(tally: &BTreeMap<ErrorKind, u64>) -> String {
    let entries: Vec<String> = tally
        .iter()
        .map(|(kind, count)| {
            let noun = if *count == 1 { "time" } else { "times" };
            format!("{kind} ({count} {noun})")
        })
        .collect();
    entries.join(", ")
}
