// crates/flagdeck-datasource/src/polling.rs
// ============================================================================
// Module: Flagdeck Polling Data Source
// Description: Fixed-interval conditional fetches of the full payload.
// Purpose: Keep the store current where streaming is unavailable.
// Dependencies: flagdeck-core, reqwest, tokio
// ============================================================================

//! ## Overview
//! The polling source fetches `{baseUri}/sdk/latest-all` on a fixed interval
//! (clamped to at least thirty seconds) and replaces the store contents on
//! every change. Conditional requests ride on the `ETag` held by the
//! requestor, so an unchanged payload costs a 304 and reports `Valid`.
//! Recoverable failures keep polling; HTTP 401/403 stops the task for good.
//!
//! Security posture: response bodies are untrusted; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use flagdeck_core::DataSourceState;
use flagdeck_core::ErrorInfo;
use flagdeck_core::ErrorKind;
use flagdeck_core::interfaces::DataSourceUpdates;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;

use crate::requestor::FetchOutcome;
use crate::requestor::HttpIdentity;
use crate::requestor::PollingRequestor;
use crate::source::DataSource;
use crate::source::StartSignal;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Lower bound applied to every polling interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the polling source.
///
/// # Invariants
/// - `poll_interval` below [`MIN_POLL_INTERVAL`] is clamped up.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Base URI of the polling service.
    pub base_uri: String,
    /// Request identity headers.
    pub identity: HttpIdentity,
    /// Interval between fetch cycles.
    pub poll_interval: Duration,
}

// ============================================================================
// SECTION: Polling Source
// ============================================================================

/// The polling [`DataSource`].
pub struct PollingDataSource {
    /// Shared state between the handle and the polling task.
    inner: Arc<PollingInner>,
    /// Polling task handle, held for shutdown.
    task: Mutex<Option<JoinHandle<()>>>,
}

/// State shared with the polling task.
struct PollingInner {
    /// Source configuration.
    config: PollingConfig,
    /// Update sink receiving parsed payloads and status transitions.
    updates: Arc<dyn DataSourceUpdates>,
    /// Start outcome cell.
    start: StartSignal,
    /// Shutdown flag observed at every suspension point.
    shutdown: watch::Sender<bool>,
    /// Forces an immediate fetch cycle.
    refresh: Notify,
    /// Whether `start` has already spawned the task.
    started: AtomicBool,
}

impl PollingDataSource {
    /// Creates a polling source feeding `updates`.
    #[must_use]
    pub fn new(config: PollingConfig, updates: Arc<dyn DataSourceUpdates>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(PollingInner {
                config,
                updates,
                start: StartSignal::new(),
                shutdown,
                refresh: Notify::new(),
                started: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        }
    }
}

impl DataSource for PollingDataSource {
    fn start(&self) -> oneshot::Receiver<bool> {
        if !self.inner.started.swap(true, Ordering::SeqCst) {
            let inner = Arc::clone(&self.inner);
            let handle = tokio::spawn(run_poller(inner));
            if let Ok(mut task) = self.task.lock() {
                *task = Some(handle);
            }
        }
        self.inner.start.subscribe()
    }

    fn refresh(&self) {
        self.inner.refresh.notify_one();
    }

    fn close(&self) {
        let _ = self.inner.shutdown.send(true);
        self.inner.start.complete(false);
        if let Ok(mut task) = self.task.lock()
            && let Some(handle) = task.take()
        {
            handle.abort();
        }
    }
}

// ============================================================================
// SECTION: Polling Loop
// ============================================================================

/// Outcome of one fetch cycle.
enum CycleExit {
    /// Keep polling.
    Continue,
    /// Terminate the source permanently.
    Shutdown,
}

/// Runs fetch cycles until shutdown or an unrecoverable failure.
async fn run_poller(inner: Arc<PollingInner>) {
    let requestor = match PollingRequestor::new(&inner.config.base_uri, &inner.config.identity) {
        Ok(requestor) => requestor,
        Err(err) => {
            error!(error = %err, "polling requestor construction failed");
            inner.report(DataSourceState::Off, Some(err.error_kind()), Some(err.to_string()));
            inner.start.complete(false);
            return;
        }
    };
    let interval = inner.config.poll_interval.max(MIN_POLL_INTERVAL);
    let mut shutdown = inner.shutdown.subscribe();
    loop {
        match run_cycle(&inner, &requestor).await {
            CycleExit::Continue => {}
            CycleExit::Shutdown => return,
        }
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = inner.refresh.notified() => {
                // A refresh request forces fresh data on the next fetch.
                requestor.clear_etag();
            }
            _ = shutdown.wait_for(|stop| *stop) => return,
        }
        if *shutdown.borrow() {
            return;
        }
    }
}

/// Performs one conditional fetch and applies its outcome.
async fn run_cycle(inner: &Arc<PollingInner>, requestor: &PollingRequestor) -> CycleExit {
    match requestor.fetch_all().await {
        Ok(FetchOutcome::NotModified) => {
            debug!("poll cycle: not modified");
            inner.report(DataSourceState::Valid, None, None);
            CycleExit::Continue
        }
        Ok(FetchOutcome::Fresh(data)) => match inner.updates.init(data) {
            Ok(()) => {
                debug!("poll cycle: payload applied");
                inner.report(DataSourceState::Valid, None, None);
                inner.start.complete(true);
                CycleExit::Continue
            }
            Err(err) => {
                inner.report(
                    DataSourceState::Interrupted,
                    Some(ErrorKind::StoreError),
                    Some(err.to_string()),
                );
                CycleExit::Continue
            }
        },
        Err(err) if err.is_unrecoverable() => {
            error!(error = %err, "polling rejected; shutting the data source down");
            inner.report(DataSourceState::Off, Some(err.error_kind()), Some(err.to_string()));
            inner.start.complete(false);
            CycleExit::Shutdown
        }
        Err(err) => {
            debug!(error = %err, "poll cycle failed; will retry");
            inner.report(
                DataSourceState::Interrupted,
                Some(err.error_kind()),
                Some(err.to_string()),
            );
            CycleExit::Continue
        }
    }
}

// ============================================================================
// SECTION: Status Reporting
// ============================================================================

impl PollingInner {
    /// Reports a state transition with an optional error.
    fn report(&self, state: DataSourceState, kind: Option<ErrorKind>, message: Option<String>) {
        let error = kind.map(|kind| ErrorInfo::new(kind, message, OffsetDateTime::now_utc()));
        self.updates.update_status(state, error);
    }
}
