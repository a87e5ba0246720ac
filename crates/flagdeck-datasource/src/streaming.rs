// crates/flagdeck-datasource/src/streaming.rs
// ============================================================================
// Module: Flagdeck Streaming Data Source
// Description: Server-sent-event connection applying put/patch/delete updates.
// Purpose: Keep the store current over a long-lived stream with reconnects.
// Dependencies: flagdeck-core, reqwest, tokio, serde_json
// ============================================================================

//! ## Overview
//! The streaming source holds a persistent `text/event-stream` connection to
//! `{streamUri}/all`. A `put` replaces the full data set, a `patch` upserts
//! one item, and a `delete` writes a tombstone. Unknown paths are logged and
//! ignored. Five minutes of stream silence, transport failures, malformed
//! payloads, and store write failures all trigger a reconnect with
//! decorrelated-jitter backoff; HTTP 401/403 shut the source down for good.
//!
//! Security posture: stream payloads are untrusted; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use flagdeck_core::AllData;
use flagdeck_core::DataKind;
use flagdeck_core::DataSourceState;
use flagdeck_core::ErrorInfo;
use flagdeck_core::ErrorKind;
use flagdeck_core::FeatureFlag;
use flagdeck_core::ItemDescriptor;
use flagdeck_core::Segment;
use flagdeck_core::interfaces::DataSourceUpdates;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::backoff::BackoffSchedule;
use crate::backoff::MAX_DELAY;
use crate::requestor::HttpIdentity;
use crate::requestor::STREAM_ALL_PATH;
use crate::requestor::build_client;
use crate::requestor::http_status_is_unrecoverable;
use crate::requestor::join_endpoint;
use crate::source::DataSource;
use crate::source::StartSignal;
use crate::sse::SseDecoder;
use crate::sse::SseEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Stream silence tolerated before forcing a reconnect.
const READ_TIMEOUT: Duration = Duration::from_secs(300);

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the streaming source.
///
/// # Invariants
/// - `initial_reconnect_delay` has already been clamped to be non-negative.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Base URI of the streaming service.
    pub stream_uri: String,
    /// Request identity headers.
    pub identity: HttpIdentity,
    /// Base delay for reconnect backoff.
    pub initial_reconnect_delay: Duration,
}

// ============================================================================
// SECTION: Streaming Source
// ============================================================================

/// The streaming [`DataSource`].
pub struct StreamingDataSource {
    /// Shared state between the handle and the connection task.
    inner: Arc<StreamingInner>,
    /// Connection task handle, held for shutdown.
    task: Mutex<Option<JoinHandle<()>>>,
}

/// State shared with the connection task.
struct StreamingInner {
    /// Source configuration.
    config: StreamingConfig,
    /// Update sink receiving parsed payloads and status transitions.
    updates: Arc<dyn DataSourceUpdates>,
    /// Start outcome cell.
    start: StartSignal,
    /// Shutdown flag observed at every suspension point.
    shutdown: watch::Sender<bool>,
    /// Forces the current connection to drop and re-sync.
    refresh: Notify,
    /// Whether `start` has already spawned the task.
    started: AtomicBool,
}

impl StreamingDataSource {
    /// Creates a streaming source feeding `updates`.
    #[must_use]
    pub fn new(config: StreamingConfig, updates: Arc<dyn DataSourceUpdates>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(StreamingInner {
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

impl DataSource for StreamingDataSource {
    fn start(&self) -> oneshot::Receiver<bool> {
        if !self.inner.started.swap(true, Ordering::SeqCst) {
            let inner = Arc::clone(&self.inner);
            let handle = tokio::spawn(run_stream(inner));
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
// SECTION: Connection Loop
// ============================================================================

/// Outcome of one connection attempt.
enum ConnectionExit {
    /// Reconnect after backoff.
    Retry,
    /// Terminate the source permanently.
    Shutdown,
}

/// Runs the connect/read/reconnect loop until shutdown.
async fn run_stream(inner: Arc<StreamingInner>) {
    let client = match build_client(&inner.config.identity, None) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "streaming client construction failed");
            inner.report(DataSourceState::Off, Some(ErrorKind::Unknown), Some(err.to_string()));
            inner.start.complete(false);
            return;
        }
    };
    let endpoint = match join_endpoint(&inner.config.stream_uri, STREAM_ALL_PATH) {
        Ok(endpoint) => endpoint,
        Err(err) => {
            error!(error = %err, "stream endpoint is invalid");
            inner.report(DataSourceState::Off, Some(ErrorKind::Unknown), Some(err.to_string()));
            inner.start.complete(false);
            return;
        }
    };
    let mut backoff =
        BackoffSchedule::new(inner.config.initial_reconnect_delay, MAX_DELAY);
    let mut shutdown = inner.shutdown.subscribe();
    loop {
        let delay = backoff.next_delay();
        if !delay.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = shutdown.wait_for(|stop| *stop) => return,
            }
        }
        if *shutdown.borrow() {
            return;
        }
        let exit = connect_once(&inner, &client, endpoint.as_str(), &mut backoff, &mut shutdown)
            .await;
        match exit {
            ConnectionExit::Retry => {}
            ConnectionExit::Shutdown => return,
        }
    }
}

/// Makes one connection attempt and drains it until it drops.
async fn connect_once(
    inner: &Arc<StreamingInner>,
    client: &reqwest::Client,
    endpoint: &str,
    backoff: &mut BackoffSchedule,
    shutdown: &mut watch::Receiver<bool>,
) -> ConnectionExit {
    let request = client.get(endpoint).header(ACCEPT, "text/event-stream").send();
    let response = tokio::select! {
        response = request => response,
        _ = shutdown.wait_for(|stop| *stop) => return ConnectionExit::Shutdown,
    };
    let mut response = match response {
        Ok(response) => response,
        Err(err) => {
            inner.report(
                DataSourceState::Interrupted,
                Some(ErrorKind::NetworkError),
                Some(err.to_string()),
            );
            return ConnectionExit::Retry;
        }
    };
    let status = response.status().as_u16();
    if !response.status().is_success() {
        let kind = ErrorKind::ErrorResponse {
            status,
        };
        if http_status_is_unrecoverable(status) {
            error!(status, "stream connection rejected; shutting the data source down");
            inner.report(DataSourceState::Off, Some(kind), None);
            inner.start.complete(false);
            return ConnectionExit::Shutdown;
        }
        inner.report(DataSourceState::Interrupted, Some(kind), None);
        return ConnectionExit::Retry;
    }

    debug!("stream connected");
    let connected_at = Instant::now();
    let mut decoder = SseDecoder::new();
    let mut store_failure_logged = false;
    let exit = loop {
        let chunk = tokio::select! {
            chunk = tokio::time::timeout(READ_TIMEOUT, response.chunk()) => chunk,
            _ = shutdown.wait_for(|stop| *stop) => break ConnectionExit::Shutdown,
            () = inner.refresh.notified() => {
                debug!("stream restart requested");
                break ConnectionExit::Retry;
            }
        };
        match chunk {
            Err(_elapsed) => {
                inner.report(
                    DataSourceState::Interrupted,
                    Some(ErrorKind::NetworkError),
                    Some("stream read timed out".to_string()),
                );
                break ConnectionExit::Retry;
            }
            Ok(Err(err)) => {
                inner.report(
                    DataSourceState::Interrupted,
                    Some(ErrorKind::NetworkError),
                    Some(err.to_string()),
                );
                break ConnectionExit::Retry;
            }
            Ok(Ok(None)) => {
                inner.report(
                    DataSourceState::Interrupted,
                    Some(ErrorKind::NetworkError),
                    Some("stream closed by server".to_string()),
                );
                break ConnectionExit::Retry;
            }
            Ok(Ok(Some(bytes))) => {
                let mut failed = None;
                for event in decoder.push(&bytes) {
                    if let Err(err) = handle_event(inner, &event) {
                        failed = Some(err);
                        break;
                    }
                }
                if let Some(err) = failed {
                    match err {
                        EventError::InvalidData(message) => {
                            inner.report(
                                DataSourceState::Interrupted,
                                Some(ErrorKind::InvalidData),
                                Some(message),
                            );
                        }
                        EventError::Store(message) => {
                            if !store_failure_logged {
                                warn!(error = %message, "store rejected a stream update; re-syncing");
                                store_failure_logged = true;
                            }
                            inner.report(
                                DataSourceState::Interrupted,
                                Some(ErrorKind::StoreError),
                                Some(message),
                            );
                        }
                    }
                    break ConnectionExit::Retry;
                }
            }
        }
    };
    backoff.note_connection(connected_at.elapsed());
    exit
}

// ============================================================================
// SECTION: Event Handling
// ============================================================================

/// Failure of a single stream event.
enum EventError {
    /// The payload was malformed.
    InvalidData(String),
    /// The store rejected the write.
    Store(String),
}

/// `put` payload shape.
#[derive(Debug, Deserialize)]
struct PutPayload {
    /// Payload path; only `/` is meaningful.
    #[serde(default)]
    path: Option<String>,
    /// Full data set.
    data: AllData,
}

/// `patch` payload shape.
#[derive(Debug, Deserialize)]
struct PatchPayload {
    /// Item path, `/flags/<key>` or `/segments/<key>`.
    path: String,
    /// Replacement item.
    data: Value,
}

/// `delete` payload shape.
#[derive(Debug, Deserialize)]
struct DeletePayload {
    /// Item path, `/flags/<key>` or `/segments/<key>`.
    path: String,
    /// Version of the deletion.
    version: u64,
}

/// Applies one stream event to the update sink.
fn handle_event(inner: &Arc<StreamingInner>, event: &SseEvent) -> Result<(), EventError> {
    match event.event.as_str() {
        "put" => {
            let payload: PutPayload = serde_json::from_str(&event.data)
                .map_err(|err| EventError::InvalidData(err.to_string()))?;
            if let Some(path) = payload.path.as_deref()
                && path != "/"
            {
                warn!(path, "ignoring put for unknown path");
                return Ok(());
            }
            inner
                .updates
                .init(payload.data)
                .map_err(|err| EventError::Store(err.to_string()))?;
            inner.report(DataSourceState::Valid, None, None);
            inner.start.complete(true);
            Ok(())
        }
        "patch" => {
            let payload: PatchPayload = serde_json::from_str(&event.data)
                .map_err(|err| EventError::InvalidData(err.to_string()))?;
            let Some((kind, key)) = parse_item_path(&payload.path) else {
                warn!(path = %payload.path, "ignoring patch for unknown path");
                return Ok(());
            };
            let descriptor = descriptor_from_value(kind, payload.data)
                .map_err(EventError::InvalidData)?;
            inner
                .updates
                .upsert(kind, &key, descriptor)
                .map_err(|err| EventError::Store(err.to_string()))?;
            debug!(kind = kind.name(), key = %key, "patch applied");
            Ok(())
        }
        "delete" => {
            let payload: DeletePayload = serde_json::from_str(&event.data)
                .map_err(|err| EventError::InvalidData(err.to_string()))?;
            let Some((kind, key)) = parse_item_path(&payload.path) else {
                warn!(path = %payload.path, "ignoring delete for unknown path");
                return Ok(());
            };
            inner
                .updates
                .upsert(kind, &key, ItemDescriptor::tombstone(payload.version))
                .map_err(|err| EventError::Store(err.to_string()))?;
            debug!(kind = kind.name(), key = %key, "delete applied");
            Ok(())
        }
        other => {
            debug!(event = other, "ignoring unrecognized stream event");
            Ok(())
        }
    }
}

/// Splits `/flags/<key>` or `/segments/<key>` into a kind and key.
fn parse_item_path(path: &str) -> Option<(DataKind, String)> {
    if let Some(key) = path.strip_prefix("/flags/") {
        return Some((DataKind::Features, key.to_string()));
    }
    if let Some(key) = path.strip_prefix("/segments/") {
        return Some((DataKind::Segments, key.to_string()));
    }
    None
}

/// Parses a patch body into a descriptor of the right kind.
fn descriptor_from_value(kind: DataKind, value: Value) -> Result<ItemDescriptor, String> {
    match kind {
        DataKind::Features => serde_json::from_value::<FeatureFlag>(value)
            .map(ItemDescriptor::flag)
            .map_err(|err| err.to_string()),
        DataKind::Segments => serde_json::from_value::<Segment>(value)
            .map(ItemDescriptor::segment)
            .map_err(|err| err.to_string()),
    }
}

// ============================================================================
// SECTION: Status Reporting
// ============================================================================

impl StreamingInner {
    /// Reports a state transition with an optional error.
    fn report(&self, state: DataSourceState, kind: Option<ErrorKind>, message: Option<String>) {
        let error = kind
            .map(|kind| ErrorInfo::new(kind, message, OffsetDateTime::now_utc()));
        self.updates.update_status(state, error);
    }
}
