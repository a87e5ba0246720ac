// crates/flagdeck-client/src/client.rs
// ============================================================================
// Module: Flagdeck Client Façade
// Description: The application-facing client: typed variations and lifecycle.
// Purpose: Wire store, coordinator, and data source into one handle.
// Dependencies: flagdeck-core, flagdeck-datasource, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`FlagClient`] answers "what value should flag K have for user U?"
//! entirely from local memory. Construction wires the configured store,
//! the update coordinator, and the selected data source together and starts
//! the source; evaluation never blocks on the network. Typed variation
//! methods return the caller's default with reason `Error(WRONG_TYPE)` on a
//! type mismatch, and every failure path yields a reason instead of an
//! error.
//!
//! The client must be constructed inside a Tokio runtime; background
//! delivery and data-source tasks spawn onto it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use flagdeck_core::DataKind;
use flagdeck_core::DataSourceState;
use flagdeck_core::DataSourceStatus;
use flagdeck_core::Detail;
use flagdeck_core::EvalErrorKind;
use flagdeck_core::EvalResult;
use flagdeck_core::Evaluator;
use flagdeck_core::InMemoryDataStore;
use flagdeck_core::Reason;
use flagdeck_core::User;
use flagdeck_core::interfaces::DataSourceUpdates;
use flagdeck_core::interfaces::DataStore;
use flagdeck_datasource::DataSource;
use flagdeck_datasource::FileDataSource;
use flagdeck_datasource::HttpIdentity;
use flagdeck_datasource::NullDataSource;
use flagdeck_datasource::PollingConfig;
use flagdeck_datasource::PollingDataSource;
use flagdeck_datasource::StreamingConfig;
use flagdeck_datasource::StreamingDataSource;
use serde_json::Value;
use tracing::warn;

use crate::broadcast::FlagChangeListener;
use crate::broadcast::FlagValueChangeListener;
use crate::broadcast::StatusListener;
use crate::broadcast::ValueChangeObserver;
use crate::config::Config;
use crate::config::DataSourceKind;
use crate::coordinator::UpdateCoordinator;
use crate::secure::secure_mode_hash;

// ============================================================================
// SECTION: Client
// ============================================================================

/// The server-side feature-flag client.
///
/// # Invariants
/// - All evaluations are served from the local store.
/// - `close` is idempotent and releases every background resource.
pub struct FlagClient {
    /// SDK key, retained for the secure-mode hash.
    sdk_key: String,
    /// Whether the client was configured offline.
    offline: bool,
    /// Local flag store.
    store: Arc<dyn DataStore>,
    /// The single write path and status owner.
    coordinator: Arc<UpdateCoordinator>,
    /// Active data source.
    source: Arc<dyn DataSource>,
    /// Whether `close` has run.
    closed: AtomicBool,
}

impl FlagClient {
    /// Builds the client and starts its data source.
    ///
    /// Must be called within a Tokio runtime; the data source and event
    /// delivery run as background tasks on it.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let store: Arc<dyn DataStore> =
            config.data_store.clone().unwrap_or_else(|| Arc::new(InMemoryDataStore::new()));
        let coordinator = UpdateCoordinator::new(Arc::clone(&store), config.outage_timeout);
        let updates: Arc<dyn DataSourceUpdates> = coordinator.clone() as Arc<dyn DataSourceUpdates>;
        let identity = HttpIdentity {
            sdk_key: config.sdk_key.clone(),
            wrapper: config.wrapper.clone(),
        };
        let source: Arc<dyn DataSource> = if config.offline {
            Arc::new(NullDataSource::new(Arc::clone(&updates)))
        } else {
            match config.data_source {
                DataSourceKind::Streaming => Arc::new(StreamingDataSource::new(
                    StreamingConfig {
                        stream_uri: config.stream_uri,
                        identity,
                        initial_reconnect_delay: config.initial_reconnect_delay,
                    },
                    Arc::clone(&updates),
                )),
                DataSourceKind::Polling => Arc::new(PollingDataSource::new(
                    PollingConfig {
                        base_uri: config.base_uri,
                        identity,
                        poll_interval: config.poll_interval,
                    },
                    Arc::clone(&updates),
                )),
                DataSourceKind::ExternalOnly => {
                    Arc::new(NullDataSource::new(Arc::clone(&updates)))
                }
                DataSourceKind::TestData(handle) => {
                    Arc::new(handle.attach(Arc::clone(&updates)))
                }
                DataSourceKind::File(paths) => {
                    Arc::new(FileDataSource::new(paths, Arc::clone(&updates)))
                }
            }
        };
        let refresh_source = Arc::clone(&source);
        coordinator.set_refresh_hook(Box::new(move || refresh_source.refresh()));
        let _ = source.start();
        Self {
            sdk_key: config.sdk_key,
            offline: config.offline,
            store,
            coordinator,
            source,
            closed: AtomicBool::new(false),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Returns true once evaluations can be served from real data.
    ///
    /// Offline clients are considered initialized immediately.
    #[must_use]
    pub fn initialized(&self) -> bool {
        self.offline || self.store.initialized()
    }

    /// Waits for the data source's one-shot start outcome.
    ///
    /// Returns true when the source initialized (or the client is offline),
    /// false on timeout or permanent failure.
    pub async fn wait_for_initialization(&self, timeout: Duration) -> bool {
        if self.offline {
            return true;
        }
        match tokio::time::timeout(timeout, self.source.start()).await {
            Ok(Ok(outcome)) => outcome,
            _ => self.initialized(),
        }
    }

    /// Shuts the client down: stops the data source, the outage timer, and
    /// all listener delivery. Idempotent, and callable from listeners.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.source.close();
        self.coordinator.close();
    }

    /// Returns the current data-source status.
    #[must_use]
    pub fn status(&self) -> DataSourceStatus {
        self.coordinator.status()
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Registers a listener for every flag-change notification.
    pub fn add_flag_change_listener(&self, listener: Arc<dyn FlagChangeListener>) {
        self.coordinator.add_flag_change_listener(listener);
    }

    /// Registers a listener for data-source status changes.
    pub fn add_status_listener(&self, listener: Arc<dyn StatusListener>) {
        self.coordinator.add_status_listener(listener);
    }

    /// Registers a value-change listener for one `(flag, user)` pair.
    ///
    /// The listener fires only when the evaluated value actually changes;
    /// the current value is cached at registration time.
    pub fn add_flag_value_change_listener(
        &self,
        flag_key: impl Into<String>,
        user: User,
        listener: Arc<dyn FlagValueChangeListener>,
    ) {
        let store = Arc::clone(&self.store);
        let offline = self.offline;
        let coordinator = Arc::clone(&self.coordinator);
        let evaluate = Arc::new(move |key: &str, user: &User| {
            evaluate_from(&store, &coordinator, offline, key, user)
                .detail
                .value
                .unwrap_or(Value::Null)
        });
        let observer =
            Arc::new(ValueChangeObserver::new(flag_key.into(), user, evaluate, listener));
        self.coordinator.add_flag_change_listener(observer);
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Evaluates a boolean flag.
    #[must_use]
    pub fn bool_variation(&self, key: &str, user: &User, default: bool) -> bool {
        self.bool_variation_detail(key, user, default).0
    }

    /// Evaluates a boolean flag with its full detail.
    #[must_use]
    pub fn bool_variation_detail(
        &self,
        key: &str,
        user: &User,
        default: bool,
    ) -> (bool, Detail) {
        typed_detail(self.evaluate(key, user), default, Value::as_bool)
    }

    /// Evaluates an integer flag.
    #[must_use]
    pub fn int_variation(&self, key: &str, user: &User, default: i64) -> i64 {
        self.int_variation_detail(key, user, default).0
    }

    /// Evaluates an integer flag with its full detail.
    #[must_use]
    pub fn int_variation_detail(&self, key: &str, user: &User, default: i64) -> (i64, Detail) {
        typed_detail(self.evaluate(key, user), default, Value::as_i64)
    }

    /// Evaluates a floating-point flag.
    #[must_use]
    pub fn float_variation(&self, key: &str, user: &User, default: f64) -> f64 {
        self.float_variation_detail(key, user, default).0
    }

    /// Evaluates a floating-point flag with its full detail.
    #[must_use]
    pub fn float_variation_detail(
        &self,
        key: &str,
        user: &User,
        default: f64,
    ) -> (f64, Detail) {
        typed_detail(self.evaluate(key, user), default, Value::as_f64)
    }

    /// Evaluates a string flag.
    #[must_use]
    pub fn string_variation(&self, key: &str, user: &User, default: &str) -> String {
        self.string_variation_detail(key, user, default).0
    }

    /// Evaluates a string flag with its full detail.
    #[must_use]
    pub fn string_variation_detail(
        &self,
        key: &str,
        user: &User,
        default: &str,
    ) -> (String, Detail) {
        typed_detail(self.evaluate(key, user), default.to_string(), |value| {
            value.as_str().map(ToString::to_string)
        })
    }

    /// Evaluates a flag of any JSON type.
    #[must_use]
    pub fn json_variation(&self, key: &str, user: &User, default: Value) -> Value {
        self.json_variation_detail(key, user, default).0
    }

    /// Evaluates a flag of any JSON type with its full detail.
    #[must_use]
    pub fn json_variation_detail(
        &self,
        key: &str,
        user: &User,
        default: Value,
    ) -> (Value, Detail) {
        typed_detail(self.evaluate(key, user), default, |value| Some(value.clone()))
    }

    /// Evaluates every non-deleted flag for a user.
    ///
    /// Individual evaluation failures are recorded per flag; an
    /// uninitialized client returns an empty map with a warning.
    #[must_use]
    pub fn all_flags_detail(&self, user: &User) -> BTreeMap<String, Detail> {
        if !self.initialized() {
            warn!("all-flags evaluation requested before initialization; returning empty state");
            return BTreeMap::new();
        }
        let Ok(snapshot) = self.store.get_all(DataKind::Features) else {
            warn!("all-flags evaluation could not read the store; returning empty state");
            return BTreeMap::new();
        };
        let mut results = BTreeMap::new();
        for (key, descriptor) in snapshot {
            let Some(flag) = descriptor.as_flag() else {
                continue;
            };
            let result = Evaluator::new(self.store.as_ref()).evaluate(flag, user);
            results.insert(key, result.detail);
        }
        results
    }

    /// Computes the secure-mode hash for this user under the SDK key.
    #[must_use]
    pub fn secure_mode_hash(&self, user: &User) -> String {
        secure_mode_hash(&self.sdk_key, &user.key)
    }

    /// Runs one evaluation against the local store.
    fn evaluate(&self, key: &str, user: &User) -> EvalResult {
        evaluate_from(&self.store, &self.coordinator, self.offline, key, user)
    }
}

impl Drop for FlagClient {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// SECTION: Evaluation Plumbing
// ============================================================================

/// Evaluates one flag from a store, with readiness and existence checks.
fn evaluate_from(
    store: &Arc<dyn DataStore>,
    coordinator: &Arc<UpdateCoordinator>,
    offline: bool,
    key: &str,
    user: &User,
) -> EvalResult {
    if !offline && !store.initialized() {
        let state = coordinator.status().state;
        if state == DataSourceState::Initializing || state == DataSourceState::Interrupted {
            return EvalResult {
                detail: Detail::error(EvalErrorKind::ClientNotReady),
                prerequisite_events: Vec::new(),
            };
        }
    }
    let descriptor = match store.get(DataKind::Features, key) {
        Ok(descriptor) => descriptor,
        Err(_) => {
            return EvalResult {
                detail: Detail::error(EvalErrorKind::Exception),
                prerequisite_events: Vec::new(),
            };
        }
    };
    let Some(flag) = descriptor.as_ref().and_then(|d| d.as_flag()) else {
        return EvalResult {
            detail: Detail::error(EvalErrorKind::FlagNotFound),
            prerequisite_events: Vec::new(),
        };
    };
    Evaluator::new(store.as_ref()).evaluate(flag, user)
}

/// Extracts a typed value from an evaluation, falling back to the default.
///
/// A present value of the wrong type replaces the reason with
/// `Error(WRONG_TYPE)`.
fn typed_detail<T>(
    result: EvalResult,
    default: T,
    extract: impl Fn(&Value) -> Option<T>,
) -> (T, Detail) {
    let mut detail = result.detail;
    match detail.value.as_ref().map(|value| extract(value)) {
        Some(Some(typed)) => (typed, detail),
        Some(None) => {
            detail.reason = Reason::Error {
                error_kind: EvalErrorKind::WrongType,
            };
            detail.value = None;
            detail.variation_index = None;
            (default, detail)
        }
        None => (default, detail),
    }
}
