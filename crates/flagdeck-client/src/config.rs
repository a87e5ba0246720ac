// crates/flagdeck-client/src/config.rs
// ============================================================================
// Module: Flagdeck Client Configuration
// Description: Builder-validated configuration for the client façade.
// Purpose: Collect endpoints, data-source selection, and tuning knobs.
// Dependencies: flagdeck-core, flagdeck-datasource, url
// ============================================================================

//! ## Overview
//! [`Config`] is produced by [`ConfigBuilder`], which validates endpoints
//! and applies the documented clamps: the polling interval never drops
//! below thirty seconds and the initial reconnect delay defaults to one
//! second. An offline client ignores the data-source selection entirely: no
//! HTTP call is ever made and evaluations are served from the local store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use flagdeck_core::interfaces::DataStore;
use flagdeck_datasource::DEFAULT_INITIAL_DELAY;
use flagdeck_datasource::MIN_POLL_INTERVAL;
use flagdeck_datasource::TestDataSource;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default polling service base URI.
pub const DEFAULT_BASE_URI: &str = "https://sdk.flagdeck.io";

/// Default streaming service base URI.
pub const DEFAULT_STREAM_URI: &str = "https://stream.flagdeck.io";

/// Default analytics service base URI.
pub const DEFAULT_EVENTS_URI: &str = "https://events.flagdeck.io";

// ============================================================================
// SECTION: Data Source Selection
// ============================================================================

/// Which data source keeps the store current.
#[derive(Clone)]
pub enum DataSourceKind {
    /// Long-lived server-sent-event stream (the default).
    Streaming,
    /// Fixed-interval conditional polling.
    Polling,
    /// No source; the store is populated externally and reads as `Valid`.
    ExternalOnly,
    /// Programmatic test data pushed through the coordinator.
    TestData(TestDataSource),
    /// Local JSON payload files.
    File(Vec<PathBuf>),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The SDK key is empty.
    #[error("sdk key must not be empty")]
    MissingSdkKey,
    /// An endpoint override does not parse as a URL.
    #[error("invalid {name} uri: {message}")]
    InvalidUri {
        /// Which endpoint failed to parse.
        name: &'static str,
        /// Parser error description.
        message: String,
    },
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Validated client configuration.
///
/// # Invariants
/// - `poll_interval` is at least thirty seconds.
/// - Endpoint URIs have been parse-checked.
#[derive(Clone)]
pub struct Config {
    /// SDK key sent as the authorization token on every request.
    pub sdk_key: String,
    /// Whether the client runs without any network activity.
    pub offline: bool,
    /// Data source selection.
    pub data_source: DataSourceKind,
    /// Polling interval (clamped).
    pub poll_interval: Duration,
    /// Base delay for stream reconnect backoff.
    pub initial_reconnect_delay: Duration,
    /// Polling service base URI.
    pub base_uri: String,
    /// Streaming service base URI.
    pub stream_uri: String,
    /// Analytics service base URI (recognized; unused by this core).
    pub events_uri: String,
    /// Outage window before an aggregated error log; `None` disables it.
    pub outage_timeout: Option<Duration>,
    /// Pluggable store; in-memory when absent.
    pub data_store: Option<Arc<dyn DataStore>>,
    /// Wrapper branding header value, when any.
    pub wrapper: Option<String>,
    /// Disables periodic diagnostic posts (recognized; unused by this core).
    pub diagnostic_opt_out: bool,
}

impl Config {
    /// Starts building a configuration for the given SDK key.
    #[must_use]
    pub fn builder(sdk_key: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            sdk_key: sdk_key.into(),
            offline: false,
            data_source: DataSourceKind::Streaming,
            poll_interval: MIN_POLL_INTERVAL,
            initial_reconnect_delay: DEFAULT_INITIAL_DELAY,
            base_uri: DEFAULT_BASE_URI.to_string(),
            stream_uri: DEFAULT_STREAM_URI.to_string(),
            events_uri: DEFAULT_EVENTS_URI.to_string(),
            outage_timeout: None,
            data_store: None,
            wrapper_name: None,
            wrapper_version: None,
            diagnostic_opt_out: false,
        }
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for [`Config`].
///
/// # Invariants
/// - Every setter overwrites any earlier value for the same option.
#[derive(Clone)]
pub struct ConfigBuilder {
    /// SDK key sent as the authorization token.
    sdk_key: String,
    /// Whether the client runs without any network activity.
    offline: bool,
    /// Data source selection.
    data_source: DataSourceKind,
    /// Polling interval before clamping.
    poll_interval: Duration,
    /// Base delay for stream reconnect backoff.
    initial_reconnect_delay: Duration,
    /// Polling service base URI.
    base_uri: String,
    /// Streaming service base URI.
    stream_uri: String,
    /// Analytics service base URI.
    events_uri: String,
    /// Outage window before an aggregated error log.
    outage_timeout: Option<Duration>,
    /// Pluggable store.
    data_store: Option<Arc<dyn DataStore>>,
    /// Wrapper name for the branding header.
    wrapper_name: Option<String>,
    /// Wrapper version for the branding header.
    wrapper_version: Option<String>,
    /// Disables periodic diagnostic posts.
    diagnostic_opt_out: bool,
}

impl ConfigBuilder {
    /// Puts the client in offline mode: no data source, no network calls.
    #[must_use]
    pub const fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Selects the data source.
    #[must_use]
    pub fn data_source(mut self, data_source: DataSourceKind) -> Self {
        self.data_source = data_source;
        self
    }

    /// Sets the polling interval; values below thirty seconds are clamped.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the base delay for stream reconnect backoff.
    #[must_use]
    pub const fn initial_reconnect_delay(mut self, delay: Duration) -> Self {
        self.initial_reconnect_delay = delay;
        self
    }

    /// Overrides the polling service base URI.
    #[must_use]
    pub fn base_uri(mut self, uri: impl Into<String>) -> Self {
        self.base_uri = uri.into();
        self
    }

    /// Overrides the streaming service base URI.
    #[must_use]
    pub fn stream_uri(mut self, uri: impl Into<String>) -> Self {
        self.stream_uri = uri.into();
        self
    }

    /// Overrides the analytics service base URI.
    #[must_use]
    pub fn events_uri(mut self, uri: impl Into<String>) -> Self {
        self.events_uri = uri.into();
        self
    }

    /// Enables outage logging after the given continuous-outage window.
    #[must_use]
    pub const fn outage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.outage_timeout = timeout;
        self
    }

    /// Supplies a pluggable store implementation.
    #[must_use]
    pub fn data_store(mut self, store: Arc<dyn DataStore>) -> Self {
        self.data_store = Some(store);
        self
    }

    /// Sets the wrapper name for the branding header.
    #[must_use]
    pub fn wrapper_name(mut self, name: impl Into<String>) -> Self {
        self.wrapper_name = Some(name.into());
        self
    }

    /// Sets the wrapper version for the branding header.
    #[must_use]
    pub fn wrapper_version(mut self, version: impl Into<String>) -> Self {
        self.wrapper_version = Some(version.into());
        self
    }

    /// Disables periodic diagnostic posts.
    #[must_use]
    pub const fn diagnostic_opt_out(mut self, opt_out: bool) -> Self {
        self.diagnostic_opt_out = opt_out;
        self
    }

    /// Validates and produces the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the SDK key is empty or an endpoint
    /// override does not parse.
    pub fn build(self) -> Result<Config, ConfigError> {
        if self.sdk_key.is_empty() {
            return Err(ConfigError::MissingSdkKey);
        }
        validate_uri("base", &self.base_uri)?;
        validate_uri("stream", &self.stream_uri)?;
        validate_uri("events", &self.events_uri)?;
        let wrapper = self.wrapper_name.map(|name| match &self.wrapper_version {
            Some(version) => format!("{name}/{version}"),
            None => name,
        });
        Ok(Config {
            sdk_key: self.sdk_key,
            offline: self.offline,
            data_source: self.data_source,
            poll_interval: self.poll_interval.max(MIN_POLL_INTERVAL),
            initial_reconnect_delay: self.initial_reconnect_delay,
            base_uri: self.base_uri,
            stream_uri: self.stream_uri,
            events_uri: self.events_uri,
            outage_timeout: self.outage_timeout,
            data_store: self.data_store,
            wrapper,
            diagnostic_opt_out: self.diagnostic_opt_out,
        })
    }
}

/// Parse-checks an endpoint override.
fn validate_uri(name: &'static str, uri: &str) -> Result<(), ConfigError> {
    Url::parse(uri).map(|_| ()).map_err(|err| ConfigError::InvalidUri {
        name,
        message: err.to_string(),
    })
}
