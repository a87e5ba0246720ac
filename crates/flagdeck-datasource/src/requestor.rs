// crates/flagdeck-datasource/src/requestor.rs
// ============================================================================
// Module: Flagdeck HTTP Requestor
// Description: HTTP client construction and the conditional polling fetch.
// Purpose: Centralize headers, endpoint handling, and error classification.
// Dependencies: flagdeck-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! Both data sources speak HTTP with the same identity headers: the SDK key
//! as `Authorization`, a product `User-Agent`, and the optional wrapper
//! branding header. The polling requestor performs conditional fetches of
//! the full payload, holding the last `ETag` on the instance so a 304 means
//! "no change". Error classification is shared: HTTP 401 and 403 are
//! unrecoverable; every other failure is recoverable.
//!
//! Security posture: response bodies are untrusted; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::time::Duration;

use flagdeck_core::AllData;
use flagdeck_core::ErrorKind;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use reqwest::header::ETAG;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::IF_NONE_MATCH;
use reqwest::header::USER_AGENT;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Path of the full-payload polling endpoint, relative to the base URI.
pub const LATEST_ALL_PATH: &str = "sdk/latest-all";

/// Path of the streaming endpoint, relative to the stream URI.
pub const STREAM_ALL_PATH: &str = "all";

/// Branding header carrying the wrapper name and version.
pub const WRAPPER_HEADER: &str = "X-LaunchDarkly-Wrapper";

/// Connect timeout applied to every HTTP client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Identity shared by every outbound request.
///
/// # Invariants
/// - `sdk_key` is sent verbatim as the `Authorization` header.
#[derive(Debug, Clone)]
pub struct HttpIdentity {
    /// SDK key used as the authorization token.
    pub sdk_key: String,
    /// Optional `name[/version]` wrapper branding.
    pub wrapper: Option<String>,
}

/// Errors from requestor construction and fetches.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The endpoint or a header value was invalid.
    #[error("invalid request configuration: {0}")]
    Config(String),
    /// The transport failed before a response arrived.
    #[error("network failure: {0}")]
    Network(String),
    /// The server answered with a non-success status code.
    #[error("http status {0}")]
    Http(u16),
    /// The response body was not a valid payload.
    #[error("malformed payload: {0}")]
    InvalidBody(String),
}

impl FetchError {
    /// Maps the failure onto a status error kind.
    #[must_use]
    pub const fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Unknown,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::Http(status) => ErrorKind::ErrorResponse {
                status: *status,
            },
            Self::InvalidBody(_) => ErrorKind::InvalidData,
        }
    }

    /// Returns true when retrying cannot help (HTTP 401 or 403).
    #[must_use]
    pub const fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Http(status) if http_status_is_unrecoverable(*status))
    }
}

/// Returns true for HTTP status codes that terminate a data source.
#[must_use]
pub const fn http_status_is_unrecoverable(status: u16) -> bool {
    matches!(status, 401 | 403)
}

/// Builds an HTTP client carrying the identity headers.
///
/// # Errors
///
/// Returns [`FetchError::Config`] when a header value is invalid, and
/// [`FetchError::Network`] when the client cannot be constructed.
pub fn build_client(
    identity: &HttpIdentity,
    timeout: Option<Duration>,
) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    let authorization = HeaderValue::from_str(&identity.sdk_key)
        .map_err(|_| FetchError::Config("sdk key is not a valid header value".to_string()))?;
    headers.insert(AUTHORIZATION, authorization);
    let agent = format!("Flagdeck/{}", env!("CARGO_PKG_VERSION"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&agent)
            .map_err(|_| FetchError::Config("user agent is not a valid header value".to_string()))?,
    );
    if let Some(wrapper) = &identity.wrapper {
        let value = HeaderValue::from_str(wrapper)
            .map_err(|_| FetchError::Config("wrapper is not a valid header value".to_string()))?;
        headers.insert(WRAPPER_HEADER, value);
    }
    let mut builder = Client::builder().default_headers(headers).connect_timeout(CONNECT_TIMEOUT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|err| FetchError::Network(err.to_string()))
}

/// Joins a base URI and a relative path, tolerating trailing slashes.
///
/// # Errors
///
/// Returns [`FetchError::Config`] when the base URI cannot be parsed.
pub fn join_endpoint(base: &str, path: &str) -> Result<Url, FetchError> {
    let normalized = format!("{}/{path}", base.trim_end_matches('/'));
    Url::parse(&normalized).map_err(|err| FetchError::Config(err.to_string()))
}

// ============================================================================
// SECTION: Polling Requestor
// ============================================================================

/// Outcome of one conditional fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A fresh full payload.
    Fresh(AllData),
    /// The server reported no change since the held `ETag`.
    NotModified,
}

/// Conditional fetcher for the full-payload endpoint.
///
/// # Invariants
/// - The last `ETag` lives on the instance; individual fetches are
///   otherwise stateless.
pub struct PollingRequestor {
    /// HTTP client carrying identity headers.
    client: Client,
    /// Resolved polling endpoint.
    endpoint: Url,
    /// Last entity tag returned by the server.
    etag: Mutex<Option<String>>,
}

impl PollingRequestor {
    /// Creates a requestor against `base_uri` with the given identity.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the endpoint or identity is invalid.
    pub fn new(base_uri: &str, identity: &HttpIdentity) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(identity, Some(Duration::from_secs(30)))?,
            endpoint: join_endpoint(base_uri, LATEST_ALL_PATH)?,
            etag: Mutex::new(None),
        })
    }

    /// Fetches the full payload, honoring the held `ETag`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport, status, or payload failures.
    pub async fn fetch_all(&self) -> Result<FetchOutcome, FetchError> {
        let mut request = self.client.get(self.endpoint.clone());
        if let Some(etag) = self.current_etag() {
            request = request.header(IF_NONE_MATCH, etag);
        }
        let response =
            request.send().await.map_err(|err| FetchError::Network(err.to_string()))?;
        let status = response.status();
        if status.as_u16() == 304 {
            return Ok(FetchOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        let body =
            response.bytes().await.map_err(|err| FetchError::Network(err.to_string()))?;
        let data: AllData = serde_json::from_slice(&body)
            .map_err(|err| FetchError::InvalidBody(err.to_string()))?;
        self.store_etag(etag);
        Ok(FetchOutcome::Fresh(data))
    }

    /// Clears the held `ETag`, forcing the next fetch to return fresh data.
    pub fn clear_etag(&self) {
        if let Ok(mut etag) = self.etag.lock() {
            *etag = None;
        }
    }

    /// Returns the currently held `ETag`.
    fn current_etag(&self) -> Option<String> {
        self.etag.lock().ok().and_then(|etag| etag.clone())
    }

    /// Records the `ETag` from a successful response.
    fn store_etag(&self, etag: Option<String>) {
        if let Ok(mut held) = self.etag.lock() {
            *held = etag;
        }
    }
}
