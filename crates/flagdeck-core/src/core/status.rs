// crates/flagdeck-core/src/core/status.rs
// ============================================================================
// Module: Flagdeck Data Source Status
// Description: Data-source state machine and error classification.
// Purpose: Expose a stable status surface with sticky-initializing semantics.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Data sources report their health as a [`DataSourceStatus`]: the current
//! state, when it was entered, and the most recent error. The transition
//! rules live here so every data source shares them: `Initializing` is
//! sticky through early interruptions, and callers never observe a return to
//! `Initializing` once `Valid` or `Off` has been reached.
//!
//! The core never reads wall-clock time; callers supply transition
//! timestamps.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

// ============================================================================
// SECTION: States
// ============================================================================

/// Data-source lifecycle states.
///
/// # Invariants
/// - `Initializing` is entered only at construction; once `Valid` or `Off`
///   has been reported the state never returns to `Initializing`.
/// - `Off` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceState {
    /// No successful fetch has occurred yet.
    Initializing,
    /// The source is connected and current.
    Valid,
    /// The source is disrupted but attempting recovery.
    Interrupted,
    /// The source has shut down permanently.
    Off,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Classification of data-source errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling and outage aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport-level failure (connection refused, reset, timeout).
    NetworkError,
    /// HTTP response with a non-success status code.
    ErrorResponse {
        /// HTTP status code.
        status: u16,
    },
    /// Malformed or schema-violating payload.
    InvalidData,
    /// The data store rejected a write.
    StoreError,
    /// Any other failure.
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkError => write!(f, "NETWORK_ERROR"),
            Self::ErrorResponse {
                status,
            } => write!(f, "ERROR_RESPONSE({status})"),
            Self::InvalidData => write!(f, "INVALID_DATA"),
            Self::StoreError => write!(f, "STORE_ERROR"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Details of the most recent data-source error.
///
/// # Invariants
/// - `time` is supplied by the caller at the moment the error was observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable description, when available.
    pub message: Option<String>,
    /// Time the error was observed.
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
}

impl ErrorInfo {
    /// Creates an error record observed at `time`.
    #[must_use]
    pub const fn new(kind: ErrorKind, message: Option<String>, time: OffsetDateTime) -> Self {
        Self {
            kind,
            message,
            time,
        }
    }

    /// Returns true when `other` describes the same error, ignoring time.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

// ============================================================================
// SECTION: Status
// ============================================================================

/// The exposed status of a data source.
///
/// # Invariants
/// - `state_since` is the time the current state was entered.
/// - `last_error` persists across state changes; a status update without
///   error information never clears it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceStatus {
    /// Current state.
    pub state: DataSourceState,
    /// Time the current state was entered.
    #[serde(with = "time::serde::rfc3339")]
    pub state_since: OffsetDateTime,
    /// Most recent error, when any has occurred.
    pub last_error: Option<ErrorInfo>,
}

impl DataSourceStatus {
    /// Creates the initial status: `Initializing` as of `now`.
    #[must_use]
    pub const fn initializing(now: OffsetDateTime) -> Self {
        Self {
            state: DataSourceState::Initializing,
            state_since: now,
            last_error: None,
        }
    }

    /// Applies a reported transition and returns whether the exposed status
    /// changed.
    ///
    /// Transition rules:
    /// - `Initializing` is sticky: a reported `Interrupted` while still
    ///   initializing keeps the state at `Initializing` (the error is still
    ///   recorded).
    /// - A repeated state with no new or identical error information is a
    ///   no-op.
    /// - A requested transition to `Initializing` is ignored; the state is
    ///   terminal-entering-only.
    /// - `None` error information leaves the previous error intact.
    pub fn apply(
        &mut self,
        new_state: DataSourceState,
        error: Option<ErrorInfo>,
        now: OffsetDateTime,
    ) -> bool {
        let effective = if self.state == DataSourceState::Initializing
            && new_state == DataSourceState::Interrupted
        {
            DataSourceState::Initializing
        } else if new_state == DataSourceState::Initializing {
            // Initializing is terminal-entering-only; it is never re-entered.
            self.state
        } else {
            new_state
        };
        let state_changed = effective != self.state;
        let error_changed = error.as_ref().is_some_and(|incoming| {
            self.last_error.as_ref().is_none_or(|prior| !prior.same_as(incoming))
        });
        if error_changed {
            self.last_error = error;
        }
        if state_changed {
            self.state = effective;
            self.state_since = now;
        }
        state_changed || error_changed
    }
}
