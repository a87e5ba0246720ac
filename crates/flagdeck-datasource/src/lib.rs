// crates/flagdeck-datasource/src/lib.rs
// ============================================================================
// Module: Flagdeck Data Source Library
// Description: Streaming, polling, file, and test data sources.
// Purpose: Keep a Flagdeck store current from remote or local data.
// Dependencies: flagdeck-core, reqwest, tokio, rand, serde_json, url
// ============================================================================

//! ## Overview
//! This crate ships every built-in [`DataSource`]: the server-sent-event
//! streaming source with jittered reconnects, the conditional polling
//! source, the file source for local development, and the programmatic test
//! source. All of them write exclusively through the
//! [`flagdeck_core::interfaces::DataSourceUpdates`] sink and report health
//! through the same surface.
//! Invariants:
//! - The start outcome of every source resolves at most once.
//! - HTTP 401/403 terminates a source permanently; all other failures
//!   recover locally.
//!
//! Security posture: stream and response payloads are untrusted; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod backoff;
pub mod filedata;
pub mod polling;
pub mod requestor;
pub mod source;
pub mod sse;
pub mod streaming;
pub mod testdata;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use backoff::BackoffSchedule;
pub use backoff::DEFAULT_INITIAL_DELAY;
pub use backoff::MAX_DELAY;
pub use filedata::FileDataError;
pub use filedata::FileDataSource;
pub use polling::MIN_POLL_INTERVAL;
pub use polling::PollingConfig;
pub use polling::PollingDataSource;
pub use requestor::FetchError;
pub use requestor::FetchOutcome;
pub use requestor::HttpIdentity;
pub use requestor::PollingRequestor;
pub use source::DataSource;
pub use source::NullDataSource;
pub use source::StartSignal;
pub use sse::SseDecoder;
pub use sse::SseEvent;
pub use streaming::StreamingConfig;
pub use streaming::StreamingDataSource;
pub use testdata::AttachedTestSource;
pub use testdata::TestDataSource;
