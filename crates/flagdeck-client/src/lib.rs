// crates/flagdeck-client/src/lib.rs
// ============================================================================
// Module: Flagdeck Client Library
// Description: Client façade, configuration, coordinator, and broadcasters.
// Purpose: Assemble the Flagdeck SDK into one application-facing handle.
// Dependencies: flagdeck-core, flagdeck-datasource, hmac, sha2, tokio
// ============================================================================

//! ## Overview
//! Flagdeck Client wires the pieces together: a [`Config`] selects the data
//! source and store, the [`UpdateCoordinator`] mediates every write and
//! derives transitive flag-change events, broadcasters deliver changes and
//! status off the update path, and [`FlagClient`] exposes typed variation
//! methods, listener registration, the all-flags snapshot, and the
//! secure-mode hash.
//! Invariants:
//! - Evaluations are served entirely from local memory.
//! - An offline client makes no network calls and is considered
//!   initialized.
//!
//! Security posture: remote flag data is untrusted; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod broadcast;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod outage;
pub mod secure;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use broadcast::FlagChange;
pub use broadcast::FlagChangeListener;
pub use broadcast::FlagValueChange;
pub use broadcast::FlagValueChangeListener;
pub use broadcast::StatusListener;
pub use client::FlagClient;
pub use config::Config;
pub use config::ConfigBuilder;
pub use config::ConfigError;
pub use config::DataSourceKind;
pub use coordinator::UpdateCoordinator;
pub use outage::OutageTracker;
pub use secure::secure_mode_hash;
