// crates/flagdeck-core/src/lib.rs
// ============================================================================
// Module: Flagdeck Core Library
// Description: Data model, store contracts, and evaluation engine.
// Purpose: Provide the backend-agnostic heart of the Flagdeck SDK.
// Dependencies: serde, serde_json, bigdecimal, regex, semver, sha1, time
// ============================================================================

//! ## Overview
//! Flagdeck Core holds everything the SDK evaluates with: the versioned flag
//! and segment wire model, the [`DataStore`] and [`DataSourceUpdates`]
//! contracts, the default in-memory store, and the pure evaluation engine.
//! Evaluation is deterministic over a store snapshot and never fails toward
//! the caller.
//! Invariants:
//! - Stored versions are monotonically non-decreasing per key.
//! - Tombstones are invisible to evaluation but suppress out-of-order
//!   resurrections.
//! - Evaluation holds no lock across user-visible work.
//!
//! Security posture: wire payloads and user attributes are untrusted; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::AllData;
pub use crate::core::Clause;
pub use crate::core::ClientSideAvailability;
pub use crate::core::DataKind;
pub use crate::core::DataSet;
pub use crate::core::DataSourceState;
pub use crate::core::DataSourceStatus;
pub use crate::core::ErrorInfo;
pub use crate::core::ErrorKind;
pub use crate::core::FeatureFlag;
pub use crate::core::FlagRule;
pub use crate::core::ItemDescriptor;
pub use crate::core::Operator;
pub use crate::core::Prerequisite;
pub use crate::core::Rollout;
pub use crate::core::RolloutKind;
pub use crate::core::Segment;
pub use crate::core::SegmentRule;
pub use crate::core::StoreError;
pub use crate::core::StoreItem;
pub use crate::core::StoreStatus;
pub use crate::core::Target;
pub use crate::core::User;
pub use crate::core::UserBuilder;
pub use crate::core::VariationOrRollout;
pub use crate::core::WeightedVariation;
pub use crate::interfaces::DataSourceUpdates;
pub use crate::interfaces::DataStore;
pub use crate::runtime::Detail;
pub use crate::runtime::EvalErrorKind;
pub use crate::runtime::EvalResult;
pub use crate::runtime::Evaluator;
pub use crate::runtime::InMemoryDataStore;
pub use crate::runtime::PrerequisiteEvent;
pub use crate::runtime::Reason;
