// crates/flagdeck-core/src/core/mod.rs
// ============================================================================
// Module: Flagdeck Core Model
// Description: Wire model for flags, segments, users, stores, and status.
// Purpose: Group the data types shared by every Flagdeck crate.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! The core model: versioned flag and segment configuration as served on the
//! wire, the user contexts evaluations run against, the store vocabulary,
//! and the data-source status machine.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod model;
pub mod segment;
pub mod status;
pub mod store;
pub mod user;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use model::Clause;
pub use model::ClientSideAvailability;
pub use model::FeatureFlag;
pub use model::FlagRule;
pub use model::Operator;
pub use model::Prerequisite;
pub use model::Rollout;
pub use model::RolloutKind;
pub use model::Target;
pub use model::VariationOrRollout;
pub use model::WeightedVariation;
pub use segment::Segment;
pub use segment::SegmentRule;
pub use status::DataSourceState;
pub use status::DataSourceStatus;
pub use status::ErrorInfo;
pub use status::ErrorKind;
pub use store::AllData;
pub use store::DataKind;
pub use store::DataSet;
pub use store::ItemDescriptor;
pub use store::StoreError;
pub use store::StoreItem;
pub use store::StoreStatus;
pub use user::User;
pub use user::UserBuilder;
