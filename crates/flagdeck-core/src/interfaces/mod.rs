// crates/flagdeck-core/src/interfaces/mod.rs
// ============================================================================
// Module: Flagdeck Interfaces
// Description: Backend-agnostic contracts for storage and data-source updates.
// Purpose: Define the seams between stores, data sources, and the coordinator.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how Flagdeck integrates replaceable backends without
//! embedding backend-specific details. [`DataStore`] is the keyed versioned
//! store; [`DataSourceUpdates`] is the single write path through which any
//! data source feeds a store. Implementations must preserve version
//! monotonicity and fail closed on invalid data.
//!
//! Security posture: interface implementations consume untrusted wire data;
//! see `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::mpsc;

use crate::core::status::DataSourceState;
use crate::core::status::ErrorInfo;
use crate::core::store::AllData;
use crate::core::store::DataKind;
use crate::core::store::DataSet;
use crate::core::store::ItemDescriptor;
use crate::core::store::StoreError;
use crate::core::store::StoreStatus;

// ============================================================================
// SECTION: Data Store
// ============================================================================

/// Thread-safe keyed storage of versioned items, partitioned by data kind.
///
/// Individual operations are linearizable; `init` is atomic across kinds.
/// Reads never observe a partially applied `init`.
pub trait DataStore: Send + Sync {
    /// Atomically replaces all contents with `data`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot apply the data set.
    fn init(&self, data: DataSet) -> Result<(), StoreError>;

    /// Returns the current descriptor for `key`, including tombstones.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be read.
    fn get(&self, kind: DataKind, key: &str) -> Result<Option<ItemDescriptor>, StoreError>;

    /// Returns a snapshot of all descriptors for the kind, including
    /// tombstones.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be read.
    fn get_all(&self, kind: DataKind) -> Result<BTreeMap<String, ItemDescriptor>, StoreError>;

    /// Applies `item` iff its version exceeds the current version for `key`.
    ///
    /// Returns true iff the write was applied.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be written.
    fn upsert(&self, kind: DataKind, key: &str, item: ItemDescriptor)
    -> Result<bool, StoreError>;

    /// Returns true iff `init` has succeeded at least once.
    fn initialized(&self) -> bool;

    /// Returns an availability channel for stores that monitor their own
    /// backend, or `None` for stores that are always available.
    ///
    /// The receiver yields a [`StoreStatus`] on every availability change.
    fn status_updates(&self) -> Option<mpsc::Receiver<StoreStatus>> {
        None
    }
}

// ============================================================================
// SECTION: Data Source Updates
// ============================================================================

/// The single write path from data sources into a store.
///
/// Implementations mediate every write: they diff old against new data,
/// derive transitive flag-change events, and track data-source status.
pub trait DataSourceUpdates: Send + Sync {
    /// Replaces all stored data with a full payload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying store rejects the payload.
    fn init(&self, data: AllData) -> Result<(), StoreError>;

    /// Applies a single-item update; stale versions are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the underlying store rejects the write.
    fn upsert(&self, kind: DataKind, key: &str, item: ItemDescriptor) -> Result<(), StoreError>;

    /// Reports a data-source state transition with optional error details.
    fn update_status(&self, state: DataSourceState, error: Option<ErrorInfo>);
}
