// crates/flagdeck-core/src/core/store.rs
// ============================================================================
// Module: Flagdeck Store Model
// Description: Data kinds, item descriptors, and full data sets.
// Purpose: Provide the versioned storage vocabulary shared by stores and sources.
// Dependencies: serde, crate::core::{model, segment}
// ============================================================================

//! ## Overview
//! The store vocabulary: items are partitioned by [`DataKind`] and wrapped in
//! [`ItemDescriptor`] values pairing a version with a payload or a tombstone.
//! A tombstone is the absence of payload with a version number; it is
//! invisible to evaluation but participates in version comparisons so that
//! out-of-order updates cannot resurrect a deleted item.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::model::FeatureFlag;
use crate::core::segment::Segment;

// ============================================================================
// SECTION: Data Kinds
// ============================================================================

/// Namespaces for store partitions.
///
/// # Invariants
/// - `priority` ordering controls init order: segments precede features
///   because flags may reference segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataKind {
    /// Feature flags.
    Features,
    /// User segments.
    Segments,
}

impl DataKind {
    /// Returns the init-order priority; lower values initialize first.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Segments => 0,
            Self::Features => 1,
        }
    }

    /// Returns the stable name used in stream paths and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Features => "features",
            Self::Segments => "segments",
        }
    }
}

// ============================================================================
// SECTION: Item Descriptors
// ============================================================================

/// A stored item payload.
///
/// # Invariants
/// - The payload's own `version` matches the enclosing descriptor version.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreItem {
    /// A feature flag.
    Flag(Box<FeatureFlag>),
    /// A user segment.
    Segment(Box<Segment>),
}

/// A versioned item or tombstone.
///
/// # Invariants
/// - `item: None` is a tombstone: absent to evaluation, present for
///   version comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDescriptor {
    /// Monotonic item version.
    pub version: u64,
    /// Item payload, or `None` for a tombstone.
    pub item: Option<StoreItem>,
}

impl ItemDescriptor {
    /// Wraps a feature flag in a descriptor carrying the flag's version.
    #[must_use]
    pub fn flag(flag: FeatureFlag) -> Self {
        Self {
            version: flag.version,
            item: Some(StoreItem::Flag(Box::new(flag))),
        }
    }

    /// Wraps a segment in a descriptor carrying the segment's version.
    #[must_use]
    pub fn segment(segment: Segment) -> Self {
        Self {
            version: segment.version,
            item: Some(StoreItem::Segment(Box::new(segment))),
        }
    }

    /// Creates a tombstone descriptor for a deleted item.
    #[must_use]
    pub const fn tombstone(version: u64) -> Self {
        Self {
            version,
            item: None,
        }
    }

    /// Returns the flag payload when present and of the flag kind.
    #[must_use]
    pub fn as_flag(&self) -> Option<&FeatureFlag> {
        match &self.item {
            Some(StoreItem::Flag(flag)) => Some(flag),
            _ => None,
        }
    }

    /// Returns the segment payload when present and of the segment kind.
    #[must_use]
    pub fn as_segment(&self) -> Option<&Segment> {
        match &self.item {
            Some(StoreItem::Segment(segment)) => Some(segment),
            _ => None,
        }
    }

    /// Returns true when the descriptor is a tombstone.
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        self.item.is_none()
    }
}

// ============================================================================
// SECTION: Full Data Sets
// ============================================================================

/// The full-payload wire shape: `{"flags": {...}, "segments": {...}}`.
///
/// # Invariants
/// - Map keys equal the embedded item keys; sources do not verify this and
///   the embedded key wins nowhere (the map key is authoritative).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllData {
    /// Flags keyed by flag key.
    #[serde(default)]
    pub flags: BTreeMap<String, FeatureFlag>,
    /// Segments keyed by segment key.
    #[serde(default)]
    pub segments: BTreeMap<String, Segment>,
}

impl AllData {
    /// Converts the wire payload into per-kind descriptor maps.
    #[must_use]
    pub fn into_data_set(self) -> DataSet {
        DataSet {
            flags: self.flags.into_iter().map(|(k, v)| (k, ItemDescriptor::flag(v))).collect(),
            segments: self
                .segments
                .into_iter()
                .map(|(k, v)| (k, ItemDescriptor::segment(v)))
                .collect(),
        }
    }
}

/// Per-kind descriptor maps used to initialize a store.
///
/// # Invariants
/// - Applied atomically across both kinds, segments first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    /// Flag descriptors keyed by flag key.
    pub flags: BTreeMap<String, ItemDescriptor>,
    /// Segment descriptors keyed by segment key.
    pub segments: BTreeMap<String, ItemDescriptor>,
}

// ============================================================================
// SECTION: Store Errors and Availability
// ============================================================================

/// Data store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store is temporarily unavailable.
    #[error("data store unavailable: {0}")]
    Unavailable(String),
    /// The store rejected or could not represent the data.
    #[error("data store invalid data: {0}")]
    Invalid(String),
}

/// Availability report from stores that monitor their own backends.
///
/// # Invariants
/// - `stale` is meaningful only while `available` is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStatus {
    /// Whether the store can currently serve reads and writes.
    pub available: bool,
    /// Whether cached data may be out of date after an availability gap.
    pub stale: bool,
}
