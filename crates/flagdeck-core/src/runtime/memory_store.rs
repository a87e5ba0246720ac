// crates/flagdeck-core/src/runtime/memory_store.rs
// ============================================================================
// Module: Flagdeck In-Memory Store
// Description: Default data store backed by maps under a reader-writer lock.
// Purpose: Serve reads without blocking writers beyond brief lock windows.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryDataStore`] is the default [`DataStore`]: per-kind maps guarded
//! by one reader-writer lock. Readers copy the few descriptors they touch
//! and release the lock before evaluation proceeds, so evaluation never
//! blocks updates for user-visible work. `init` swaps both kinds under one
//! write lock, keeping the replacement atomic across kinds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::core::store::DataKind;
use crate::core::store::DataSet;
use crate::core::store::ItemDescriptor;
use crate::core::store::StoreError;
use crate::interfaces::DataStore;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Store contents guarded by the lock.
#[derive(Debug, Default)]
struct StoreContents {
    /// Flag descriptors keyed by flag key.
    flags: BTreeMap<String, ItemDescriptor>,
    /// Segment descriptors keyed by segment key.
    segments: BTreeMap<String, ItemDescriptor>,
    /// Whether `init` has succeeded at least once.
    initialized: bool,
}

impl StoreContents {
    /// Returns the map for a data kind.
    const fn map(&self, kind: DataKind) -> &BTreeMap<String, ItemDescriptor> {
        match kind {
            DataKind::Features => &self.flags,
            DataKind::Segments => &self.segments,
        }
    }

    /// Returns the mutable map for a data kind.
    const fn map_mut(&mut self, kind: DataKind) -> &mut BTreeMap<String, ItemDescriptor> {
        match kind {
            DataKind::Features => &mut self.flags,
            DataKind::Segments => &mut self.segments,
        }
    }
}

/// The default in-memory [`DataStore`].
///
/// # Invariants
/// - Per-key versions are monotonically non-decreasing.
/// - Reads never observe a partially applied `init`.
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    /// Contents under a multi-reader, single-writer lock.
    contents: RwLock<StoreContents>,
}

impl InMemoryDataStore {
    /// Creates an empty, uninitialized store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a poisoned lock into a store error.
    fn poisoned() -> StoreError {
        StoreError::Unavailable("store lock poisoned".to_string())
    }
}

impl DataStore for InMemoryDataStore {
    fn init(&self, data: DataSet) -> Result<(), StoreError> {
        let mut contents = self.contents.write().map_err(|_| Self::poisoned())?;
        contents.segments = data.segments;
        contents.flags = data.flags;
        contents.initialized = true;
        Ok(())
    }

    fn get(&self, kind: DataKind, key: &str) -> Result<Option<ItemDescriptor>, StoreError> {
        let contents = self.contents.read().map_err(|_| Self::poisoned())?;
        Ok(contents.map(kind).get(key).cloned())
    }

    fn get_all(&self, kind: DataKind) -> Result<BTreeMap<String, ItemDescriptor>, StoreError> {
        let contents = self.contents.read().map_err(|_| Self::poisoned())?;
        Ok(contents.map(kind).clone())
    }

    fn upsert(
        &self,
        kind: DataKind,
        key: &str,
        item: ItemDescriptor,
    ) -> Result<bool, StoreError> {
        let mut contents = self.contents.write().map_err(|_| Self::poisoned())?;
        let map = contents.map_mut(kind);
        if let Some(existing) = map.get(key)
            && item.version <= existing.version
        {
            return Ok(false);
        }
        map.insert(key.to_string(), item);
        Ok(true)
    }

    fn initialized(&self) -> bool {
        self.contents.read().map(|contents| contents.initialized).unwrap_or(false)
    }
}
