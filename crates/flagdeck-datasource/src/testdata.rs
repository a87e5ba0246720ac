// crates/flagdeck-datasource/src/testdata.rs
// ============================================================================
// Module: Flagdeck Test Data Source
// Description: Programmatic in-memory data source for tests and examples.
// Purpose: Push full and incremental updates without any network transport.
// Dependencies: flagdeck-core, tokio
// ============================================================================

//! ## Overview
//! [`TestDataSource`] is a cloneable handle holding a staged data set. Once
//! attached to a client it behaves like any other source: starting applies
//! the staged data as a full payload and reports `Valid`; later updates flow
//! through the same coordinator path a network source would use, so change
//! events and status tracking behave identically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use flagdeck_core::AllData;
use flagdeck_core::DataKind;
use flagdeck_core::DataSourceState;
use flagdeck_core::FeatureFlag;
use flagdeck_core::ItemDescriptor;
use flagdeck_core::Segment;
use flagdeck_core::StoreError;
use flagdeck_core::interfaces::DataSourceUpdates;
use tokio::sync::oneshot;

use crate::source::DataSource;
use crate::source::StartSignal;

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// Staged data plus the attached sink, when any.
#[derive(Default)]
struct TestDataShared {
    /// Staged flags keyed by flag key.
    flags: BTreeMap<String, FeatureFlag>,
    /// Staged segments keyed by segment key.
    segments: BTreeMap<String, Segment>,
    /// Update sink once attached to a client.
    updates: Option<Arc<dyn DataSourceUpdates>>,
}

impl TestDataShared {
    /// Builds the full payload from the staged maps.
    fn snapshot(&self) -> AllData {
        AllData {
            flags: self.flags.clone(),
            segments: self.segments.clone(),
        }
    }
}

// ============================================================================
// SECTION: Test Data Handle
// ============================================================================

/// Cloneable handle staging and pushing test data.
///
/// # Invariants
/// - Before attachment, updates stage; after attachment they flow through
///   the coordinator immediately.
#[derive(Clone, Default)]
pub struct TestDataSource {
    /// State shared across clones and the attached source.
    shared: Arc<Mutex<TestDataShared>>,
}

impl TestDataSource {
    /// Creates an empty test data handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages or pushes a flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when an attached store rejects the write.
    pub fn flag(&self, flag: FeatureFlag) -> Result<(), StoreError> {
        let Ok(mut shared) = self.shared.lock() else {
            return Err(StoreError::Unavailable("test data lock poisoned".to_string()));
        };
        shared.flags.insert(flag.key.clone(), flag.clone());
        if let Some(updates) = shared.updates.clone() {
            drop(shared);
            let key = flag.key.clone();
            updates.upsert(DataKind::Features, &key, ItemDescriptor::flag(flag))?;
        }
        Ok(())
    }

    /// Stages or pushes a segment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when an attached store rejects the write.
    pub fn segment(&self, segment: Segment) -> Result<(), StoreError> {
        let Ok(mut shared) = self.shared.lock() else {
            return Err(StoreError::Unavailable("test data lock poisoned".to_string()));
        };
        shared.segments.insert(segment.key.clone(), segment.clone());
        if let Some(updates) = shared.updates.clone() {
            drop(shared);
            let key = segment.key.clone();
            updates.upsert(DataKind::Segments, &key, ItemDescriptor::segment(segment))?;
        }
        Ok(())
    }

    /// Stages or pushes a flag deletion at `version`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when an attached store rejects the write.
    pub fn delete_flag(&self, key: &str, version: u64) -> Result<(), StoreError> {
        let Ok(mut shared) = self.shared.lock() else {
            return Err(StoreError::Unavailable("test data lock poisoned".to_string()));
        };
        shared.flags.remove(key);
        if let Some(updates) = shared.updates.clone() {
            drop(shared);
            updates.upsert(DataKind::Features, key, ItemDescriptor::tombstone(version))?;
        }
        Ok(())
    }

    /// Binds the handle to an update sink, producing the attached source.
    #[must_use]
    pub fn attach(&self, updates: Arc<dyn DataSourceUpdates>) -> AttachedTestSource {
        if let Ok(mut shared) = self.shared.lock() {
            shared.updates = Some(Arc::clone(&updates));
        }
        AttachedTestSource {
            shared: Arc::clone(&self.shared),
            updates,
            start: StartSignal::new(),
        }
    }
}

// ============================================================================
// SECTION: Attached Source
// ============================================================================

/// The [`DataSource`] face of an attached test data handle.
pub struct AttachedTestSource {
    /// State shared with the originating handle.
    shared: Arc<Mutex<TestDataShared>>,
    /// Update sink.
    updates: Arc<dyn DataSourceUpdates>,
    /// Start outcome cell.
    start: StartSignal,
}

impl DataSource for AttachedTestSource {
    fn start(&self) -> oneshot::Receiver<bool> {
        if self.start.result().is_none() {
            let snapshot =
                self.shared.lock().map(|shared| shared.snapshot()).unwrap_or_default();
            match self.updates.init(snapshot) {
                Ok(()) => {
                    self.updates.update_status(DataSourceState::Valid, None);
                    self.start.complete(true);
                }
                Err(_) => self.start.complete(false),
            }
        }
        self.start.subscribe()
    }

    fn refresh(&self) {
        let snapshot = self.shared.lock().map(|shared| shared.snapshot()).unwrap_or_default();
        let _ = self.updates.init(snapshot);
    }

    fn close(&self) {}
}
