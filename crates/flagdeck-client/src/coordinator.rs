// crates/flagdeck-client/src/coordinator.rs
// ============================================================================
// Module: Flagdeck Update Coordinator
// Description: The single write path: diffs, change closure, status tracking.
// Purpose: Turn raw store writes into transitive flag-change notifications.
// Dependencies: flagdeck-core, tokio
// ============================================================================

//! ## Overview
//! Every data source writes through [`UpdateCoordinator`]. On top of the raw
//! store it maintains two reverse-dependency graphs (flags by referenced
//! segment, flags by prerequisite flag), diffs old against new data, and
//! computes the transitive closure of affected flag keys so listeners hear
//! about every flag whose evaluation may have changed. It also owns the
//! exposed data-source status (with sticky-`Initializing` semantics) and the
//! outage tracker.
//!
//! Writes serialize under the coordinator lock long enough to mutate the
//! store and capture the affected set; listener delivery happens off the
//! lock on the broadcaster workers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use flagdeck_core::AllData;
use flagdeck_core::DataKind;
use flagdeck_core::DataSourceState;
use flagdeck_core::DataSourceStatus;
use flagdeck_core::ErrorInfo;
use flagdeck_core::FeatureFlag;
use flagdeck_core::ItemDescriptor;
use flagdeck_core::Operator;
use flagdeck_core::StoreError;
use flagdeck_core::interfaces::DataSourceUpdates;
use flagdeck_core::interfaces::DataStore;
use time::OffsetDateTime;
use tracing::info;
use tracing::warn;

use crate::broadcast::FlagChange;
use crate::broadcast::FlagChangeBroadcaster;
use crate::broadcast::FlagChangeListener;
use crate::broadcast::StatusBroadcaster;
use crate::broadcast::StatusListener;
use crate::outage::OutageTracker;

// ============================================================================
// SECTION: Dependency Graphs
// ============================================================================

/// Reverse-adjacency maps from referenced items to the flags using them.
#[derive(Debug, Default)]
struct DependencyTracker {
    /// Flags with a `segmentMatch` clause on each segment key.
    flags_using_segment: BTreeMap<String, BTreeSet<String>>,
    /// Flags with a prerequisite on each flag key.
    flags_using_flag: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyTracker {
    /// Rebuilds both graphs from a full flag payload.
    fn rebuild(&mut self, flags: &BTreeMap<String, FeatureFlag>) {
        self.flags_using_segment.clear();
        self.flags_using_flag.clear();
        for flag in flags.values() {
            self.add_edges(flag);
        }
    }

    /// Refreshes the edges contributed by one flag key.
    fn update_flag(&mut self, key: &str, flag: Option<&FeatureFlag>) {
        for users in self.flags_using_segment.values_mut() {
            users.remove(key);
        }
        for users in self.flags_using_flag.values_mut() {
            users.remove(key);
        }
        if let Some(flag) = flag {
            self.add_edges(flag);
        }
    }

    /// Adds the edges contributed by one flag.
    fn add_edges(&mut self, flag: &FeatureFlag) {
        for prerequisite in &flag.prerequisites {
            self.flags_using_flag
                .entry(prerequisite.key.clone())
                .or_default()
                .insert(flag.key.clone());
        }
        for rule in &flag.rules {
            for clause in &rule.clauses {
                if clause.op != Operator::SegmentMatch {
                    continue;
                }
                for value in &clause.values {
                    if let Some(segment_key) = value.as_str() {
                        self.flags_using_segment
                            .entry(segment_key.to_string())
                            .or_default()
                            .insert(flag.key.clone());
                    }
                }
            }
        }
    }

    /// Computes the transitive closure of affected flag keys.
    ///
    /// Breadth-first with cycle protection: a flag already collected is not
    /// re-queued.
    fn affected(
        &self,
        seed_flags: &BTreeSet<String>,
        seed_segments: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        let mut result = seed_flags.clone();
        let mut queue: VecDeque<String> = seed_flags.iter().cloned().collect();
        for segment_key in seed_segments {
            if let Some(users) = self.flags_using_segment.get(segment_key) {
                for flag_key in users {
                    if result.insert(flag_key.clone()) {
                        queue.push_back(flag_key.clone());
                    }
                }
            }
        }
        while let Some(flag_key) = queue.pop_front() {
            if let Some(users) = self.flags_using_flag.get(&flag_key) {
                for dependent in users {
                    if result.insert(dependent.clone()) {
                        queue.push_back(dependent.clone());
                    }
                }
            }
        }
        result
    }
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// The single write path from data sources into the store.
///
/// # Invariants
/// - Store mutation and affected-set capture happen under one lock.
/// - The exposed state never returns to `Initializing`.
pub struct UpdateCoordinator {
    /// Underlying store; the coordinator is its only writer.
    store: Arc<dyn DataStore>,
    /// Dependency graphs, guarded by the write lock.
    dependencies: Mutex<DependencyTracker>,
    /// Exposed data-source status.
    status: Mutex<DataSourceStatus>,
    /// Flag-change fan-out.
    flag_broadcaster: FlagChangeBroadcaster,
    /// Status fan-out.
    status_broadcaster: StatusBroadcaster,
    /// Outage aggregation, when configured.
    outage: Option<Arc<OutageTracker>>,
    /// Callback asking the active data source to refresh.
    refresh_hook: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
    /// Whether the first successful init has been logged.
    first_init_logged: AtomicBool,
}

impl UpdateCoordinator {
    /// Creates a coordinator over `store`, optionally logging outages that
    /// persist past `outage_timeout`.
    #[must_use]
    pub fn new(store: Arc<dyn DataStore>, outage_timeout: Option<Duration>) -> Arc<Self> {
        let coordinator = Arc::new(Self {
            store,
            dependencies: Mutex::new(DependencyTracker::default()),
            status: Mutex::new(DataSourceStatus::initializing(OffsetDateTime::now_utc())),
            flag_broadcaster: FlagChangeBroadcaster::new(),
            status_broadcaster: StatusBroadcaster::new(),
            outage: outage_timeout.map(OutageTracker::new),
            refresh_hook: Mutex::new(None),
            first_init_logged: AtomicBool::new(false),
        });
        coordinator.spawn_store_monitor();
        coordinator
    }

    /// Returns the current exposed status.
    #[must_use]
    pub fn status(&self) -> DataSourceStatus {
        self.status.lock().map_or_else(
            |_| DataSourceStatus::initializing(OffsetDateTime::now_utc()),
            |status| status.clone(),
        )
    }

    /// Registers a flag-change listener.
    pub fn add_flag_change_listener(&self, listener: Arc<dyn FlagChangeListener>) {
        self.flag_broadcaster.add_listener(listener);
    }

    /// Registers a status listener.
    pub fn add_status_listener(&self, listener: Arc<dyn StatusListener>) {
        self.status_broadcaster.add_listener(listener);
    }

    /// Binds the callback that restarts the active data source.
    pub fn set_refresh_hook(&self, hook: Box<dyn Fn() + Send + Sync>) {
        if let Ok(mut slot) = self.refresh_hook.lock() {
            *slot = Some(hook);
        }
    }

    /// Stops broadcasters and the outage timer. Idempotent.
    pub fn close(&self) {
        self.flag_broadcaster.close();
        self.status_broadcaster.close();
        if let Some(outage) = &self.outage {
            outage.close();
        }
    }

    /// Subscribes to store availability updates, when the store offers them.
    ///
    /// A transition from unavailable back to available triggers the refresh
    /// hook so the data source re-syncs the possibly-stale cache.
    fn spawn_store_monitor(self: &Arc<Self>) {
        let Some(receiver) = self.store.status_updates() else {
            return;
        };
        let coordinator = Arc::downgrade(self);
        // The monitor thread ends on its own when the store drops its sender.
        let _ = tokio::task::spawn_blocking(move || {
            let mut was_available = true;
            while let Ok(status) = receiver.recv() {
                let Some(coordinator) = coordinator.upgrade() else {
                    return;
                };
                if status.available && !was_available {
                    warn!("data store became available again; requesting a data source refresh");
                    if let Ok(hook) = coordinator.refresh_hook.lock()
                        && let Some(hook) = hook.as_ref()
                    {
                        hook();
                    }
                }
                was_available = status.available;
            }
        });
    }

    /// Collects keys added, removed, or version-changed between the stored
    /// descriptors and an incoming payload.
    fn changed_keys(
        old: &BTreeMap<String, ItemDescriptor>,
        new_versions: &BTreeMap<String, u64>,
    ) -> BTreeSet<String> {
        let mut changed = BTreeSet::new();
        for (key, descriptor) in old {
            match new_versions.get(key) {
                None => {
                    changed.insert(key.clone());
                }
                Some(version) if *version != descriptor.version => {
                    changed.insert(key.clone());
                }
                Some(_) => {}
            }
        }
        for key in new_versions.keys() {
            if !old.contains_key(key) {
                changed.insert(key.clone());
            }
        }
        changed
    }
}

impl DataSourceUpdates for UpdateCoordinator {
    fn init(&self, data: AllData) -> Result<(), StoreError> {
        let affected = {
            let Ok(mut dependencies) = self.dependencies.lock() else {
                return Err(StoreError::Unavailable("coordinator lock poisoned".to_string()));
            };
            let old_flags = self.store.get_all(DataKind::Features)?;
            let old_segments = self.store.get_all(DataKind::Segments)?;
            let flag_versions: BTreeMap<String, u64> =
                data.flags.iter().map(|(key, flag)| (key.clone(), flag.version)).collect();
            let segment_versions: BTreeMap<String, u64> = data
                .segments
                .iter()
                .map(|(key, segment)| (key.clone(), segment.version))
                .collect();
            let changed_flags = Self::changed_keys(&old_flags, &flag_versions);
            let changed_segments = Self::changed_keys(&old_segments, &segment_versions);
            dependencies.rebuild(&data.flags);
            let affected = dependencies.affected(&changed_flags, &changed_segments);
            self.store.init(data.into_data_set())?;
            affected
        };
        if !self.first_init_logged.swap(true, Ordering::SeqCst) {
            info!("flag data initialized; evaluations are now served from the local store");
        }
        self.flag_broadcaster.broadcast(
            affected
                .into_iter()
                .map(|key| FlagChange {
                    key,
                })
                .collect(),
        );
        Ok(())
    }

    fn upsert(&self, kind: DataKind, key: &str, item: ItemDescriptor) -> Result<(), StoreError> {
        let affected = {
            let Ok(mut dependencies) = self.dependencies.lock() else {
                return Err(StoreError::Unavailable("coordinator lock poisoned".to_string()));
            };
            let applied = self.store.upsert(kind, key, item.clone())?;
            if !applied {
                return Ok(());
            }
            let mut seed_flags = BTreeSet::new();
            let mut seed_segments = BTreeSet::new();
            match kind {
                DataKind::Features => {
                    dependencies.update_flag(key, item.as_flag());
                    seed_flags.insert(key.to_string());
                }
                DataKind::Segments => {
                    seed_segments.insert(key.to_string());
                }
            }
            dependencies.affected(&seed_flags, &seed_segments)
        };
        self.flag_broadcaster.broadcast(
            affected
                .into_iter()
                .map(|key| FlagChange {
                    key,
                })
                .collect(),
        );
        Ok(())
    }

    fn update_status(&self, state: DataSourceState, error: Option<ErrorInfo>) {
        let (changed, snapshot) = {
            let Ok(mut status) = self.status.lock() else {
                return;
            };
            let changed = status.apply(state, error.clone(), OffsetDateTime::now_utc());
            (changed, status.clone())
        };
        if let Some(outage) = &self.outage {
            outage.observe(snapshot.state, error.as_ref());
        }
        if changed {
            self.status_broadcaster.broadcast(snapshot);
        }
    }
}
