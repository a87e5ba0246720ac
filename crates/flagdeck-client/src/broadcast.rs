// crates/flagdeck-client/src/broadcast.rs
// ============================================================================
// Module: Flagdeck Change Broadcasters
// Description: Fan-out of flag-change and status events to listeners.
// Purpose: Deliver events off the update path without blocking writers.
// Dependencies: flagdeck-core, tokio
// ============================================================================

//! ## Overview
//! Two broadcaster surfaces: flag-change listeners receive every
//! `FlagChange`, and status listeners receive every exposed status change.
//! Listener lists are copy-on-write, so delivery iterates an immutable
//! snapshot without holding a lock. Delivery runs on one background worker
//! per broadcaster: events from a single update batch are delivered before
//! any later batch's events, and a slow listener can never block a data
//! source.
//!
//! [`ValueChangeObserver`] adapts a flag-change listener into a
//! value-change listener for one `(flag, user)` pair: it re-evaluates on
//! every matching change and emits only when the evaluated value differs
//! from the cached previous value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;

use flagdeck_core::DataSourceStatus;
use flagdeck_core::User;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ============================================================================
// SECTION: Events and Listeners
// ============================================================================

/// Notification that a flag's configuration may have changed.
///
/// # Invariants
/// - Delivery means the flag or something it transitively references
///   changed; the evaluated value may or may not differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagChange {
    /// Key of the affected flag.
    pub key: String,
}

/// Listener for flag-change notifications.
pub trait FlagChangeListener: Send + Sync {
    /// Called once per affected flag key.
    fn flag_changed(&self, change: &FlagChange);
}

/// Listener for data-source status changes.
pub trait StatusListener: Send + Sync {
    /// Called with the new exposed status.
    fn status_changed(&self, status: &DataSourceStatus);
}

/// Notification that a flag's evaluated value changed for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagValueChange {
    /// Key of the flag.
    pub key: String,
    /// Previously evaluated value (`Null` when none).
    pub old_value: Value,
    /// Newly evaluated value (`Null` when none).
    pub new_value: Value,
}

/// Listener for per-user flag-value changes.
pub trait FlagValueChangeListener: Send + Sync {
    /// Called only when the evaluated value actually differs.
    fn flag_value_changed(&self, change: &FlagValueChange);
}

// ============================================================================
// SECTION: Flag Change Broadcaster
// ============================================================================

/// Copy-on-write listener list.
type Listeners<L> = Arc<RwLock<Arc<Vec<Arc<L>>>>>;

/// Adds a listener to a copy-on-write list.
fn push_listener<L: ?Sized>(listeners: &Listeners<L>, listener: Arc<L>) {
    if let Ok(mut slot) = listeners.write() {
        let mut next = slot.as_ref().clone();
        next.push(listener);
        *slot = Arc::new(next);
    }
}

/// Snapshots a copy-on-write list for lock-free iteration.
fn snapshot<L: ?Sized>(listeners: &Listeners<L>) -> Arc<Vec<Arc<L>>> {
    listeners.read().map(|slot| Arc::clone(&*slot)).unwrap_or_default()
}

/// Fan-out of [`FlagChange`] events.
///
/// # Invariants
/// - Batches are delivered in submission order by a single worker.
pub struct FlagChangeBroadcaster {
    /// Registered listeners.
    listeners: Listeners<dyn FlagChangeListener>,
    /// Batch queue into the delivery worker.
    sender: mpsc::UnboundedSender<Vec<FlagChange>>,
    /// Delivery worker handle, held for shutdown.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FlagChangeBroadcaster {
    /// Creates the broadcaster and spawns its delivery worker.
    #[must_use]
    pub fn new() -> Self {
        let listeners: Listeners<dyn FlagChangeListener> = Arc::default();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Vec<FlagChange>>();
        let delivery = Arc::clone(&listeners);
        let worker = tokio::spawn(async move {
            while let Some(batch) = receiver.recv().await {
                let targets = snapshot(&delivery);
                for change in &batch {
                    for listener in targets.iter() {
                        listener.flag_changed(change);
                    }
                }
            }
        });
        Self {
            listeners,
            sender,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Registers a listener for every future flag change.
    pub fn add_listener(&self, listener: Arc<dyn FlagChangeListener>) {
        push_listener(&self.listeners, listener);
    }

    /// Queues a batch of changes for background delivery.
    pub fn broadcast(&self, batch: Vec<FlagChange>) {
        if batch.is_empty() {
            return;
        }
        let _ = self.sender.send(batch);
    }

    /// Detaches all listeners and stops the worker.
    pub fn close(&self) {
        if let Ok(mut slot) = self.listeners.write() {
            *slot = Arc::new(Vec::new());
        }
        if let Ok(mut worker) = self.worker.lock()
            && let Some(handle) = worker.take()
        {
            handle.abort();
        }
    }
}

impl Default for FlagChangeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Status Broadcaster
// ============================================================================

/// Fan-out of [`DataSourceStatus`] events.
///
/// # Invariants
/// - Statuses are delivered in submission order by a single worker.
pub struct StatusBroadcaster {
    /// Registered listeners.
    listeners: Listeners<dyn StatusListener>,
    /// Status queue into the delivery worker.
    sender: mpsc::UnboundedSender<DataSourceStatus>,
    /// Delivery worker handle, held for shutdown.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StatusBroadcaster {
    /// Creates the broadcaster and spawns its delivery worker.
    #[must_use]
    pub fn new() -> Self {
        let listeners: Listeners<dyn StatusListener> = Arc::default();
        let (sender, mut receiver) = mpsc::unbounded_channel::<DataSourceStatus>();
        let delivery = Arc::clone(&listeners);
        let worker = tokio::spawn(async move {
            while let Some(status) = receiver.recv().await {
                let targets = snapshot(&delivery);
                for listener in targets.iter() {
                    listener.status_changed(&status);
                }
            }
        });
        Self {
            listeners,
            sender,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Registers a listener for every future status change.
    pub fn add_listener(&self, listener: Arc<dyn StatusListener>) {
        push_listener(&self.listeners, listener);
    }

    /// Queues a status for background delivery.
    pub fn broadcast(&self, status: DataSourceStatus) {
        let _ = self.sender.send(status);
    }

    /// Detaches all listeners and stops the worker.
    pub fn close(&self) {
        if let Ok(mut slot) = self.listeners.write() {
            *slot = Arc::new(Vec::new());
        }
        if let Ok(mut worker) = self.worker.lock()
            && let Some(handle) = worker.take()
        {
            handle.abort();
        }
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Value Change Observer
// ============================================================================

/// Evaluation callback used by [`ValueChangeObserver`].
pub type EvaluateFn = dyn Fn(&str, &User) -> Value + Send + Sync;

/// Adapts flag changes into per-user value changes with a cached last value.
///
/// # Invariants
/// - Emits only when the re-evaluated value differs from the cached one.
pub struct ValueChangeObserver {
    /// Flag key this observer watches.
    flag_key: String,
    /// User the flag is re-evaluated for.
    user: User,
    /// Cached last evaluated value.
    last_value: Mutex<Value>,
    /// Evaluation callback into the client.
    evaluate: Arc<EvaluateFn>,
    /// Downstream listener.
    listener: Arc<dyn FlagValueChangeListener>,
}

impl ValueChangeObserver {
    /// Creates an observer with the current value pre-cached.
    #[must_use]
    pub fn new(
        flag_key: String,
        user: User,
        evaluate: Arc<EvaluateFn>,
        listener: Arc<dyn FlagValueChangeListener>,
    ) -> Self {
        let initial = evaluate(&flag_key, &user);
        Self {
            flag_key,
            user,
            last_value: Mutex::new(initial),
            evaluate,
            listener,
        }
    }
}

impl FlagChangeListener for ValueChangeObserver {
    fn flag_changed(&self, change: &FlagChange) {
        if change.key != self.flag_key {
            return;
        }
        let current = (self.evaluate)(&self.flag_key, &self.user);
        let Ok(mut last) = self.last_value.lock() else {
            return;
        };
        if *last == current {
            return;
        }
        let previous = std::mem::replace(&mut *last, current.clone());
        drop(last);
        self.listener.flag_value_changed(&FlagValueChange {
            key: self.flag_key.clone(),
            old_value: previous,
            new_value: current,
        });
    }
}
