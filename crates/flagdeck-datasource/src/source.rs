// crates/flagdeck-datasource/src/source.rs
// ============================================================================
// Module: Flagdeck Data Source Contract
// Description: Data source trait, start signaling, and the external-only source.
// Purpose: Define the lifecycle shared by streaming, polling, and test sources.
// Dependencies: flagdeck-core, tokio
// ============================================================================

//! ## Overview
//! A [`DataSource`] feeds a store through a [`DataSourceUpdates`] sink and
//! reports its health through the same sink. `start` is asynchronous: it
//! returns a receiver that resolves `true` once the first full payload has
//! been applied, or `false` once the source has terminated without ever
//! initializing. The start outcome resolves at most once; late completions
//! are ignored, and every subscriber observes the same outcome.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use flagdeck_core::DataSourceState;
use flagdeck_core::interfaces::DataSourceUpdates;
use tokio::sync::oneshot;

// ============================================================================
// SECTION: Data Source Trait
// ============================================================================

/// A background data source keeping a store current.
///
/// Sources are constructed at client start, run until the client closes,
/// and release their connections and tasks on every exit path.
pub trait DataSource: Send + Sync {
    /// Starts the source, returning a receiver for the one-shot start
    /// outcome.
    ///
    /// Calling `start` again does not restart the source; it returns another
    /// subscription to the same outcome.
    fn start(&self) -> oneshot::Receiver<bool>;

    /// Asks the source to refresh its data, typically after a store
    /// recovered from an availability gap.
    fn refresh(&self);

    /// Stops the source. Idempotent.
    fn close(&self);
}

// ============================================================================
// SECTION: Start Signal
// ============================================================================

/// Fan-out cell for the one-shot start outcome.
///
/// # Invariants
/// - The first `complete` wins; later completions are ignored.
/// - Subscribers after completion observe the recorded outcome immediately.
#[derive(Debug, Default)]
pub struct StartSignal {
    /// Recorded outcome plus pending subscriber channels.
    inner: Mutex<StartSignalState>,
}

/// Mutable state behind the start-signal lock.
#[derive(Debug, Default)]
struct StartSignalState {
    /// Outcome once known.
    result: Option<bool>,
    /// Subscribers awaiting the outcome.
    waiters: Vec<oneshot::Sender<bool>>,
}

impl StartSignal {
    /// Creates an unresolved start signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the start outcome.
    #[must_use]
    pub fn subscribe(&self) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut state) = self.inner.lock() {
            match state.result {
                Some(result) => {
                    let _ = tx.send(result);
                }
                None => state.waiters.push(tx),
            }
        }
        rx
    }

    /// Records the outcome and resolves all subscribers.
    ///
    /// Only the first call has any effect.
    pub fn complete(&self, success: bool) {
        let Ok(mut state) = self.inner.lock() else {
            return;
        };
        if state.result.is_some() {
            return;
        }
        state.result = Some(success);
        for waiter in state.waiters.drain(..) {
            let _ = waiter.send(success);
        }
    }

    /// Returns the recorded outcome, when resolved.
    #[must_use]
    pub fn result(&self) -> Option<bool> {
        self.inner.lock().ok().and_then(|state| state.result)
    }
}

// ============================================================================
// SECTION: External-Only Source
// ============================================================================

/// A source for stores populated externally: reports `Valid`, never writes.
///
/// # Invariants
/// - The start outcome resolves `true` immediately.
pub struct NullDataSource {
    /// Status sink.
    updates: Arc<dyn DataSourceUpdates>,
    /// Start outcome cell.
    start: StartSignal,
}

impl NullDataSource {
    /// Creates an external-only source reporting through `updates`.
    #[must_use]
    pub fn new(updates: Arc<dyn DataSourceUpdates>) -> Self {
        Self {
            updates,
            start: StartSignal::new(),
        }
    }
}

impl DataSource for NullDataSource {
    fn start(&self) -> oneshot::Receiver<bool> {
        self.updates.update_status(DataSourceState::Valid, None);
        self.start.complete(true);
        self.start.subscribe()
    }

    fn refresh(&self) {}

    fn close(&self) {}
}
