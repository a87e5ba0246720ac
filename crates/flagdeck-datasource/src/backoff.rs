// crates/flagdeck-datasource/src/backoff.rs
// ============================================================================
// Module: Flagdeck Reconnect Backoff
// Description: Decorrelated-jitter backoff schedule for stream reconnects.
// Purpose: Space reconnect attempts without synchronized thundering herds.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! Reconnect delays follow decorrelated jitter: each delay is drawn
//! uniformly from `[base, 3 * previous]` and capped at the maximum. The very
//! first attempt after start has zero delay, and a connection held long
//! enough resets the schedule so that a long-lived stream reconnects
//! promptly after a one-off drop.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use rand::Rng;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default initial reconnect delay.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Cap applied to every computed delay.
pub const MAX_DELAY: Duration = Duration::from_secs(30);

/// Connection duration after which the attempt counter resets.
pub const RESET_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// SECTION: Schedule
// ============================================================================

/// Decorrelated-jitter backoff schedule.
///
/// # Invariants
/// - The first `next_delay` after construction or reset is zero.
/// - Every later delay lies in `[base, max]`.
#[derive(Debug)]
pub struct BackoffSchedule {
    /// Lower bound for every non-zero delay.
    base: Duration,
    /// Upper cap for every delay.
    max: Duration,
    /// Previous delay, seeding the next draw.
    previous: Option<Duration>,
    /// Whether the zero-delay first attempt has been spent.
    first_spent: bool,
}

impl BackoffSchedule {
    /// Creates a schedule with the given base, capped at `max`.
    ///
    /// A zero base is raised to one millisecond so the jitter interval stays
    /// non-empty.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base: base.max(Duration::from_millis(1)),
            max,
            previous: None,
            first_spent: false,
        }
    }

    /// Returns the delay to sleep before the next connection attempt.
    pub fn next_delay(&mut self) -> Duration {
        if !self.first_spent {
            self.first_spent = true;
            return Duration::ZERO;
        }
        let base_ms = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        let cap_ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        let previous_ms = self
            .previous
            .map_or(base_ms, |previous| u64::try_from(previous.as_millis()).unwrap_or(u64::MAX));
        let upper = previous_ms.saturating_mul(3).clamp(base_ms.saturating_add(1), u64::MAX);
        let drawn = rand::thread_rng().gen_range(base_ms..upper);
        let delay_ms = drawn.min(cap_ms);
        let delay = Duration::from_millis(delay_ms);
        self.previous = Some(delay);
        delay
    }

    /// Notes how long the last connection survived; a sustained connection
    /// resets the schedule, including the free first attempt.
    pub fn note_connection(&mut self, held: Duration) {
        if held >= RESET_INTERVAL {
            self.previous = None;
            self.first_spent = false;
        }
    }
}
