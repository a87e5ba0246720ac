// crates/flagdeck-datasource/tests/backoff.rs
// ============================================================================
// Module: Backoff Schedule Tests
// Description: Validate reconnect delay bounds and reset behavior.
// Purpose: Pin the zero-delay first attempt and jitter bounds.
// Dependencies: flagdeck-datasource
// ============================================================================

//! ## Overview
//! Exercises [`flagdeck_datasource::BackoffSchedule`]: the free first
//! attempt, delay bounds under decorrelated jitter, and the sustained
//! connection reset.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::time::Duration;

use flagdeck_datasource::BackoffSchedule;
use flagdeck_datasource::backoff::RESET_INTERVAL;

// ============================================================================
// SECTION: Schedule Behavior
// ============================================================================

#[test]
fn first_attempt_has_zero_delay() {
    let mut schedule =
        BackoffSchedule::new(Duration::from_secs(1), Duration::from_secs(30));
    assert_eq!(schedule.next_delay(), Duration::ZERO);
    assert!(schedule.next_delay() > Duration::ZERO);
}

#[test]
fn delays_stay_within_base_and_cap() {
    let base = Duration::from_millis(100);
    let cap = Duration::from_millis(800);
    let mut schedule = BackoffSchedule::new(base, cap);
    let _ = schedule.next_delay();
    for _ in 0..50 {
        let delay = schedule.next_delay();
        assert!(delay >= base, "delay {delay:?} fell below the base");
        assert!(delay <= cap, "delay {delay:?} exceeded the cap");
    }
}

#[test]
fn sustained_connection_resets_the_schedule() {
    let mut schedule =
        BackoffSchedule::new(Duration::from_millis(100), Duration::from_secs(30));
    let _ = schedule.next_delay();
    let _ = schedule.next_delay();
    schedule.note_connection(RESET_INTERVAL);
    assert_eq!(schedule.next_delay(), Duration::ZERO);
}

#[test]
fn short_connection_keeps_backing_off() {
    let mut schedule =
        BackoffSchedule::new(Duration::from_millis(100), Duration::from_secs(30));
    let _ = schedule.next_delay();
    let _ = schedule.next_delay();
    schedule.note_connection(Duration::from_secs(1));
    assert!(schedule.next_delay() > Duration::ZERO);
}

#[test]
fn zero_base_is_tolerated() {
    let mut schedule = BackoffSchedule::new(Duration::ZERO, Duration::from_secs(30));
    assert_eq!(schedule.next_delay(), Duration::ZERO);
    let delay = schedule.next_delay();
    assert!(delay >= Duration::from_millis(1));
}
