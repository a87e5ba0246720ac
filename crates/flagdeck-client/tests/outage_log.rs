// crates/flagdeck-client/tests/outage_log.rs
// ============================================================================
// Module: Outage Aggregation Tests
// Description: Validate the single aggregated outage log line.
// Purpose: Pin timer arming, disarming on recovery, and error tallies.
// Dependencies: flagdeck-client, flagdeck-core, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! Drives the coordinator's outage tracker with virtual time and a captured
//! tracing subscriber: a brief interruption that recovers before the
//! timeout logs nothing, while a sustained outage logs one line enumerating
//! each distinct error with its count.

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

use std::io;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::Duration;

use flagdeck_client::UpdateCoordinator;
use flagdeck_core::DataSourceState;
use flagdeck_core::ErrorInfo;
use flagdeck_core::ErrorKind;
use flagdeck_core::InMemoryDataStore;
use flagdeck_core::interfaces::DataSourceUpdates;
use time::OffsetDateTime;
use tracing_subscriber::fmt::MakeWriter;

// ============================================================================
// SECTION: Log Capture
// ============================================================================

/// Captures formatted log output into a shared buffer.
#[derive(Clone, Default)]
struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Capture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Capture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Installs the capturing subscriber once for the whole test binary.
fn capture() -> &'static Capture {
    static CAPTURE: OnceLock<Capture> = OnceLock::new();
    CAPTURE.get_or_init(|| {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(capture.clone())
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
        capture
    })
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

fn error(kind: ErrorKind, message: &str) -> ErrorInfo {
    ErrorInfo::new(kind, Some(message.to_string()), OffsetDateTime::now_utc())
}

// ============================================================================
// SECTION: Aggregation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn brief_outage_logs_nothing_and_sustained_outage_logs_once() {
    let capture = capture();
    let coordinator = UpdateCoordinator::new(
        Arc::new(InMemoryDataStore::new()),
        Some(Duration::from_millis(100)),
    );
    coordinator.update_status(DataSourceState::Valid, None);

    // A recoverable 500 followed quickly by Valid: no outage log.
    coordinator.update_status(
        DataSourceState::Interrupted,
        Some(error(
            ErrorKind::ErrorResponse {
                status: 500,
            },
            "brief",
        )),
    );
    coordinator.update_status(DataSourceState::Valid, None);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!capture.contents().contains("ERROR_RESPONSE(500)"));

    // A sustained burst: one aggregated line after the timeout.
    coordinator.update_status(
        DataSourceState::Interrupted,
        Some(error(
            ErrorKind::ErrorResponse {
                status: 501,
            },
            "first",
        )),
    );
    coordinator.update_status(
        DataSourceState::Interrupted,
        Some(error(
            ErrorKind::ErrorResponse {
                status: 502,
            },
            "second",
        )),
    );
    coordinator.update_status(
        DataSourceState::Interrupted,
        Some(error(ErrorKind::NetworkError, "io failure")),
    );
    coordinator.update_status(
        DataSourceState::Interrupted,
        Some(error(
            ErrorKind::ErrorResponse {
                status: 501,
            },
            "first again",
        )),
    );
    tokio::time::sleep(Duration::from_millis(150)).await;

    let logged = capture.contents();
    assert!(logged.contains("NETWORK_ERROR (1 time)"), "missing network tally: {logged}");
    assert!(logged.contains("ERROR_RESPONSE(501) (2 times)"), "missing 501 tally: {logged}");
    assert!(logged.contains("ERROR_RESPONSE(502) (1 time)"), "missing 502 tally: {logged}");
    // Exactly one aggregated line for the whole burst.
    assert_eq!(logged.matches("unavailable for at least").count(), 1);

    // Recovery clears the tally; a fresh outage starts from zero.
    coordinator.update_status(DataSourceState::Valid, None);
    coordinator.update_status(
        DataSourceState::Interrupted,
        Some(error(ErrorKind::InvalidData, "fresh outage")),
    );
    tokio::time::sleep(Duration::from_millis(150)).await;
    let logged = capture.contents();
    assert_eq!(logged.matches("unavailable for at least").count(), 2);
    assert!(logged.contains("INVALID_DATA (1 time)"));
}
