// crates/flagdeck-datasource/tests/sse_decoder.rs
// ============================================================================
// Module: SSE Decoder Tests
// Description: Validate incremental server-sent-event decoding.
// Purpose: Pin chunk-boundary handling, data joining, and field parsing.
// Dependencies: flagdeck-datasource
// ============================================================================

//! ## Overview
//! Exercises [`flagdeck_datasource::SseDecoder`] against split chunks,
//! multi-line data, comments, and missing fields.

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

use flagdeck_datasource::SseDecoder;
use flagdeck_datasource::SseEvent;

// ============================================================================
// SECTION: Basic Decoding
// ============================================================================

#[test]
fn decodes_a_complete_event() {
    let mut decoder = SseDecoder::new();
    let events = decoder.push(b"event: put\ndata: {\"path\":\"/\"}\n\n");
    assert_eq!(
        events,
        vec![SseEvent {
            event: "put".to_string(),
            data: "{\"path\":\"/\"}".to_string()
        }]
    );
}

#[test]
fn event_type_defaults_to_message() {
    let mut decoder = SseDecoder::new();
    let events = decoder.push(b"data: hello\n\n");
    assert_eq!(events[0].event, "message");
}

#[test]
fn events_split_across_chunks_reassemble() {
    let mut decoder = SseDecoder::new();
    assert!(decoder.push(b"event: pa").is_empty());
    assert!(decoder.push(b"tch\ndata: {\"pa").is_empty());
    let events = decoder.push(b"th\":\"/flags/f\"}\n\n");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "patch");
    assert_eq!(events[0].data, "{\"path\":\"/flags/f\"}");
}

#[test]
fn multiple_data_lines_join_with_newlines() {
    let mut decoder = SseDecoder::new();
    let events = decoder.push(b"data: first\ndata: second\n\n");
    assert_eq!(events[0].data, "first\nsecond");
}

#[test]
fn crlf_line_endings_are_tolerated() {
    let mut decoder = SseDecoder::new();
    let events = decoder.push(b"event: put\r\ndata: body\r\n\r\n");
    assert_eq!(events[0].event, "put");
    assert_eq!(events[0].data, "body");
}

// ============================================================================
// SECTION: Skipped Content
// ============================================================================

#[test]
fn comments_and_unknown_fields_are_skipped() {
    let mut decoder = SseDecoder::new();
    let events = decoder.push(b": keep-alive\nid: 7\nretry: 1000\ndata: x\n\n");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data, "x");
}

#[test]
fn blank_lines_without_data_dispatch_nothing() {
    let mut decoder = SseDecoder::new();
    assert!(decoder.push(b"\n\n: comment\n\n").is_empty());
}

#[test]
fn multiple_events_in_one_chunk_all_dispatch() {
    let mut decoder = SseDecoder::new();
    let events = decoder.push(b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\n");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event, "a");
    assert_eq!(events[1].event, "b");
}

#[test]
fn data_without_space_after_colon_is_accepted() {
    let mut decoder = SseDecoder::new();
    let events = decoder.push(b"data:tight\n\n");
    assert_eq!(events[0].data, "tight");
}
