// crates/flagdeck-datasource/src/sse.rs
// ============================================================================
// Module: Flagdeck SSE Decoder
// Description: Incremental server-sent-event decoder.
// Purpose: Turn raw stream chunks into complete named events.
// Dependencies: none beyond std
// ============================================================================

//! ## Overview
//! An incremental decoder for the `text/event-stream` format. Chunks arrive
//! at arbitrary boundaries; the decoder buffers until a complete line is
//! available and dispatches an event on every blank line. Multiple `data:`
//! lines are joined with newlines; comment lines and unknown fields are
//! skipped. Events without data are not dispatched.
//!
//! Security posture: stream bytes are untrusted; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Events
// ============================================================================

/// One complete server-sent event.
///
/// # Invariants
/// - `event` defaults to `message` when the stream omits the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type from the `event:` field.
    pub event: String,
    /// Joined payload from the `data:` fields.
    pub data: String,
}

// ============================================================================
// SECTION: Decoder
// ============================================================================

/// Incremental decoder state.
///
/// # Invariants
/// - `buffer` holds at most one incomplete line between `push` calls.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of the current incomplete line.
    buffer: Vec<u8>,
    /// Event type accumulated for the event in progress.
    event_type: Option<String>,
    /// Data lines accumulated for the event in progress.
    data_lines: Vec<String>,
}

impl SseDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for byte in chunk {
            if *byte == b'\n' {
                let line = String::from_utf8_lossy(&self.buffer).into_owned();
                self.buffer.clear();
                if let Some(event) = self.handle_line(line.trim_end_matches('\r')) {
                    events.push(event);
                }
            } else {
                self.buffer.push(*byte);
            }
        }
        events
    }

    /// Processes one complete line, returning an event on dispatch.
    fn handle_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            // Comment lines keep the connection alive; nothing to record.
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event_type = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            _ => {}
        }
        None
    }

    /// Dispatches the accumulated event, if it carries data.
    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_type = self.event_type.take().unwrap_or_else(|| "message".to_string());
        if self.data_lines.is_empty() {
            return None;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(SseEvent {
            event: event_type,
            data,
        })
    }
}
