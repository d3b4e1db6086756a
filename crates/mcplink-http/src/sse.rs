//! Server-Sent Events decoding.
//!
//! An incremental parser for the WHATWG `text/event-stream` format. Bytes may
//! be fed in chunks of any size; line terminators split across chunks (CR in
//! one chunk, LF in the next) are handled.
//!
//! ```text
//! id: 42
//! event: message
//! data: {"jsonrpc": "2.0", ...}
//!
//! ```

use std::time::Duration;

/// Event type assumed when a stream does not name one.
pub const DEFAULT_EVENT_TYPE: &str = "message";

const BOM: char = '\u{FEFF}';

/// A dispatched Server-Sent Event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseEvent {
    /// Event ID for resumption support
    pub id: Option<String>,
    /// Event type, `None` when the stream did not set one
    pub event: Option<String>,
    /// Event data, multiple `data` lines joined with `\n`
    pub data: String,
}

impl SseEvent {
    /// Event type, defaulting to [`DEFAULT_EVENT_TYPE`].
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or(DEFAULT_EVENT_TYPE)
    }

    /// Returns `true` for `message` events.
    pub fn is_message(&self) -> bool {
        self.event_type() == DEFAULT_EVENT_TYPE
    }
}

/// Incremental SSE parser.
#[derive(Debug, Default)]
pub struct SseParser {
    line: Vec<u8>,
    pending_cr: bool,
    seen_first_line: bool,
    id: Option<String>,
    event: String,
    data: String,
    reconnect_interval: Option<Duration>,
}

impl SseParser {
    /// Create a new SSE parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed data to the parser and extract any complete events.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();

        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\r' => {
                    self.pending_cr = true;
                    self.finish_line(&mut events);
                }
                b'\n' => self.finish_line(&mut events),
                _ => self.line.push(byte),
            }
        }

        events
    }

    /// Signal end of input. An event without its terminating blank line is
    /// discarded.
    pub fn finish(&mut self) {
        self.reset();
    }

    /// Discard all partial state, as if the parser were new.
    pub fn reset(&mut self) {
        self.line.clear();
        self.pending_cr = false;
        self.seen_first_line = false;
        self.id = None;
        self.event.clear();
        self.data.clear();
    }

    /// Last reconnection interval announced with a `retry` field.
    pub fn reconnect_interval(&self) -> Option<Duration> {
        self.reconnect_interval
    }

    fn finish_line(&mut self, events: &mut Vec<SseEvent>) {
        let raw = std::mem::take(&mut self.line);
        let mut line = String::from_utf8_lossy(&raw).into_owned();
        if !self.seen_first_line {
            self.seen_first_line = true;
            if line.starts_with(BOM) {
                line.remove(0);
            }
        }

        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                events.push(event);
            }
            return;
        }

        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };

        match field {
            "event" => self.event = value.to_string(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            "retry" if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.reconnect_interval = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let id = self.id.take();
        let event = std::mem::take(&mut self.event);
        let mut data = std::mem::take(&mut self.data);

        if data.is_empty() {
            return None;
        }
        if data.ends_with('\n') {
            data.pop();
        }

        Some(SseEvent {
            id,
            event: (!event.is_empty()).then_some(event),
            data,
        })
    }
}
