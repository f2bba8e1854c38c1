use serde_json::Value;

use super::StreamEvent;

pub const DATA_PREFIX: &str = "data: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line_number: u64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    pub events: u64,
    pub malformed: u64,
    pub terminal_seen: bool,
}

/// Incremental decoder for a `text/event-stream` response body.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; the unterminated tail is carried
/// over to the next `feed`. Events are handed to the callback synchronously, in arrival
/// order.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    line_number: u64,
    summary: DecodeSummary,
    diagnostics: Vec<Diagnostic>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed<F>(&mut self, chunk: &[u8], mut on_event: F)
    where
        F: FnMut(StreamEvent),
    {
        self.buffer.extend_from_slice(chunk);
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|byte| *byte == b'\n') {
            let end = start + offset;
            let line = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
            self.handle_line(&line, &mut on_event);
            start = end + 1;
        }
        self.buffer.drain(..start);
    }

    /// Flushes a final unterminated line and returns what the stream produced.
    pub fn finish<F>(&mut self, mut on_event: F) -> DecodeSummary
    where
        F: FnMut(StreamEvent),
    {
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer.clear();
            self.handle_line(&line, &mut on_event);
        }
        self.summary
    }

    pub fn summary(&self) -> DecodeSummary {
        self.summary
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn handle_line<F>(&mut self, raw: &str, on_event: &mut F)
    where
        F: FnMut(StreamEvent),
    {
        self.line_number += 1;
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };

        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(
                    line = self.line_number,
                    error = %err,
                    "skipping malformed stream event"
                );
                self.summary.malformed += 1;
                self.diagnostics.push(Diagnostic {
                    line_number: self.line_number,
                    message: format!("malformed event payload: {err}"),
                });
                return;
            }
        };

        let Some(event) = StreamEvent::from_value(&value) else {
            tracing::debug!(line = self.line_number, "ignoring unrecognised stream event");
            return;
        };
        self.summary.events += 1;
        if event.is_terminal() {
            self.summary.terminal_seen = true;
        }
        on_event(event);
    }
}
