//! Server-sent event decoding for streamed completions
//!
//! The response body arrives as arbitrary byte chunks. [`LineBuffer`] keeps
//! the incomplete tail of the last chunk until its newline arrives, so a line
//! (or a multi-byte character) split across reads is never parsed early.
//! [`StreamDecoder`] classifies each complete line and folds the JSON
//! payloads into accumulated content, usage and cost.
//!
//! Line handling:
//!
//! - blank lines are ignored
//! - `data: [DONE]` ends the stream immediately
//! - `data: <json>` may carry a text delta, a usage object and a cost
//! - anything else (SSE comments, `event:` fields) is ignored
//!
//! A payload that fails to parse is logged and skipped.

use bytes::BytesMut;
use serde_json::Value;

use super::usage::{extract_cost, normalize_usage, Usage};

/// Terminator payload marking the end of the stream
pub const DONE_MARKER: &str = "[DONE]";

/// Accumulates raw bytes and yields complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: BytesMut,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed
    ///
    /// Line terminators (`\n`, optionally preceded by `\r`) are stripped.
    /// Bytes after the last newline stay buffered for the next call.
    ///
    /// # Examples
    ///
    /// ```
    /// use polychat::engine::sse::LineBuffer;
    ///
    /// let mut buffer = LineBuffer::new();
    /// assert!(buffer.push(b"data: {\"a\"").is_empty());
    /// assert_eq!(buffer.push(b":1}\r\ndata: x"), vec!["data: {\"a\":1}".to_string()]);
    /// assert_eq!(buffer.finish(), Some("data: x".to_string()));
    /// ```
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw = self.pending.split_to(pos + 1);
            lines.push(decode_line(&raw[..pos]));
        }
        lines
    }

    /// Take whatever unterminated text remains
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = self.pending.split();
        Some(decode_line(&raw))
    }

    /// Number of buffered bytes not yet terminated by a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Classification of one complete line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// Empty or whitespace-only line
    Blank,
    /// The `data: [DONE]` terminator
    Done,
    /// A `data:` line carrying a payload
    Data(&'a str),
    /// Any other line
    Other,
}

/// Classify a single line of the event stream
///
/// # Examples
///
/// ```
/// use polychat::engine::sse::{classify_line, SseLine};
///
/// assert_eq!(classify_line(""), SseLine::Blank);
/// assert_eq!(classify_line("data: [DONE]"), SseLine::Done);
/// assert_eq!(classify_line("data: {}"), SseLine::Data("{}"));
/// assert_eq!(classify_line(": OPENROUTER PROCESSING"), SseLine::Other);
/// ```
pub fn classify_line(line: &str) -> SseLine<'_> {
    let line = line.trim();
    if line.is_empty() {
        return SseLine::Blank;
    }
    match line.strip_prefix("data:") {
        Some(data) => {
            let data = data.trim_start();
            if data == DONE_MARKER {
                SseLine::Done
            } else if data.is_empty() {
                SseLine::Blank
            } else {
                SseLine::Data(data)
            }
        }
        None => SseLine::Other,
    }
}

/// What a single JSON payload contributes to the stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamUpdate {
    /// Non-empty text delta from `choices[0].delta.content`
    pub delta: Option<String>,
    /// Normalized usage, if the payload carried one
    pub usage: Option<Usage>,
    /// Cost figure, if the payload carried one
    pub cost: Option<f64>,
}

/// Parse one `data:` payload
///
/// # Errors
///
/// Returns the JSON error when the payload is not valid JSON.
pub fn decode_payload(data: &str) -> std::result::Result<StreamUpdate, serde_json::Error> {
    let payload: Value = serde_json::from_str(data)?;

    let delta = payload
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let usage = payload.get("usage").and_then(normalize_usage);
    let cost = extract_cost(&payload);

    Ok(StreamUpdate { delta, usage, cost })
}

/// Whether the decoder should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// More input is expected
    Continue,
    /// The terminator was seen; stop reading
    Done,
}

/// Accumulated outcome of a decoded stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedStream {
    /// Concatenation of every accepted delta
    pub content: String,
    /// Last usage reported by the server
    pub usage: Option<Usage>,
    /// Last cost reported by the server
    pub cost: Option<f64>,
    /// Number of payloads that failed to parse
    pub malformed_lines: usize,
}

/// Incremental decoder for a completion event stream
///
/// Feed it raw chunks as they arrive; every accepted delta is handed to the
/// callback before `feed` returns. Usage and cost follow last-non-null-wins.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    lines: LineBuffer,
    state: DecodedStream,
    done: bool,
}

impl StreamDecoder {
    /// Create a decoder with empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk of the response body
    ///
    /// Once the terminator has been seen, further input is ignored.
    pub fn feed(&mut self, chunk: &[u8], on_delta: &mut dyn FnMut(&str)) -> Flow {
        if self.done {
            return Flow::Done;
        }
        for line in self.lines.push(chunk) {
            if self.handle_line(&line, on_delta) == Flow::Done {
                self.done = true;
                return Flow::Done;
            }
        }
        Flow::Continue
    }

    /// Flush a trailing line that never received its newline
    pub fn finish(&mut self, on_delta: &mut dyn FnMut(&str)) {
        if self.done {
            return;
        }
        if let Some(line) = self.lines.finish() {
            self.handle_line(&line, on_delta);
        }
        self.done = true;
    }

    /// Content accumulated so far
    pub fn content(&self) -> &str {
        &self.state.content
    }

    /// Whether the `[DONE]` terminator has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consume the decoder and return what it accumulated
    pub fn into_decoded(self) -> DecodedStream {
        self.state
    }

    fn handle_line(&mut self, line: &str, on_delta: &mut dyn FnMut(&str)) -> Flow {
        match classify_line(line) {
            SseLine::Blank => Flow::Continue,
            SseLine::Done => {
                tracing::debug!("Received stream terminator");
                Flow::Done
            }
            SseLine::Other => {
                tracing::debug!("Ignoring non-data stream line: {}", line);
                Flow::Continue
            }
            SseLine::Data(data) => {
                match decode_payload(data) {
                    Ok(update) => {
                        if let Some(delta) = update.delta {
                            self.state.content.push_str(&delta);
                            on_delta(&delta);
                        }
                        if update.usage.is_some() {
                            self.state.usage = update.usage;
                        }
                        if update.cost.is_some() {
                            self.state.cost = update.cost;
                        }
                    }
                    Err(e) => {
                        self.state.malformed_lines += 1;
                        tracing::warn!("Skipping malformed stream payload: {} ({})", data, e);
                    }
                }
                Flow::Continue
            }
        }
    }
}
