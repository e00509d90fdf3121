//! Server-sent-event decoding shared by the provider services.
//!
//! Providers stream `data:` lines whose payloads differ per API. The
//! services supply a [`FrameDecoder`] that maps one payload to a [`Frame`];
//! [`sse_text_stream`] handles line buffering and turns the byte stream into
//! a lazy [`TextStream`] that yields only non-empty text, in arrival order.

use std::collections::VecDeque;
use std::pin::Pin;

use futures_util::stream::{self, Stream, StreamExt};
use memchr::memchr;
use serde_json::Value;

use crate::core::services::ServiceError;

/// Pull-based sequence of reply increments. Finite and single-consumption.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ServiceError>> + Send>>;

/// What one SSE payload contributes to the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Metadata, tool calls, keep-alives, empty deltas.
    Skip,
    /// Explicit end-of-stream marker.
    Done,
}

pub type FrameDecoder = fn(&str) -> Result<Frame, ServiceError>;

pub(crate) fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn extract_error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Reduce an error body (JSON or otherwise) to a one-line message.
pub fn api_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty response body>".to_string();
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&value).filter(|s| !s.is_empty()) {
            return summary;
        }
        return value.to_string();
    }

    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when a streamed payload is an error object rather than a data frame.
pub(crate) fn is_error_payload(value: &Value) -> bool {
    value.get("error").is_some()
}

struct SseState<S> {
    bytes: Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, ServiceError>>,
    finished: bool,
    decode: FrameDecoder,
}

impl<S> SseState<S> {
    /// Decode one line. Returns false once the stream must stop.
    fn process_line(&mut self, raw: &[u8]) -> bool {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(err) => {
                tracing::debug!(error = %err, "Invalid UTF-8 in stream line");
                return true;
            }
        };

        let Some(payload) = extract_data_payload(line) else {
            return true;
        };
        if payload.is_empty() {
            return true;
        }

        match (self.decode)(payload) {
            Ok(Frame::Text(text)) if !text.is_empty() => {
                self.pending.push_back(Ok(text));
                true
            }
            Ok(Frame::Text(_)) | Ok(Frame::Skip) => true,
            Ok(Frame::Done) => false,
            Err(err) => {
                self.pending.push_back(Err(err));
                false
            }
        }
    }

    fn drain_complete_lines(&mut self) {
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if !self.process_line(&line[..newline_pos]) {
                self.finish();
                return;
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.buffer.clear();
    }
}

/// Turn an HTTP body into reply increments using `decode` for each `data:`
/// payload. Transport errors end the stream after being yielded once.
pub fn sse_text_stream<S, B>(bytes: S, decode: FrameDecoder) -> TextStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
        decode,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(chunk.as_ref());
                    state.drain_complete_lines();
                }
                Some(Err(err)) => {
                    state.pending.push_back(Err(ServiceError::Http(err)));
                    state.finish();
                }
                None => {
                    // A final line without a trailing newline still counts.
                    let rest = std::mem::take(&mut state.buffer);
                    if !rest.is_empty() {
                        state.process_line(&rest);
                    }
                    state.finish();
                }
            }
        }
    }))
}
