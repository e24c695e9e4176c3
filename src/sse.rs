//! Server-Sent Events (SSE) stream processing utilities.
//!
//! Upstream format:
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//!
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//!
//! data: [DONE]
//! ```
//!
//! Bytes are framed into lines before any decoding, so the produced data
//! payloads do not depend on where the transport happened to split reads.

use std::pin::Pin;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;

use crate::client::ClientError;

/// One data payload extracted from an SSE stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    /// The content after the `data:` prefix.
    Payload(String),

    /// The `[DONE]` sentinel. Nothing follows it.
    Done,
}

/// Longest line accepted from a stream before it is treated as broken.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits a byte stream into complete, trimmed, non-blank lines.
///
/// A trailing partial line stays buffered until the next `push` completes it
/// or `finish` flushes it.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: BytesMut,
    // Bytes already searched for a terminator.
    scanned: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk as read from the transport.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete line, skipping blank ones.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = self.buffer.len();
                return None;
            };
            let pos = self.scanned + offset;
            let raw = self.buffer.split_to(pos + 1);
            self.scanned = 0;
            let line = String::from_utf8_lossy(&raw[..pos]).trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
    }

    /// Flush whatever is left once the transport has closed.
    pub fn finish(&mut self) -> Option<String> {
        let raw = self.buffer.split();
        self.scanned = 0;
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        (!line.is_empty()).then_some(line)
    }

    /// Number of bytes waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Parse an SSE line to extract the data portion.
///
/// # Example
/// ```
/// use chatrelay::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "event: ping";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|s| s.trim())
}

/// Check if an SSE data payload is the end-of-stream sentinel.
///
/// # Example
/// ```
/// use chatrelay::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}

fn classify(line: &str) -> Option<SseData> {
    let data = parse_sse_line(line)?;
    if is_done_marker(data) {
        Some(SseData::Done)
    } else {
        Some(SseData::Payload(data.to_string()))
    }
}

struct SseState<S> {
    bytes: Pin<Box<S>>,
    framer: LineFramer,
    idle_timeout: Option<Duration>,
    ended: bool,
    finished: bool,
}

async fn next_chunk<S, E>(
    bytes: &mut Pin<Box<S>>,
    idle_timeout: Option<Duration>,
) -> Option<Result<Bytes, ClientError>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<ClientError>,
{
    let next = bytes.next();
    let item = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, next).await {
            Ok(item) => item,
            Err(_) => return Some(Err(ClientError::IdleTimeout(limit))),
        },
        None => next.await,
    };
    item.map(|chunk| chunk.map_err(Into::into))
}

/// Turn a raw byte stream into a stream of SSE data payloads.
///
/// - Lines without a `data:` prefix are ignored.
/// - `[DONE]` yields [`SseData::Done`] and ends the stream, even if more
///   bytes are already buffered.
/// - A transport error, an idle timeout or a line longer than
///   [`MAX_LINE_BYTES`] is yielded once and ends the stream.
/// - When the byte stream ends the stream ends too; an unterminated last line
///   is still processed.
pub fn sse_data<S, E>(
    bytes: S,
    idle_timeout: Option<Duration>,
) -> impl Stream<Item = Result<SseData, ClientError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        framer: LineFramer::new(),
        idle_timeout,
        ended: false,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        loop {
            // Process complete lines from buffer
            while let Some(line) = state.framer.next_line() {
                match classify(&line) {
                    Some(SseData::Done) => {
                        state.finished = true;
                        return Some((Ok(SseData::Done), state));
                    }
                    Some(payload) => return Some((Ok(payload), state)),
                    None => continue,
                }
            }

            if state.framer.pending() > MAX_LINE_BYTES {
                state.finished = true;
                return Some((Err(ClientError::LineTooLong(MAX_LINE_BYTES)), state));
            }

            if state.ended {
                state.finished = true;
                let data = state.framer.finish().and_then(|line| classify(&line))?;
                return Some((Ok(data), state));
            }

            match next_chunk(&mut state.bytes, state.idle_timeout).await {
                Some(Ok(chunk)) => state.framer.push(&chunk),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => state.ended = true,
            }
        }
    })
}

/// Extension trait for `reqwest::Response` to enable SSE streaming.
pub trait SSEResponseExt {
    /// Convert the response body into a stream of SSE data payloads.
    fn sse(self, idle_timeout: Option<Duration>) -> impl Stream<Item = Result<SseData, ClientError>> + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse(self, idle_timeout: Option<Duration>) -> impl Stream<Item = Result<SseData, ClientError>> + Send {
        sse_data(self.bytes_stream(), idle_timeout)
    }
}

/// Encode one normalized downstream event: `data: {"content":"..."}\n\n`.
pub fn format_sse_chunk(content: &str) -> Bytes {
    let data = json!({ "content": content });
    format!("data: {}\n\n", data).into()
}
