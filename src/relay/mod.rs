//! Streamed-response relay: framing, classification, and forwarding
//!
//! The relay consumes an upstream byte stream framed as line-delimited
//! events (`data: <payload>`), classifies each payload as thinking or
//! response content, and forwards frames downstream in source order. Each
//! request owns one relay instance; nothing is shared across requests.

pub mod consumer;
pub mod decoder;

use crate::errors::{AppError, Result};
use crate::types::StreamEvent;
use bytes::Bytes;
use decoder::StreamDecoder;
use futures_util::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, warn};

/// Line prefix marking an event on the wire
pub const DATA_PREFIX: &str = "data: ";

/// Terminator payload signaling end of a streamed response
pub const DONE_SENTINEL: &str = "[DONE]";

/// Markers delimiting model reasoning inside a payload
pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

/// One forwarded line: the payload as it appeared on the wire plus the
/// classified event derived from it
#[derive(Debug, Clone, PartialEq)]
pub struct Relayed {
    pub payload: String,
    pub event: StreamEvent,
}

/// Per-request relay state machine
///
/// Feed it chunks of arbitrary size; it decodes incrementally (multi-byte
/// characters split across reads are buffered, never corrupted), splits on
/// newline boundaries, and classifies each `data: ` line. Lines without the
/// prefix are framing noise and produce nothing. The `[DONE]` sentinel stops
/// processing and is never surfaced as an event.
#[derive(Debug, Default)]
pub struct StreamRelay {
    decoder: StreamDecoder,
    think: String,
    response: String,
    done: bool,
}

impl StreamRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the sentinel has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Latest full thinking text
    pub fn think(&self) -> &str {
        &self.think
    }

    /// Cumulative response transcript
    pub fn response(&self) -> &str {
        &self.response
    }

    /// Feed one chunk, returning classified lines in source order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Relayed> {
        if self.done {
            return Vec::new();
        }
        let lines = self.decoder.push(chunk);
        self.classify_lines(lines)
    }

    /// Flush a trailing unterminated line after upstream close
    pub fn finish(&mut self) -> Vec<Relayed> {
        if self.done {
            return Vec::new();
        }
        match self.decoder.take_remainder() {
            Some(line) => self.classify_lines(vec![line]),
            None => Vec::new(),
        }
    }

    fn classify_lines(&mut self, lines: Vec<String>) -> Vec<Relayed> {
        let mut out = Vec::new();
        for line in lines {
            if self.done {
                break;
            }
            if let Some(relayed) = self.classify(&line) {
                out.push(relayed);
            }
        }
        out
    }

    /// Classify one complete line
    ///
    /// Think payloads replace the buffer wholesale; providers normalize
    /// think payloads to full-text-so-far, so replacement is lossless (see
    /// DESIGN.md). Response payloads append, keeping the transcript
    /// cumulative and prefix-compatible.
    fn classify(&mut self, line: &str) -> Option<Relayed> {
        let payload = line.strip_prefix(DATA_PREFIX)?;

        if payload == DONE_SENTINEL {
            self.done = true;
            return None;
        }

        let event = if payload.contains(THINK_OPEN) || payload.contains(THINK_CLOSE) {
            self.think = payload.replace(THINK_OPEN, "").replace(THINK_CLOSE, "");
            StreamEvent::Think {
                content: self.think.clone(),
            }
        } else {
            self.response.push_str(payload);
            StreamEvent::Response {
                content: self.response.clone(),
            }
        };

        Some(Relayed {
            payload: payload.to_string(),
            event,
        })
    }
}

/// Encode a payload as one wire frame
pub fn frame(payload: &str) -> Bytes {
    Bytes::from(format!("{DATA_PREFIX}{payload}\n\n"))
}

/// The terminating sentinel frame
pub fn done_frame() -> Bytes {
    frame(DONE_SENTINEL)
}

/// Forward an upstream frame stream to a downstream client
///
/// Drives one [`StreamRelay`] over the upstream, re-emitting each classified
/// line as a wire frame in source order and appending exactly one sentinel
/// frame at the end. An upstream that stays silent longer than
/// `idle_timeout` or fails mid-read terminates the stream with an inline
/// error frame (no sentinel). Dropping the returned stream, as axum does
/// when the client disconnects, drops the upstream connection with it, so
/// no orphaned upstream reads remain.
pub fn forward<S>(
    upstream: S,
    idle_timeout: Duration,
) -> impl Stream<Item = std::result::Result<Bytes, Infallible>> + Send
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    async_stream::stream! {
        let mut relay = StreamRelay::new();
        let mut upstream = Box::pin(upstream);

        loop {
            match tokio::time::timeout(idle_timeout, upstream.next()).await {
                Err(_) => {
                    let err = AppError::UpstreamTimeout {
                        idle_secs: idle_timeout.as_secs(),
                    };
                    warn!(idle_secs = idle_timeout.as_secs(), "upstream idle, tearing down");
                    yield Ok::<Bytes, Infallible>(frame(&format!("[ERROR] {err}")));
                    return;
                }
                Ok(None) => break,
                Ok(Some(Err(err))) => {
                    warn!(error = %err, "upstream read failed mid-stream");
                    yield Ok(frame(&format!("[ERROR] {err}")));
                    return;
                }
                Ok(Some(Ok(chunk))) => {
                    for relayed in relay.push(&chunk) {
                        yield Ok(frame(&relayed.payload));
                    }
                    if relay.is_done() {
                        break;
                    }
                }
            }
        }

        for relayed in relay.finish() {
            yield Ok(frame(&relayed.payload));
        }

        debug!(
            response_chars = relay.response().len(),
            think_chars = relay.think().len(),
            "relay complete"
        );
        yield Ok(done_frame());
    }
}
