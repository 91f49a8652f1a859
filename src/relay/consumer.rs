//! Client-side consumer for the relayed event stream
//!
//! Mirrors the relay's semantics on the receiving end: one instance per
//! request, two UI-facing buffers (think replaces, response accumulates),
//! stop on sentinel or connection close. A read error is fatal for the
//! request; there is no automatic reconnect.

use crate::errors::{AppError, Result};
use crate::relay::StreamRelay;
use crate::types::StreamEvent;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

/// Incremental consumer of an HTTP response body carrying relay frames
#[derive(Debug, Default)]
pub struct StreamConsumer {
    relay: StreamRelay,
}

impl StreamConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk, returning classified events in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.relay
            .push(chunk)
            .into_iter()
            .map(|relayed| relayed.event)
            .collect()
    }

    /// Flush after the connection closed without a sentinel
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.relay
            .finish()
            .into_iter()
            .map(|relayed| relayed.event)
            .collect()
    }

    pub fn is_done(&self) -> bool {
        self.relay.is_done()
    }

    /// Latest full thinking text
    pub fn think(&self) -> &str {
        self.relay.think()
    }

    /// Cumulative answer transcript
    pub fn response(&self) -> &str {
        self.relay.response()
    }

    /// Drain a whole body stream, invoking `on_event` for every event
    ///
    /// Chunk sizes are whatever the transport delivers. Returns after the
    /// sentinel or when the connection closes; a failed read surfaces as
    /// [`AppError::StreamRead`].
    pub async fn consume<S, E, F>(&mut self, stream: S, mut on_event: F) -> Result<()>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: std::fmt::Display,
        F: FnMut(&StreamEvent),
    {
        let mut stream = std::pin::pin!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| AppError::StreamRead(err.to_string()))?;
            for event in self.push(&chunk) {
                on_event(&event);
            }
            if self.is_done() {
                return Ok(());
            }
        }
        for event in self.finish() {
            on_event(&event);
        }
        Ok(())
    }
}
