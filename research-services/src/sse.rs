//! Server-sent event framing
//!
//! A frame is an optional `event: <name>` line followed by `data: <payload>`
//! and a blank line. Payloads are JSON unless the caller hands over a string
//! that is already encoded.

use std::convert::Infallible;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use research_core::{ResearchError, ResearchEvent};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    event: Option<String>,
    data: String,
}

impl SseFrame {
    /// Frame carrying the JSON encoding of `payload`
    pub fn json<T: Serialize>(payload: &T) -> Result<Self, ResearchError> {
        let data = serde_json::to_string(payload)
            .map_err(|e| ResearchError::internal(format!("Failed to encode event: {}", e)))?;
        Ok(Self { event: None, data })
    }

    /// Frame carrying a pre-encoded payload verbatim
    pub fn raw(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn encode(&self) -> String {
        let mut frame = String::with_capacity(self.data.len() + 16);
        if let Some(event) = &self.event {
            frame.push_str("event: ");
            frame.push_str(event);
            frame.push('\n');
        }
        // Each payload line needs its own field prefix
        for line in self.data.split('\n') {
            frame.push_str("data: ");
            frame.push_str(line);
            frame.push('\n');
        }
        frame.push('\n');
        frame
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.encode())
    }
}

impl From<&ResearchEvent> for SseFrame {
    fn from(event: &ResearchEvent) -> Self {
        SseFrame::json(event).unwrap_or_else(|e| {
            warn!("Dropping payload that failed to encode: {}", e);
            SseFrame::raw(r#"{"status":"error","message":"Failed to encode research event"}"#)
        })
    }
}

/// Encode events as frames in the order they are received, one chunk per event
pub fn event_stream(
    events: mpsc::Receiver<ResearchEvent>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    ReceiverStream::new(events).map(|event| Ok(SseFrame::from(&event).into_bytes()))
}
