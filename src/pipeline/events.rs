//! Outbound events and the per-connection emitter

use serde::Serialize;
use tokio::sync::mpsc;

use crate::{Error, Result};

/// Pipeline phase reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting for speech
    Idle,
    /// Speech detected, buffering
    Listening,
    /// Running a turn
    Processing,
}

/// Event sent to the client as a JSON text frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Phase change
    Status { message: Status },
    /// Recognized text of the last utterance
    Transcript {
        text: String,
        /// ASR latency in milliseconds
        latency: f64,
    },
    /// Timing of the turn so far, in milliseconds
    LatencyStats { asr: f64, ttft: f64 },
    /// One streamed unit of the reply
    Token { text: String },
    /// Base64-encoded synthesized speech
    Audio { data: String },
    /// Failure visible to the client
    Error { message: String },
}

impl OutboundEvent {
    /// Shorthand for a status event
    #[must_use]
    pub const fn status(message: Status) -> Self {
        Self::Status { message }
    }

    /// Event tag as it appears on the wire
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Transcript { .. } => "transcript",
            Self::LatencyStats { .. } => "latency_stats",
            Self::Token { .. } => "token",
            Self::Audio { .. } => "audio",
            Self::Error { .. } => "error",
        }
    }
}

/// Ordered sink for a connection's outbound events
///
/// All events of a connection pass through one channel drained by a single
/// writer, so emission order is wire order.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<OutboundEvent>,
}

impl EventEmitter {
    /// Wrap the sending half of a connection's event channel
    #[must_use]
    pub const fn new(tx: mpsc::Sender<OutboundEvent>) -> Self {
        Self { tx }
    }

    /// Create an emitter together with the receiving half
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Queue an event
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] once the writer is gone
    pub async fn emit(&self, event: OutboundEvent) -> Result<()> {
        tracing::trace!(kind = event.kind(), "emit");
        self.tx.send(event).await.map_err(|_| Error::ConnectionClosed)
    }

    /// Queue a status event
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] once the writer is gone
    pub async fn status(&self, status: Status) -> Result<()> {
        self.emit(OutboundEvent::status(status)).await
    }

    /// Queue an error event
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] once the writer is gone
    pub async fn error(&self, message: impl Into<String>) -> Result<()> {
        self.emit(OutboundEvent::Error {
            message: message.into(),
        })
        .await
    }

    /// Whether the writer has gone away
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
