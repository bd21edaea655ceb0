//! Transport collaborator.
//!
//! The bridge needs very little from its transport: a readiness query, a
//! fire-and-forget text send, a close, and four subscribable events. Framing,
//! heartbeats, TLS and reconnects belong to the implementation.
//!
//! - [`Transport`] - The trait the bridge drives
//! - [`websocket`] - WebSocket implementation on a dedicated thread
//! - [`ws`] - `tokio-tungstenite` reader/writer halves used by it

pub mod websocket;
pub mod ws;

use anyhow::Result;

use crate::listeners::Listener;
use crate::subscription::Subscription;

pub use websocket::WebSocketTransport;

/// Readiness of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Connecting; sends are not possible yet.
    Pending,
    /// Connected and ready.
    Open,
    /// Close requested, not finished.
    Closing,
    /// Closed for good.
    Closed,
}

/// Event kinds a transport emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportEventKind {
    /// The transport became ready.
    Open,
    /// A text message arrived.
    Message,
    /// A transport-level error occurred.
    Error,
    /// The transport closed.
    Close,
}

/// An event emitted by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport became ready.
    Open,
    /// A text message arrived.
    Message(String),
    /// A transport-level error occurred.
    Error(String),
    /// The transport closed.
    Close {
        /// Close code (1000 = normal, 1006 = abnormal).
        code: u16,
        /// Human-readable close reason.
        reason: String,
    },
}

impl TransportEvent {
    /// The kind this event is dispatched under.
    #[must_use]
    pub fn kind(&self) -> TransportEventKind {
        match self {
            Self::Open => TransportEventKind::Open,
            Self::Message(_) => TransportEventKind::Message,
            Self::Error(_) => TransportEventKind::Error,
            Self::Close { .. } => TransportEventKind::Close,
        }
    }
}

/// Callback for transport events.
pub type TransportHandler = Listener<TransportEvent>;

/// A message-oriented duplex transport.
///
/// Implementations must not hold internal locks while invoking handlers, so
/// a handler may revoke its own subscription. [`crate::listeners::emit_shared`]
/// does this for them.
pub trait Transport: Send + Sync {
    /// Current readiness.
    fn ready_state(&self) -> ReadyState;

    /// Queue one text message. No delivery acknowledgement.
    fn send(&self, text: &str) -> Result<()>;

    /// Begin closing. Idempotent.
    fn close(&self);

    /// Subscribe to one kind of event.
    fn subscribe(&self, kind: TransportEventKind, handler: TransportHandler) -> Subscription;
}
