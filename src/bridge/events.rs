//! Events the session bridge publishes to its listeners.

use std::str::FromStr;

use crate::listeners::Listener;
use crate::protocol::Envelope;
use crate::terminal::{KeyEvent, ResizeEvent};

/// Kinds of bridge events a listener can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The `CONNECT` handshake was sent.
    Connect,
    /// An inbound envelope arrived (any kind).
    Message,
    /// The attached terminal produced a keystroke.
    Key,
    /// The transport failed or inbound traffic was malformed.
    Error,
    /// The bridge is tearing down.
    Close,
    /// The attached terminal was resized.
    Resize,
}

impl EventKind {
    /// All event kinds.
    pub const ALL: [Self; 6] = [
        Self::Connect,
        Self::Message,
        Self::Key,
        Self::Error,
        Self::Close,
        Self::Resize,
    ];

    /// Lower-case event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Message => "message",
            Self::Key => "key",
            Self::Error => "error",
            Self::Close => "close",
            Self::Resize => "resize",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown bridge event {s:?}"))
    }
}

/// Why the bridge closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `dispose()` was called.
    Disposed,
    /// The transport reported a close.
    TransportClosed {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// The transport reported an error.
    TransportError,
    /// Inbound traffic could not be decoded.
    MalformedMessage,
}

/// Payload delivered to bridge listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// The `CONNECT` handshake for this session was sent.
    Connect {
        /// Session the handshake was sent for.
        session_id: String,
    },
    /// Raw inbound envelope, before kind-specific handling.
    Message(Envelope),
    /// Keystroke from the attached terminal.
    Key(KeyEvent),
    /// Fatal transport or protocol error description.
    Error(String),
    /// Teardown started.
    Close(CloseReason),
    /// Attached terminal resized.
    Resize(ResizeEvent),
}

impl BridgeEvent {
    /// The kind this event is dispatched under.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connect { .. } => EventKind::Connect,
            Self::Message(_) => EventKind::Message,
            Self::Key(_) => EventKind::Key,
            Self::Error(_) => EventKind::Error,
            Self::Close(_) => EventKind::Close,
            Self::Resize(_) => EventKind::Resize,
        }
    }
}

/// Callback registered on a bridge.
pub type BridgeListener = Listener<BridgeEvent>;
