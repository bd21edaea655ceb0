//! Wire protocol for the remote shell session.
//!
//! Every transport message carries exactly one JSON envelope:
//!
//! ```text
//! { "type": "<CONNECT|MESSAGE|RESIZE>", "header": { ... }, "body": { ... } }
//! ```
//!
//! # Message Types
//!
//! - `CONNECT` (code 0) - Session handshake, body [`ConnectBody`]
//! - `MESSAGE` (code 1) - Terminal I/O chunk, body [`MessageBody`]
//! - `RESIZE` (code 2) - Terminal geometry change, body [`ResizeBody`]
//!
//! Older peers put the numeric code in `type`. The [`codec`] accepts both
//! forms on decode and always writes the name, so nothing outside this module
//! compares kinds as strings or numbers.

pub mod codec;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use codec::{decode, encode, KindRef};

/// Opaque string map forwarded on every outbound envelope.
///
/// A `BTreeMap` keeps the encoded key order stable.
pub type Header = BTreeMap<String, String>;

/// Closed set of envelope kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Session handshake (client → server) or acknowledgement (server → client).
    Connect,
    /// Terminal I/O: a keystroke outbound, an output chunk inbound.
    Message,
    /// Terminal geometry change.
    Resize,
}

impl MessageKind {
    /// All kinds, in numeric-code order.
    pub const ALL: [Self; 3] = [Self::Connect, Self::Message, Self::Resize];

    /// Canonical upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Message => "MESSAGE",
            Self::Resize => "RESIZE",
        }
    }

    /// Stable numeric code used by older protocol revisions.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Connect => 0,
            Self::Message => 1,
            Self::Resize => 2,
        }
    }

    /// Look up a kind by its exact wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Look up a kind by its numeric code.
    #[must_use]
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| u64::from(kind.code()) == code)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal size in cells and pixels, sampled when an envelope is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalGeometry {
    /// Width in character cells.
    pub columns: u16,
    /// Height in character cells.
    pub rows: u16,
    /// Width of the rendering surface in pixels.
    pub pixel_width: u32,
    /// Height of the rendering surface in pixels.
    pub pixel_height: u32,
}

/// Body of a `CONNECT` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectBody {
    /// Remote session to join.
    pub session_id: String,
    /// Geometry at handshake time; absent when no terminal is attached yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<TerminalGeometry>,
}

/// Body of a `RESIZE` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeBody {
    /// New geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<TerminalGeometry>,
}

/// Body of a `MESSAGE` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Keystroke text (outbound) or output chunk (inbound).
    pub text: String,
}

/// A decoded envelope. `kind` is always canonical, whatever the wire used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Envelope kind (`type` on the wire).
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Caller-supplied header map.
    #[serde(default)]
    pub header: Header,
    /// Kind-specific payload, kept untyped until [`Envelope::body`] is called.
    #[serde(default)]
    pub body: serde_json::Value,
}
