//! Shellbridge - connect an interactive terminal to a remote shell session.
//!
//! The crate bridges a terminal front-end and a message-oriented transport
//! that speaks a small JSON envelope protocol (`CONNECT`, `MESSAGE`,
//! `RESIZE`). Keystrokes go out as `MESSAGE` envelopes, remote output comes
//! back the same way, and geometry changes are reported with `RESIZE`.
//!
//! # Architecture
//!
//! ```text
//!   Terminal ──key/resize──► SessionBridge ──encode──► Transport
//!       ▲                        │  ▲                     │
//!       └──────write─────────────┘  └──────decode─────────┘
//! ```
//!
//! - **SessionBridge** - Lifecycle state machine and glue
//! - **Terminal** - Front-end seam (console implementation included)
//! - **Transport** - Duplex text seam (WebSocket implementation included)
//!
//! # Modules
//!
//! - [`bridge`] - The session bridge and its events
//! - [`protocol`] - Envelope types and the JSON codec
//! - [`listeners`] - Listener registry shared by the bridge and collaborators
//! - [`subscription`] - Revocation handles
//! - [`terminal`] - Terminal trait and console terminal
//! - [`transport`] - Transport trait and WebSocket transport
//! - [`config`] - Configuration loading/saving

pub mod bridge;
pub mod config;
pub mod constants;
pub mod error;
pub mod listeners;
pub mod protocol;
pub mod subscription;
pub mod terminal;
pub mod transport;

// Re-export commonly used types
pub use bridge::{BridgeEvent, BridgeOptions, BridgeState, CloseReason, EventKind, SessionBridge};
pub use config::Config;
pub use error::BridgeError;
pub use protocol::{Envelope, Header, MessageKind, TerminalGeometry};
pub use subscription::Subscription;
pub use terminal::{ConsoleTerminal, Terminal};
pub use transport::{ReadyState, Transport, WebSocketTransport};
