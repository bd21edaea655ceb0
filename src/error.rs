//! Error taxonomy for the session bridge and its wire codec.
//!
//! Only protocol and lifecycle faults get their own variants. Plumbing errors
//! (I/O, configuration, listener failures) travel as `anyhow::Error`.

/// Errors raised by the codec and the session bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Inbound text is not a valid envelope (bad JSON, unknown `type`,
    /// or a body that does not match its kind).
    MalformedMessage(String),
    /// Geometry was requested before the terminal has a rendering surface.
    TerminalNotMounted,
    /// The bridge was driven through a transition its lifecycle forbids.
    InvalidTransition(String),
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedMessage(msg) => write!(f, "Malformed message: {msg}"),
            Self::TerminalNotMounted => write!(f, "Terminal is not mounted"),
            Self::InvalidTransition(msg) => write!(f, "Invalid transition: {msg}"),
        }
    }
}

impl std::error::Error for BridgeError {}

impl BridgeError {
    /// Build a `MalformedMessage` from any displayable cause.
    pub(crate) fn malformed(cause: impl std::fmt::Display) -> Self {
        Self::MalformedMessage(cause.to_string())
    }

    /// Build an `InvalidTransition` with a short description.
    pub(crate) fn transition(what: impl Into<String>) -> Self {
        Self::InvalidTransition(what.into())
    }
}
