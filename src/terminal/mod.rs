//! Terminal collaborator.
//!
//! The bridge never renders anything. It consumes a terminal's key and resize
//! streams, writes output chunks into it, and reads its geometry.
//!
//! - [`Terminal`] - The trait a front-end implements
//! - [`console`] - Local console implementation over `crossterm`
//! - [`input`] - Key event → byte sequence conversion
//! - [`guard`] - Raw-mode RAII guard

pub mod console;
pub mod guard;
pub mod input;

use anyhow::Result;

use crate::error::BridgeError;
use crate::listeners::Listener;
use crate::protocol::TerminalGeometry;
use crate::subscription::Subscription;

pub use console::{ConsoleTerminal, RunExit};
pub use guard::{restore_console, RawModeGuard};

/// A keystroke, already translated into the text the remote shell expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Text to forward (e.g. `"a"`, `"\r"`, `"\x1b[A"`).
    pub key: String,
}

impl KeyEvent {
    /// Create a key event from its text.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// The terminal's cell grid changed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeEvent {
    /// New width in cells.
    pub columns: u16,
    /// New height in cells.
    pub rows: u16,
}

/// Pixel size of a mounted rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Callback for key events.
pub type KeyHandler = Listener<KeyEvent>;

/// Callback for resize events.
pub type ResizeHandler = Listener<ResizeEvent>;

/// A terminal front-end the bridge can attach to.
pub trait Terminal: Send + Sync {
    /// Subscribe to keystrokes.
    fn on_key(&self, handler: KeyHandler) -> Subscription;

    /// Subscribe to cell-grid resizes.
    fn on_resize(&self, handler: ResizeHandler) -> Subscription;

    /// Append output to the display.
    fn write(&self, text: &str) -> Result<()>;

    /// Current width in cells.
    fn columns(&self) -> u16;

    /// Current height in cells.
    fn rows(&self) -> u16;

    /// Pixel size of the rendering surface, `None` until it is mounted.
    fn surface_size(&self) -> Option<SurfaceSize>;
}

/// Read the terminal's current geometry.
///
/// Always re-reads; callers must not cache the result across envelopes.
pub fn sample_geometry(terminal: &dyn Terminal) -> Result<TerminalGeometry, BridgeError> {
    let surface = terminal
        .surface_size()
        .ok_or(BridgeError::TerminalNotMounted)?;

    Ok(TerminalGeometry {
        columns: terminal.columns(),
        rows: terminal.rows(),
        pixel_width: surface.width,
        pixel_height: surface.height,
    })
}
