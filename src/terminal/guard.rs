//! Raw-mode guard.
//!
//! Keeps the local console in raw mode for the life of the guard and puts it
//! back on drop, including during a panic unwind.

use anyhow::{Context, Result};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};

/// Console raw mode, restored on drop.
#[derive(Debug)]
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    /// Switch the console to raw mode with bracketed paste.
    pub fn enable() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let guard = Self { _private: () };
        execute!(std::io::stdout(), EnableBracketedPaste)
            .context("Failed to enable bracketed paste")?;
        Ok(guard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        restore_console();
    }
}

/// Best-effort console restore. Also called from the panic hook.
pub fn restore_console() {
    let _ = execute!(std::io::stdout(), DisableBracketedPaste);
    let _ = disable_raw_mode();
}
