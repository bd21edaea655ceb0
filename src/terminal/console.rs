//! Local console [`Terminal`] over crossterm.
//!
//! The console does no rendering of its own: output chunks from the remote
//! shell go straight to stdout, and the local terminal emulator interprets
//! them. Input is read by [`ConsoleTerminal::run`] on the calling thread.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};
use crossterm::event;

use super::input::{event_to_action, InputAction};
use super::{KeyEvent, KeyHandler, ResizeEvent, ResizeHandler, SurfaceSize, Terminal};
use crate::constants::{DEFAULT_COLUMNS, DEFAULT_ROWS, INPUT_POLL_INTERVAL};
use crate::listeners::{self, listener, SharedRegistry};
use crate::subscription::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ConsoleEventKind {
    Key,
    Resize,
}

#[derive(Debug, Clone)]
enum ConsoleEvent {
    Key(KeyEvent),
    Resize(ResizeEvent),
}

/// Why [`ConsoleTerminal::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The user pressed the detach key.
    Detached,
    /// The shutdown flag was raised.
    Shutdown,
}

/// The process's own console as a bridge terminal.
pub struct ConsoleTerminal {
    listeners: SharedRegistry<ConsoleEventKind, ConsoleEvent>,
    /// Last known (columns, rows).
    size: Mutex<(u16, u16)>,
    mounted: AtomicBool,
}

impl std::fmt::Debug for ConsoleTerminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleTerminal")
            .field("size", &self.cell_size())
            .field("mounted", &self.mounted.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Default for ConsoleTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleTerminal {
    /// Create an unmounted console terminal sized from the current console.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: listeners::new_shared_registry(),
            size: Mutex::new(query_cell_size()),
            mounted: AtomicBool::new(false),
        }
    }

    /// Mark the console as ready to display (raw mode is on).
    ///
    /// Geometry is refreshed here; before this, [`Terminal::surface_size`]
    /// reports `None`.
    pub fn mount(&self) {
        *self.size.lock().expect("Console size mutex poisoned") = query_cell_size();
        self.mounted.store(true, Ordering::SeqCst);
        log::debug!("Console mounted at {:?}", self.cell_size());
    }

    /// Whether [`ConsoleTerminal::mount`] was called.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn cell_size(&self) -> (u16, u16) {
        *self.size.lock().expect("Console size mutex poisoned")
    }

    /// Read console input until detach or until `shutdown` is raised.
    ///
    /// Listener failures are logged and do not stop the loop.
    pub fn run(&self, shutdown: &AtomicBool) -> Result<RunExit> {
        while !shutdown.load(Ordering::SeqCst) {
            if !event::poll(INPUT_POLL_INTERVAL).context("Failed to poll console input")? {
                continue;
            }
            let evt = event::read().context("Failed to read console input")?;
            match event_to_action(&evt) {
                Some(InputAction::Forward(text)) => self.emit(ConsoleEvent::Key(KeyEvent::new(text))),
                Some(InputAction::Resize { columns, rows }) => {
                    *self.size.lock().expect("Console size mutex poisoned") = (columns, rows);
                    self.emit(ConsoleEvent::Resize(ResizeEvent { columns, rows }));
                }
                Some(InputAction::Detach) => {
                    log::info!("Detach requested from console");
                    return Ok(RunExit::Detached);
                }
                None => {}
            }
        }
        Ok(RunExit::Shutdown)
    }

    fn emit(&self, event: ConsoleEvent) {
        let kind = match event {
            ConsoleEvent::Key(_) => ConsoleEventKind::Key,
            ConsoleEvent::Resize(_) => ConsoleEventKind::Resize,
        };
        if let Err(e) = listeners::emit_shared(&self.listeners, kind, &event) {
            log::warn!("Console {:?} listener failed: {:#}", kind, e);
        }
    }
}

impl Terminal for ConsoleTerminal {
    fn on_key(&self, handler: KeyHandler) -> Subscription {
        listeners::subscribe(
            &self.listeners,
            ConsoleEventKind::Key,
            listener(move |event: &ConsoleEvent| match event {
                ConsoleEvent::Key(key) => handler(key),
                ConsoleEvent::Resize(_) => Ok(()),
            }),
        )
    }

    fn on_resize(&self, handler: ResizeHandler) -> Subscription {
        listeners::subscribe(
            &self.listeners,
            ConsoleEventKind::Resize,
            listener(move |event: &ConsoleEvent| match event {
                ConsoleEvent::Resize(resize) => handler(resize),
                ConsoleEvent::Key(_) => Ok(()),
            }),
        )
    }

    fn write(&self, text: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(text.as_bytes())
            .context("Failed to write to console")?;
        stdout.flush().context("Failed to flush console")
    }

    fn columns(&self) -> u16 {
        self.cell_size().0
    }

    fn rows(&self) -> u16 {
        self.cell_size().1
    }

    fn surface_size(&self) -> Option<SurfaceSize> {
        if !self.is_mounted() {
            return None;
        }
        // Many terminals do not report pixels; zero means "unknown".
        let size = crossterm::terminal::window_size()
            .map(|ws| SurfaceSize {
                width: u32::from(ws.width),
                height: u32::from(ws.height),
            })
            .unwrap_or_default();
        Some(size)
    }
}

fn query_cell_size() -> (u16, u16) {
    match crossterm::terminal::size() {
        Ok((columns, rows)) if columns > 0 && rows > 0 => (columns, rows),
        Ok(_) | Err(_) => (DEFAULT_COLUMNS, DEFAULT_ROWS),
    }
}
