// Shared test doubles for the bridge integration tests.
//
// MockTransport and MockTerminal record everything the bridge does to them
// and let tests fire collaborator events by hand.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use shellbridge::listeners::{self, listener, Listener, SharedRegistry};
use shellbridge::protocol::{self, Envelope, MessageKind};
use shellbridge::subscription::Subscription;
use shellbridge::terminal::{KeyEvent, KeyHandler, ResizeEvent, ResizeHandler, SurfaceSize, Terminal};
use shellbridge::transport::{ReadyState, Transport, TransportEvent, TransportEventKind, TransportHandler};

// =============================================================================
// Transport
// =============================================================================

pub struct MockTransport {
    state: Mutex<ReadyState>,
    sent: Mutex<Vec<String>>,
    close_calls: AtomicUsize,
    listeners: SharedRegistry<TransportEventKind, TransportEvent>,
}

impl MockTransport {
    pub fn new(state: ReadyState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            sent: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
            listeners: listeners::new_shared_registry(),
        })
    }

    pub fn open() -> Arc<Self> {
        Self::new(ReadyState::Open)
    }

    pub fn pending() -> Arc<Self> {
        Self::new(ReadyState::Pending)
    }

    pub fn set_state(&self, state: ReadyState) {
        *self.state.lock().unwrap() = state;
    }

    /// Move to `Open` and emit the open event.
    pub fn become_open(&self) -> Result<usize> {
        self.set_state(ReadyState::Open);
        self.fire(TransportEvent::Open)
    }

    pub fn fire(&self, event: TransportEvent) -> Result<usize> {
        listeners::emit_shared(&self.listeners, event.kind(), &event)
    }

    pub fn fire_message(&self, text: &str) -> Result<usize> {
        self.fire(TransportEvent::Message(text.to_string()))
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent()
            .iter()
            .map(|text| protocol::decode(text).unwrap())
            .collect()
    }

    pub fn sent_of_kind(&self, kind: MessageKind) -> Vec<Envelope> {
        self.sent_envelopes()
            .into_iter()
            .filter(|envelope| envelope.kind == kind)
            .collect()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self, kind: TransportEventKind) -> usize {
        self.listeners.lock().unwrap().listeners(kind).len()
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.lock().unwrap().listener_count()
    }
}

impl Transport for MockTransport {
    fn ready_state(&self) -> ReadyState {
        *self.state.lock().unwrap()
    }

    fn send(&self, text: &str) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            anyhow::bail!("mock transport not open");
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.set_state(ReadyState::Closed);
    }

    fn subscribe(&self, kind: TransportEventKind, handler: TransportHandler) -> Subscription {
        listeners::subscribe(&self.listeners, kind, handler)
    }
}

// =============================================================================
// Terminal
// =============================================================================

pub struct MockTerminal {
    keys: SharedRegistry<&'static str, KeyEvent>,
    resizes: SharedRegistry<&'static str, ResizeEvent>,
    writes: Mutex<Vec<String>>,
    cells: Mutex<(u16, u16)>,
    surface: Mutex<Option<SurfaceSize>>,
}

impl MockTerminal {
    /// A mounted terminal with the given cell and pixel size.
    pub fn mounted(columns: u16, rows: u16, width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            keys: listeners::new_shared_registry(),
            resizes: listeners::new_shared_registry(),
            writes: Mutex::new(Vec::new()),
            cells: Mutex::new((columns, rows)),
            surface: Mutex::new(Some(SurfaceSize { width, height })),
        })
    }

    /// 80x24 cells on a 640x384 surface.
    pub fn standard() -> Arc<Self> {
        Self::mounted(80, 24, 640, 384)
    }

    pub fn unmounted() -> Arc<Self> {
        let terminal = Self::standard();
        *terminal.surface.lock().unwrap() = None;
        terminal
    }

    pub fn press(&self, key: &str) -> Result<usize> {
        listeners::emit_shared(&self.keys, "key", &KeyEvent::new(key))
    }

    /// Change the geometry, then emit the resize event.
    pub fn resize(&self, columns: u16, rows: u16, width: u32, height: u32) -> Result<usize> {
        *self.cells.lock().unwrap() = (columns, rows);
        *self.surface.lock().unwrap() = Some(SurfaceSize { width, height });
        listeners::emit_shared(&self.resizes, "resize", &ResizeEvent { columns, rows })
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn total_listeners(&self) -> usize {
        self.keys.lock().unwrap().listener_count() + self.resizes.lock().unwrap().listener_count()
    }
}

impl Terminal for MockTerminal {
    fn on_key(&self, handler: KeyHandler) -> Subscription {
        listeners::subscribe(&self.keys, "key", handler)
    }

    fn on_resize(&self, handler: ResizeHandler) -> Subscription {
        listeners::subscribe(&self.resizes, "resize", handler)
    }

    fn write(&self, text: &str) -> Result<()> {
        self.writes.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn columns(&self) -> u16 {
        self.cells.lock().unwrap().0
    }

    fn rows(&self) -> u16 {
        self.cells.lock().unwrap().1
    }

    fn surface_size(&self) -> Option<SurfaceSize> {
        *self.surface.lock().unwrap()
    }
}

// =============================================================================
// Listener helpers
// =============================================================================

/// A listener that records every payload it sees.
pub fn recorder<E: Clone + Send + 'static>() -> (Listener<E>, Arc<Mutex<Vec<E>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback = listener(move |event: &E| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    });
    (callback, seen)
}
