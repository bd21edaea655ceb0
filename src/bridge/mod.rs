//! Session bridge between a terminal and a remote shell transport.
//!
//! The bridge owns one transport and, once attached, one terminal. It turns
//! keystrokes into `MESSAGE` envelopes, writes inbound `MESSAGE` text into the
//! terminal, reports resizes as `RESIZE` envelopes, and sends exactly one
//! `CONNECT` handshake per instance.
//!
//! # Lifecycle
//!
//! ```text
//!              connect_immediately
//!   new() ───────────────────────────► Handshaking ──transport open──► Active
//!     │                                    ▲                             │
//!     └──► AwaitingAttach ──attach()───────┘                             │
//!                                                                        ▼
//!            dispose() / transport close / transport error ──────►  Closed
//! ```
//!
//! Two independent guards decide when `CONNECT` goes out: the handshake is
//! *triggered* by `connect_immediately` or by the first `attach`, and it is
//! *sent* as soon as the transport is open. If the transport is not open yet,
//! a one-shot open observer is stored with the bridge's other subscriptions,
//! so disposal cancels it.
//!
//! # Locking
//!
//! Bridge state sits behind one mutex that is never held while calling the
//! transport, the terminal, or a listener. Any of them may call back into the
//! bridge, including `dispose()`. Collaborator callbacks hold a weak handle,
//! so a dropped bridge is never kept alive by its transport or terminal.
//!
//! # Teardown
//!
//! Runs once. `close` listeners fire first and can still inspect the bridge,
//! then the listener registry is cleared, the transport is closed unless it is
//! already closing, and every held subscription is revoked.

pub mod events;

use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};

use anyhow::Result;
use serde::Serialize;

use crate::error::BridgeError;
use crate::listeners::{self, listener, Listener, ListenerRegistry};
use crate::protocol::{self, ConnectBody, Header, MessageBody, MessageKind, ResizeBody};
use crate::subscription::{Subscription, Subscriptions};
use crate::terminal::{sample_geometry, KeyEvent, ResizeEvent, Terminal};
use crate::transport::{ReadyState, Transport, TransportEvent, TransportEventKind};

pub use events::{BridgeEvent, BridgeListener, CloseReason, EventKind};

/// Header map shared between the owning application and the bridge.
///
/// Read at send time, so edits show up on the next envelope.
pub type SharedHeader = Arc<RwLock<Header>>;

/// Options for [`SessionBridge::new`].
pub struct BridgeOptions {
    /// Remote session to join. Immutable for the bridge's life.
    pub session_id: String,
    /// Initial header map forwarded on every envelope.
    pub header: Header,
    /// Start the handshake at construction instead of at `attach`.
    pub connect_immediately: bool,
    /// Listeners registered before anything else happens.
    pub listeners: Vec<(EventKind, BridgeListener)>,
}

impl BridgeOptions {
    /// Options for `session_id` with an empty header, waiting for attach.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            header: Header::new(),
            connect_immediately: false,
            listeners: Vec::new(),
        }
    }

    /// Set the initial header map.
    pub fn header(mut self, header: Header) -> Self {
        self.header = header;
        self
    }

    /// Start the handshake at construction.
    pub fn connect_immediately(mut self, connect_immediately: bool) -> Self {
        self.connect_immediately = connect_immediately;
        self
    }

    /// Register a listener up front.
    pub fn listener(mut self, kind: EventKind, listener: BridgeListener) -> Self {
        self.listeners.push((kind, listener));
        self
    }
}

impl std::fmt::Debug for BridgeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeOptions")
            .field("session_id", &self.session_id)
            .field("header", &self.header)
            .field("connect_immediately", &self.connect_immediately)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Which path is building the `CONNECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectPath {
    /// `connect()` on an open transport. A second build is a lifecycle error.
    Direct,
    /// The transport opened. Losing the race to another path is fine.
    OnOpen,
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// No terminal yet, no handshake pending.
    AwaitingAttach,
    /// Handshake triggered, waiting for the transport to open.
    Handshaking,
    /// Terminal attached and `CONNECT` sent.
    Active,
    /// Torn down. Terminal.
    Closed,
}

struct BridgeInner {
    transport: Arc<dyn Transport>,
    session_id: String,
    header: SharedHeader,
    terminal: Option<Arc<dyn Terminal>>,
    /// Set by `connect()`; the trigger guard.
    handshake_requested: bool,
    /// Set the moment a `CONNECT` build starts; at most one per bridge.
    connect_sent: bool,
    closed: bool,
    /// One-shot open observer while waiting for readiness.
    pending_open: Option<Subscription>,
    subscriptions: Subscriptions,
    listeners: ListenerRegistry<EventKind, BridgeEvent>,
}

impl BridgeInner {
    fn state(&self) -> BridgeState {
        if self.closed {
            BridgeState::Closed
        } else if self.handshake_requested && !self.connect_sent {
            BridgeState::Handshaking
        } else if self.terminal.is_none() {
            BridgeState::AwaitingAttach
        } else {
            BridgeState::Active
        }
    }
}

/// Bridge between one terminal and one remote shell transport.
///
/// Cheap to clone; clones share the same session. A listener that needs to
/// call back into the bridge should capture a [`WeakSessionBridge`].
#[derive(Clone)]
pub struct SessionBridge {
    inner: Arc<Mutex<BridgeInner>>,
}

/// Non-owning handle to a [`SessionBridge`].
#[derive(Debug, Clone)]
pub struct WeakSessionBridge {
    inner: Weak<Mutex<BridgeInner>>,
}

impl WeakSessionBridge {
    /// Get the bridge back if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<SessionBridge> {
        self.inner.upgrade().map(|inner| SessionBridge { inner })
    }
}

impl std::fmt::Debug for SessionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SessionBridge")
            .field("session_id", &inner.session_id)
            .field("state", &inner.state())
            .field("subscriptions", &inner.subscriptions.len())
            .field("listeners", &inner.listeners)
            .finish()
    }
}

impl SessionBridge {
    /// Create a bridge over `transport`.
    ///
    /// With `connect_immediately` the handshake starts here and `CONNECT` is
    /// sent without geometry if the transport is already open.
    pub fn new(transport: Arc<dyn Transport>, options: BridgeOptions) -> Result<Self> {
        let BridgeOptions {
            session_id,
            header,
            connect_immediately,
            listeners: initial_listeners,
        } = options;

        let mut listeners = ListenerRegistry::new();
        for (kind, listener) in initial_listeners {
            listeners.on(kind, listener);
        }

        log::debug!(
            "Creating session bridge for session {} (connect_immediately={})",
            session_id,
            connect_immediately
        );

        let bridge = Self {
            inner: Arc::new(Mutex::new(BridgeInner {
                transport,
                session_id,
                header: Arc::new(RwLock::new(header)),
                terminal: None,
                handshake_requested: false,
                connect_sent: false,
                closed: false,
                pending_open: None,
                subscriptions: Subscriptions::new(),
                listeners,
            })),
        };

        if connect_immediately {
            bridge.connect()?;
        }

        Ok(bridge)
    }

    fn lock(&self) -> MutexGuard<'_, BridgeInner> {
        self.inner.lock().expect("Session bridge mutex poisoned")
    }

    /// Non-owning handle for callbacks.
    #[must_use]
    pub fn downgrade(&self) -> WeakSessionBridge {
        WeakSessionBridge {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.lock().state()
    }

    /// Session identifier given at construction.
    #[must_use]
    pub fn session_id(&self) -> String {
        self.lock().session_id.clone()
    }

    /// Shared handle to the header map.
    #[must_use]
    pub fn header(&self) -> SharedHeader {
        Arc::clone(&self.lock().header)
    }

    /// Replace the header map used by subsequent sends.
    pub fn set_header(&self, header: Header) {
        let shared = self.header();
        *shared.write().expect("Header lock poisoned") = header;
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Whether a terminal is currently bound.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.lock().terminal.is_some()
    }

    /// Number of collaborator subscriptions the bridge holds, including a
    /// pending open observer.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        let inner = self.lock();
        inner.subscriptions.len() + usize::from(inner.pending_open.is_some())
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Register `listener` for `kind`.
    pub fn add_listener(&self, kind: EventKind, listener: BridgeListener) {
        self.lock().listeners.on(kind, listener);
    }

    /// Remove every registration of `listener` for `kind`.
    pub fn remove_listener(&self, kind: EventKind, listener: &BridgeListener) {
        self.lock().listeners.off(kind, listener);
    }

    /// Remove all listeners.
    pub fn remove_all_listeners(&self) {
        self.lock().listeners.clear();
    }

    /// Emit to a snapshot of the listeners, outside the lock.
    fn emit(&self, event: &BridgeEvent) -> Result<usize> {
        let snapshot = self.lock().listeners.listeners(event.kind());
        listeners::dispatch(&snapshot, event)
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    /// Trigger the `CONNECT` handshake.
    ///
    /// Sends synchronously when the transport is open, otherwise waits for
    /// its open event. Calling it again, or after teardown, does nothing.
    pub fn connect(&self) -> Result<()> {
        let transport = {
            let mut inner = self.lock();
            if inner.closed {
                log::debug!("Ignoring connect() on a closed bridge");
                return Ok(());
            }
            if inner.handshake_requested {
                log::debug!("Handshake already triggered for {}", inner.session_id);
                return Ok(());
            }
            inner.handshake_requested = true;
            Arc::clone(&inner.transport)
        };

        if transport.ready_state() == ReadyState::Open {
            return self.send_connect(ConnectPath::Direct);
        }

        log::debug!("Transport not open yet, deferring CONNECT");
        let observer = transport.subscribe(
            TransportEventKind::Open,
            bridge_listener(
                &self.downgrade(),
                |bridge: &SessionBridge, _: &TransportEvent| bridge.handle_transport_open(),
            ),
        );
        {
            let mut inner = self.lock();
            if inner.closed {
                drop(inner);
                drop(observer);
                return Ok(());
            }
            inner.pending_open = Some(observer);
        }

        // The transport may have opened between the check and the subscribe.
        if transport.ready_state() == ReadyState::Open {
            self.handle_transport_open()?;
        }
        Ok(())
    }

    /// The transport became ready: fire the deferred `CONNECT` once.
    ///
    /// Reached from the open observer and from the readiness re-check in
    /// `connect`; whichever claims the handshake first sends it.
    fn handle_transport_open(&self) -> Result<()> {
        let observer = {
            let mut inner = self.lock();
            if inner.closed {
                return Ok(());
            }
            inner.pending_open.take()
        };
        // One-shot: revoke the observer before doing anything else.
        drop(observer);
        self.send_connect(ConnectPath::OnOpen)
    }

    fn send_connect(&self, path: ConnectPath) -> Result<()> {
        let (transport, header, terminal, session_id) = {
            let mut inner = self.lock();
            if inner.closed || !inner.handshake_requested {
                return Ok(());
            }
            if inner.connect_sent {
                return match path {
                    ConnectPath::OnOpen => Ok(()),
                    ConnectPath::Direct => {
                        Err(BridgeError::transition("CONNECT already sent for this bridge").into())
                    }
                };
            }
            // Claimed under the same lock that checked it.
            inner.connect_sent = true;
            (
                Arc::clone(&inner.transport),
                Arc::clone(&inner.header),
                inner.terminal.clone(),
                inner.session_id.clone(),
            )
        };

        let size = match terminal
            .as_ref()
            .map(|terminal| sample_geometry(terminal.as_ref()))
            .transpose()
        {
            Ok(size) => size,
            Err(e) => {
                let mut inner = self.lock();
                inner.connect_sent = false;
                inner.handshake_requested = false;
                return Err(e.into());
            }
        };

        log::info!("Sending CONNECT for session {}", session_id);
        send_envelope(
            transport.as_ref(),
            &header,
            MessageKind::Connect,
            &ConnectBody {
                session_id: session_id.clone(),
                size,
            },
        )?;

        self.emit(&BridgeEvent::Connect { session_id })?;
        Ok(())
    }

    // =========================================================================
    // Attach
    // =========================================================================

    /// Bind `terminal`, subscribe to its events and to the transport's, and
    /// trigger the handshake if nothing triggered it yet.
    pub fn attach(&self, terminal: Arc<dyn Terminal>) -> Result<()> {
        let (transport, trigger_handshake) = {
            let mut inner = self.lock();
            if inner.closed {
                return Err(BridgeError::transition("attach on a closed bridge").into());
            }
            if inner.terminal.is_some() {
                return Err(BridgeError::transition("a terminal is already attached").into());
            }
            inner.terminal = Some(Arc::clone(&terminal));
            (Arc::clone(&inner.transport), !inner.handshake_requested)
        };

        let weak = self.downgrade();
        let mut held = vec![
            terminal.on_key(bridge_listener(&weak, Self::handle_key)),
            terminal.on_resize(bridge_listener(&weak, Self::handle_resize)),
        ];
        for kind in [
            TransportEventKind::Message,
            TransportEventKind::Error,
            TransportEventKind::Close,
        ] {
            held.push(transport.subscribe(kind, bridge_listener(&weak, Self::handle_transport_event)));
        }

        {
            let mut inner = self.lock();
            for subscription in held {
                inner.subscriptions.push(subscription);
            }
            log::debug!(
                "Terminal attached to session {} ({} subscriptions)",
                inner.session_id,
                inner.subscriptions.len()
            );
        }

        if trigger_handshake {
            self.connect()?;
        }
        Ok(())
    }

    // =========================================================================
    // Event entry points
    // =========================================================================

    /// Keystroke from the terminal.
    ///
    /// Dropped, not queued, while the transport is not open.
    pub fn handle_key(&self, event: &KeyEvent) -> Result<()> {
        let (transport, header) = {
            let inner = self.lock();
            if inner.closed {
                return Ok(());
            }
            (Arc::clone(&inner.transport), Arc::clone(&inner.header))
        };

        self.emit(&BridgeEvent::Key(event.clone()))?;
        if self.is_closed() {
            return Ok(());
        }

        if transport.ready_state() != ReadyState::Open {
            log::trace!("Transport not open, dropping keystroke");
            return Ok(());
        }

        send_envelope(
            transport.as_ref(),
            &header,
            MessageKind::Message,
            &MessageBody {
                text: event.key.clone(),
            },
        )
    }

    /// Terminal resize.
    ///
    /// Fails with `InvalidTransition` when no terminal is attached. Before
    /// the handshake the resize is folded into the pending `CONNECT`, which
    /// samples geometry when it is built.
    pub fn handle_resize(&self, event: &ResizeEvent) -> Result<()> {
        let (transport, header, terminal, connect_sent) = {
            let inner = self.lock();
            if inner.closed {
                return Ok(());
            }
            let Some(terminal) = inner.terminal.clone() else {
                return Err(BridgeError::transition("resize with no terminal attached").into());
            };
            (
                Arc::clone(&inner.transport),
                Arc::clone(&inner.header),
                terminal,
                inner.connect_sent,
            )
        };

        self.emit(&BridgeEvent::Resize(*event))?;
        if self.is_closed() {
            return Ok(());
        }

        if !connect_sent {
            log::debug!("Resize before handshake, CONNECT will carry the new size");
            return Ok(());
        }
        if transport.ready_state() != ReadyState::Open {
            log::warn!("Transport not open, dropping resize to {}x{}", event.columns, event.rows);
            return Ok(());
        }

        let size = sample_geometry(terminal.as_ref())?;
        send_envelope(
            transport.as_ref(),
            &header,
            MessageKind::Resize,
            &ResizeBody { size: Some(size) },
        )
    }

    /// Inbound transport text.
    ///
    /// Every decoded envelope reaches `message` listeners first. `MESSAGE`
    /// text is then written to the terminal; `CONNECT` acknowledgements and
    /// anything else are ignored. Undecodable input is fatal.
    pub fn handle_inbound(&self, text: &str) -> Result<()> {
        let terminal = {
            let inner = self.lock();
            if inner.closed {
                return Ok(());
            }
            inner.terminal.clone()
        };

        let envelope = match protocol::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => return self.fail_malformed(&e),
        };

        self.emit(&BridgeEvent::Message(envelope.clone()))?;
        // A listener may have disposed the bridge.
        if self.is_closed() {
            return Ok(());
        }

        match envelope.kind {
            MessageKind::Message => {
                let body: MessageBody = match envelope.body() {
                    Ok(body) => body,
                    Err(e) => return self.fail_malformed(&e),
                };
                match terminal {
                    Some(terminal) => terminal.write(&body.text)?,
                    None => log::debug!("No terminal attached, dropping {} bytes of output", body.text.len()),
                }
            }
            MessageKind::Connect => log::debug!("Server acknowledged CONNECT"),
            MessageKind::Resize => log::debug!("Ignoring inbound RESIZE"),
        }
        Ok(())
    }

    /// Transport error: notify `error` listeners, then tear down.
    pub fn handle_transport_error(&self, message: &str) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        log::error!("Transport error: {}", message);
        let notified = self.emit(&BridgeEvent::Error(message.to_string()));
        self.teardown(CloseReason::TransportError)?;
        notified.map(drop)
    }

    /// Transport closed: tear down.
    pub fn handle_transport_close(&self, code: u16, reason: &str) -> Result<()> {
        log::info!("Transport closed (code {}): {}", code, reason);
        self.teardown(CloseReason::TransportClosed {
            code,
            reason: reason.to_string(),
        })
    }

    fn handle_transport_event(&self, event: &TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Open => self.handle_transport_open(),
            TransportEvent::Message(text) => self.handle_inbound(text),
            TransportEvent::Error(message) => self.handle_transport_error(message),
            TransportEvent::Close { code, reason } => self.handle_transport_close(*code, reason),
        }
    }

    fn fail_malformed(&self, error: &BridgeError) -> Result<()> {
        log::error!("Closing session on bad inbound traffic: {}", error);
        let notified = self.emit(&BridgeEvent::Error(error.to_string()));
        self.teardown(CloseReason::MalformedMessage)?;
        notified.map(drop)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Tear the bridge down. Safe to call any number of times.
    pub fn dispose(&self) -> Result<()> {
        self.teardown(CloseReason::Disposed)
    }

    fn teardown(&self, reason: CloseReason) -> Result<()> {
        let close_listeners = {
            let mut inner = self.lock();
            if inner.closed {
                return Ok(());
            }
            inner.closed = true;
            inner.listeners.listeners(EventKind::Close)
        };

        log::debug!("Tearing down session bridge: {:?}", reason);
        // Terminal binding and session id are still readable here.
        let notified = listeners::dispatch(&close_listeners, &BridgeEvent::Close(reason));

        let (transport, mut subscriptions, observer, terminal) = {
            let mut inner = self.lock();
            inner.listeners.clear();
            (
                Arc::clone(&inner.transport),
                inner.subscriptions.take(),
                inner.pending_open.take(),
                inner.terminal.take(),
            )
        };

        if !matches!(
            transport.ready_state(),
            ReadyState::Closing | ReadyState::Closed
        ) {
            transport.close();
        }
        drop(observer);
        subscriptions.revoke_all();
        drop(terminal);

        notified.map(drop)
    }
}

/// Wrap a bridge method as a collaborator callback holding a weak handle.
fn bridge_listener<E: 'static>(
    weak: &WeakSessionBridge,
    handler: fn(&SessionBridge, &E) -> Result<()>,
) -> Listener<E> {
    let weak = weak.clone();
    listener(move |event: &E| match weak.upgrade() {
        Some(bridge) => handler(&bridge, event),
        None => Ok(()),
    })
}

/// Encode with the header as it is right now and hand off to the transport.
///
/// Send failures are logged, not returned: sends are fire-and-forget.
fn send_envelope<B: Serialize>(
    transport: &dyn Transport,
    header: &SharedHeader,
    kind: MessageKind,
    body: &B,
) -> Result<()> {
    let text = {
        let header = header.read().expect("Header lock poisoned");
        protocol::encode(kind, body, &header)?
    };
    if let Err(e) = transport.send(&text) {
        log::warn!("Failed to send {} envelope: {:#}", kind, e);
    }
    Ok(())
}
