//! WebSocket [`Transport`] running on its own thread.
//!
//! Each connection gets a dedicated OS thread with a single-threaded tokio
//! runtime. The thread `select!`s between frames from the server and
//! commands from the outgoing channel, and publishes transport events to the
//! shared listener registry. Handlers run on the connection thread.
//!
//! # Lifecycle
//!
//! ```text
//! connect() ──► Pending ──upgrade ok──► Open ──close()──► Closing ──► Closed
//!                  │                     │
//!                  └──error──────────────┴──server close / error──► Closed
//! ```

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use super::ws::{self, WsFrame};
use super::{ReadyState, Transport, TransportEvent, TransportEventKind, TransportHandler};
use crate::constants::{ABNORMAL_CLOSE_CODE, NORMAL_CLOSE_CODE};
use crate::listeners::{self, SharedRegistry};
use crate::subscription::Subscription;

/// Commands from the transport handle to its connection thread.
#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close,
}

/// WebSocket client transport.
pub struct WebSocketTransport {
    url: String,
    state: Arc<Mutex<ReadyState>>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    listeners: SharedRegistry<TransportEventKind, TransportEvent>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.url)
            .field("state", &self.ready_state())
            .finish_non_exhaustive()
    }
}

impl WebSocketTransport {
    /// Start connecting to `url` with extra upgrade-request headers.
    ///
    /// Returns immediately in the `Pending` state; subscribe to
    /// [`TransportEventKind::Open`] or poll [`Transport::ready_state`].
    /// `http(s)://` URLs are rewritten to `ws(s)://`.
    pub fn connect(url: &str, http_headers: &[(String, String)]) -> Result<Arc<Self>> {
        let url = ws::http_to_ws_scheme(url);
        let state = Arc::new(Mutex::new(ReadyState::Pending));
        let listeners = listeners::new_shared_registry();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();

        let connection = Connection {
            url: url.clone(),
            http_headers: http_headers.to_vec(),
            state: Arc::clone(&state),
            listeners: Arc::clone(&listeners),
        };

        let worker = std::thread::Builder::new()
            .name("shellbridge-ws".to_string())
            .spawn(move || connection.run(outgoing_rx))
            .context("Failed to spawn WebSocket thread")?;

        log::info!("Connecting to {}", url);
        Ok(Arc::new(Self {
            url,
            state,
            outgoing,
            listeners,
            worker: Mutex::new(Some(worker)),
        }))
    }

    /// URL actually dialled (after scheme rewriting).
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the connection thread to exit.
    ///
    /// Only returns once the connection reached `Closed`; call [`Transport::close`]
    /// first. Later calls return immediately.
    pub fn join(&self) {
        let handle = self.worker.lock().expect("WebSocket worker mutex poisoned").take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("WebSocket thread panicked");
            }
        }
    }
}

impl Transport for WebSocketTransport {
    fn ready_state(&self) -> ReadyState {
        *self.state.lock().expect("WebSocket state mutex poisoned")
    }

    fn send(&self, text: &str) -> Result<()> {
        let state = self.ready_state();
        if state != ReadyState::Open {
            anyhow::bail!("WebSocket is not open ({state:?})");
        }
        self.outgoing
            .send(Outgoing::Text(text.to_string()))
            .context("WebSocket thread has exited")
    }

    fn close(&self) {
        {
            let mut state = self.state.lock().expect("WebSocket state mutex poisoned");
            match *state {
                ReadyState::Pending | ReadyState::Open => *state = ReadyState::Closing,
                ReadyState::Closing | ReadyState::Closed => return,
            }
        }
        log::debug!("Closing WebSocket to {}", self.url);
        if self.outgoing.send(Outgoing::Close).is_err() {
            log::debug!("WebSocket thread already gone");
        }
    }

    fn subscribe(&self, kind: TransportEventKind, handler: TransportHandler) -> Subscription {
        listeners::subscribe(&self.listeners, kind, handler)
    }
}

/// State moved onto the connection thread.
struct Connection {
    url: String,
    http_headers: Vec<(String, String)>,
    state: Arc<Mutex<ReadyState>>,
    listeners: SharedRegistry<TransportEventKind, TransportEvent>,
}

impl Connection {
    fn run(self, outgoing_rx: mpsc::UnboundedReceiver<Outgoing>) {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                self.fail(&format!("Failed to create tokio runtime: {e}"));
                return;
            }
        };
        rt.block_on(self.pump(outgoing_rx));
        log::debug!("WebSocket thread for {} exiting", self.url);
    }

    async fn pump(&self, mut outgoing_rx: mpsc::UnboundedReceiver<Outgoing>) {
        // close() must not wait for the upgrade to finish or time out.
        let connecting = ws::connect(&self.url, &self.http_headers);
        tokio::pin!(connecting);
        let (mut writer, mut reader) = loop {
            tokio::select! {
                result = &mut connecting => match result {
                    Ok(halves) => break halves,
                    Err(e) => {
                        self.fail(&format!("{e:#}"));
                        return;
                    }
                },
                command = outgoing_rx.recv() => match command {
                    Some(Outgoing::Text(_)) => {
                        log::warn!("Dropping text queued before {} opened", self.url);
                    }
                    Some(Outgoing::Close) | None => {
                        self.finish(NORMAL_CLOSE_CODE, "closed before connecting".to_string());
                        return;
                    }
                },
            }
        };

        let opened = {
            let mut state = self.lock_state();
            if *state == ReadyState::Pending {
                *state = ReadyState::Open;
                true
            } else {
                false
            }
        };
        if opened {
            log::info!("WebSocket connected to {}", self.url);
            self.emit(&TransportEvent::Open);
        }

        loop {
            tokio::select! {
                frame = reader.recv() => match frame {
                    Some(Ok(WsFrame::Text(text))) => {
                        self.emit(&TransportEvent::Message(text));
                    }
                    Some(Ok(WsFrame::Close { code, reason })) => {
                        self.finish(code, reason);
                        return;
                    }
                    Some(Err(e)) => {
                        self.fail(&format!("{e:#}"));
                        return;
                    }
                    None => {
                        self.finish(ABNORMAL_CLOSE_CODE, "stream ended".to_string());
                        return;
                    }
                },
                command = outgoing_rx.recv() => match command {
                    Some(Outgoing::Text(text)) => {
                        if let Err(e) = writer.send_text(&text).await {
                            self.fail(&format!("{e:#}"));
                            return;
                        }
                    }
                    Some(Outgoing::Close) | None => {
                        if let Err(e) = writer.send_close().await {
                            log::debug!("Close frame not delivered: {e:#}");
                        }
                        self.finish(NORMAL_CLOSE_CODE, "client requested close".to_string());
                        return;
                    }
                },
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ReadyState> {
        self.state.lock().expect("WebSocket state mutex poisoned")
    }

    fn emit(&self, event: &TransportEvent) {
        if let Err(e) = listeners::emit_shared(&self.listeners, event.kind(), event) {
            log::warn!("Transport {:?} handler failed: {:#}", event.kind(), e);
        }
    }

    /// Error path: `error` then an abnormal `close`.
    fn fail(&self, message: &str) {
        log::error!("WebSocket {} failed: {}", self.url, message);
        *self.lock_state() = ReadyState::Closed;
        self.emit(&TransportEvent::Error(message.to_string()));
        self.emit(&TransportEvent::Close {
            code: ABNORMAL_CLOSE_CODE,
            reason: message.to_string(),
        });
    }

    fn finish(&self, code: u16, reason: String) {
        log::info!("WebSocket {} closed (code {}): {}", self.url, code, reason);
        *self.lock_state() = ReadyState::Closed;
        self.emit(&TransportEvent::Close { code, reason });
    }
}
