//! WebSocket reader/writer halves over `tokio-tungstenite`.
//!
//! [`connect`] builds the upgrade request (extra HTTP headers included),
//! negotiates TLS when the scheme asks for it, and splits the stream so the
//! connection thread can `tokio::select!` over both directions.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

use crate::constants::NO_STATUS_CLOSE_CODE;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// An inbound frame the transport cares about.
///
/// Binary frames are surfaced as lossy UTF-8 text; ping/pong are answered by
/// tungstenite and never surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrame {
    /// A text (or binary-as-text) message.
    Text(String),
    /// The peer closed the connection.
    Close {
        /// Close code (1005 when the peer sent none).
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Write half of a WebSocket connection.
#[derive(Debug)]
pub struct WsWriter {
    sink: futures_util::stream::SplitSink<WsStream, tungstenite::Message>,
}

impl WsWriter {
    /// Send a UTF-8 text frame.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Text(text.to_string()))
            .await
            .context("WebSocket send_text failed")
    }

    /// Send a close frame.
    pub async fn send_close(&mut self) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Close(None))
            .await
            .context("WebSocket send_close failed")
    }
}

/// Read half of a WebSocket connection.
#[derive(Debug)]
pub struct WsReader {
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WsReader {
    /// Next frame, or `None` when the stream ended without a close frame.
    pub async fn recv(&mut self) -> Option<Result<WsFrame>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(anyhow::anyhow!("WebSocket read error: {e}"))),
            };
            match message {
                tungstenite::Message::Text(text) => return Some(Ok(WsFrame::Text(text))),
                tungstenite::Message::Binary(data) => {
                    return Some(Ok(WsFrame::Text(String::from_utf8_lossy(&data).into_owned())));
                }
                tungstenite::Message::Close(frame) => {
                    let (code, reason) = frame
                        .map(|cf| (cf.code.into(), cf.reason.to_string()))
                        .unwrap_or((NO_STATUS_CLOSE_CODE, String::new()));
                    return Some(Ok(WsFrame::Close { code, reason }));
                }
                tungstenite::Message::Ping(_)
                | tungstenite::Message::Pong(_)
                | tungstenite::Message::Frame(_) => {}
            }
        }
    }
}

/// Open a WebSocket connection to `url`, adding `headers` to the upgrade request.
pub async fn connect(url: &str, headers: &[(String, String)]) -> Result<(WsWriter, WsReader)> {
    use tungstenite::client::IntoClientRequest;

    let mut request = url
        .into_client_request()
        .with_context(|| format!("invalid WebSocket URL: {url}"))?;

    for (name, value) in headers {
        let header_name = tungstenite::http::HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name: {name}"))?;
        let header_value = tungstenite::http::HeaderValue::from_str(value)
            .with_context(|| format!("invalid header value for {name}"))?;
        request.headers_mut().insert(header_name, header_value);
    }

    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .with_context(|| format!("WebSocket connect to {url} failed"))?;

    let (sink, stream) = stream.split();
    Ok((WsWriter { sink }, WsReader { stream }))
}

/// Convert an `http(s)://` URL to the matching `ws(s)://` scheme.
///
/// `ws://` and `wss://` pass through unchanged.
#[must_use]
pub fn http_to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}
