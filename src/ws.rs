//! Shared WebSocket plumbing.
//!
//! Thin wrapper around `tokio-tungstenite` providing type-isolated
//! reader/writer halves. The rest of the crate talks to the socket through
//! [`WsWriter`] and [`WsReader`] only, never through `tungstenite` types.
//!
//! [`connect`] handles URL→request building and TLS negotiation and returns
//! a ([`WsWriter`], [`WsReader`]) pair ready for use in `tokio::select!`
//! loops.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

/// Concrete WebSocket stream type.
type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Received WebSocket message.
#[derive(Debug)]
pub enum WsMessage {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
    /// Ping frame with payload.
    Ping(Vec<u8>),
    /// Pong frame with payload.
    Pong(Vec<u8>),
    /// Close frame with status code and reason.
    Close {
        /// WebSocket close code (1000 = normal, 1005 = no code).
        code: u16,
        /// Human-readable close reason.
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
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails (connection closed, I/O error).
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Text(text.to_string()))
            .await
            .context("WebSocket send_text failed")
    }

    /// Send a close frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
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
    /// Receive the next message, returning `None` when the stream ends.
    ///
    /// Raw `Frame` variants are skipped internally.
    pub async fn recv(&mut self) -> Option<Result<WsMessage>> {
        loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return Some(Ok(WsMessage::Text(text.to_string())));
                }
                Some(Ok(tungstenite::Message::Binary(data))) => {
                    return Some(Ok(WsMessage::Binary(data.to_vec())));
                }
                Some(Ok(tungstenite::Message::Ping(data))) => {
                    return Some(Ok(WsMessage::Ping(data.to_vec())));
                }
                Some(Ok(tungstenite::Message::Pong(data))) => {
                    return Some(Ok(WsMessage::Pong(data.to_vec())));
                }
                Some(Ok(tungstenite::Message::Close(close_frame))) => {
                    let (code, reason) = close_frame
                        .map(|cf| (cf.code.into(), cf.reason.to_string()))
                        .unwrap_or((1005, String::new()));
                    return Some(Ok(WsMessage::Close { code, reason }));
                }
                Some(Ok(tungstenite::Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    return Some(Err(anyhow::anyhow!("WebSocket read error: {e}")));
                }
                None => return None,
            }
        }
    }
}

/// Connect to a WebSocket URL and perform the handshake.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the handshake fails.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader)> {
    use tungstenite::client::IntoClientRequest;

    let request = url
        .into_client_request()
        .with_context(|| format!("invalid WebSocket URL: {url}"))?;

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .context("WebSocket connect failed")?;

    let (sink, stream) = ws_stream.split();

    Ok((WsWriter { sink }, WsReader { stream }))
}

/// Convert an HTTP(S) URL to WS(S) scheme.
///
/// Passes `ws://` and `wss://` through unchanged. Hosts are often
/// configured with the address shown in their settings page, which may
/// carry an `http://` prefix.
#[must_use]
pub fn http_to_ws_scheme(url: &str) -> String {
    if url.starts_with("wss://") || url.starts_with("ws://") {
        url.to_string()
    } else {
        url.replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1)
    }
}
