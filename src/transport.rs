//! Transport seam between the connection manager and the socket.
//!
//! The connection manager never touches a socket directly. It asks a
//! [`Transport`] to open a connection and receives lifecycle notifications
//! through a [`TransportSink`]. Each opened connection is identified by a
//! generation number so that late notifications from a superseded socket
//! can be recognised as stale.
//!
//! # Threading Model
//!
//! [`WsTransport`] spawns one tokio task per connection. The task reads
//! frames from the WebSocket and pushes [`TransportEvent`]s into the
//! client's event channel. It also listens on an `mpsc` channel for
//! outgoing frames (`send_text` / `close`). Dropping the handle ends the
//! task.

// Rust guideline compliant 2026-02

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;

use crate::connection::ClientEvent;

/// Lifecycle notification from an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Open,
    /// A UTF-8 text frame arrived.
    Message(String),
    /// The connection closed (remotely, locally, or after a failed connect).
    Close {
        /// WebSocket close code (1000 = normal, 1006 = abnormal).
        code: u16,
        /// Human-readable close reason.
        reason: String,
    },
    /// A transport or protocol error occurred. A `Close` normally follows.
    Error(String),
}

/// Where a transport delivers its notifications.
///
/// Tagged with the generation of the connection it was created for.
#[derive(Debug, Clone)]
pub struct TransportSink {
    generation: u64,
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl TransportSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self { generation, tx }
    }

    /// Generation of the connection this sink belongs to.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver a notification to the client's event loop.
    ///
    /// Silently dropped once the client is gone.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send(ClientEvent::Transport {
            generation: self.generation,
            event,
        });
    }
}

/// An open (or opening) connection.
pub trait TransportHandle: Send + Sync {
    /// Queue a text frame for sending.
    fn send_text(&self, text: String) -> Result<()>;

    /// Start a graceful close. A `Close` notification follows.
    fn close(&self);
}

/// Factory for connections.
pub trait Transport: Send + Sync {
    /// Begin connecting to `url`.
    ///
    /// Must not block; progress is reported through `sink`. Failure to
    /// connect is reported as `Error` followed by `Close`.
    fn open(&self, url: &str, sink: TransportSink) -> Box<dyn TransportHandle>;
}

/// Outgoing command from the client to a connection task.
#[derive(Debug)]
enum WsOutgoing {
    /// Send a UTF-8 text frame.
    Text(String),
    /// Initiate a graceful close.
    Close,
}

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[derive(Debug)]
struct WsHandle {
    send_tx: mpsc::UnboundedSender<WsOutgoing>,
}

impl TransportHandle for WsHandle {
    fn send_text(&self, text: String) -> Result<()> {
        self.send_tx
            .send(WsOutgoing::Text(text))
            .map_err(|e| anyhow!("WebSocket connection task has exited: {e}"))
    }

    fn close(&self) {
        let _ = self.send_tx.send(WsOutgoing::Close);
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str, sink: TransportSink) -> Box<dyn TransportHandle> {
        let (send_tx, send_rx) = mpsc::unbounded_channel();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(run_ws_task(url.to_string(), sink, send_rx));
            }
            Err(e) => {
                sink.emit(TransportEvent::Error(format!(
                    "no tokio runtime to drive the connection: {e}"
                )));
                sink.emit(TransportEvent::Close {
                    code: 1006,
                    reason: "no runtime".to_string(),
                });
            }
        }

        Box::new(WsHandle { send_tx })
    }
}

/// Drive a single WebSocket connection until it closes.
///
/// Reads frames and forwards them to `sink`; writes frames received on
/// `send_rx`. Exits when the connection closes, on an unrecoverable error,
/// or when the handle is dropped.
async fn run_ws_task(
    url: String,
    sink: TransportSink,
    mut send_rx: mpsc::UnboundedReceiver<WsOutgoing>,
) {
    let (mut writer, mut reader) = match crate::ws::connect(&url).await {
        Ok(pair) => pair,
        Err(e) => {
            sink.emit(TransportEvent::Error(format!("{e:#}")));
            sink.emit(TransportEvent::Close {
                code: 1006,
                reason: "connect failed".to_string(),
            });
            return;
        }
    };

    sink.emit(TransportEvent::Open);

    loop {
        tokio::select! {
            frame = reader.recv() => {
                match frame {
                    Some(Ok(crate::ws::WsMessage::Text(text))) => {
                        sink.emit(TransportEvent::Message(text));
                    }
                    Some(Ok(crate::ws::WsMessage::Binary(data))) => {
                        match String::from_utf8(data) {
                            Ok(text) => sink.emit(TransportEvent::Message(text)),
                            Err(e) => log::warn!(
                                "[Companion/ws] Dropping non-UTF-8 binary frame: {e}"
                            ),
                        }
                    }
                    Some(Ok(crate::ws::WsMessage::Close { code, reason })) => {
                        sink.emit(TransportEvent::Close { code, reason });
                        return;
                    }
                    Some(Ok(crate::ws::WsMessage::Ping(_) | crate::ws::WsMessage::Pong(_))) => {
                        // Pings are auto-replied by tungstenite
                    }
                    Some(Err(e)) => {
                        sink.emit(TransportEvent::Error(format!("{e:#}")));
                        sink.emit(TransportEvent::Close {
                            code: 1006,
                            reason: "read error".to_string(),
                        });
                        return;
                    }
                    None => {
                        sink.emit(TransportEvent::Close {
                            code: 1006,
                            reason: "stream ended".to_string(),
                        });
                        return;
                    }
                }
            }
            outgoing = send_rx.recv() => {
                match outgoing {
                    Some(WsOutgoing::Text(text)) => {
                        if let Err(e) = writer.send_text(&text).await {
                            sink.emit(TransportEvent::Error(format!("{e:#}")));
                            sink.emit(TransportEvent::Close {
                                code: 1006,
                                reason: "write error".to_string(),
                            });
                            return;
                        }
                    }
                    Some(WsOutgoing::Close) => {
                        let _ = writer.send_close().await;
                        sink.emit(TransportEvent::Close {
                            code: 1000,
                            reason: "client requested close".to_string(),
                        });
                        return;
                    }
                    None => {
                        // Handle dropped; nobody is listening any more.
                        return;
                    }
                }
            }
        }
    }
}
