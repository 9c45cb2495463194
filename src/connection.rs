//! Self-healing connection to the companion host.
//!
//! [`ConnectionManager`] owns the transport handle and the connection state
//! machine, decodes inbound frames and forwards them to the [`EventBus`].
//!
//! # State machine
//!
//! ```text
//!   Disconnected ──connect──► Connecting ──open──► Open
//!        ▲                                           │
//!        └──────────────── close ◄───────────────────┘
//!                    (reconnect after delay)
//! ```
//!
//! `Closing` is entered only while a `connect` to a new target supersedes
//! an existing transport.
//!
//! # Event loop
//!
//! Transport tasks and reconnect timers never mutate state themselves.
//! They push [`ClientEvent`]s into one unbounded channel, and the loop
//! ([`ConnectionManager::run`] or [`ConnectionManager::process_pending`])
//! applies them in arrival order. Locks are released before any listener
//! runs, so listeners may call `connect` or `send`.
//!
//! # Staleness
//!
//! Every transport is tagged with a generation number. Notifications from
//! an older generation are ignored, and a due reconnect only fires if the
//! target is unchanged and nothing has reconnected in the meantime.

// Rust guideline compliant 2026-02

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::events::EventBus;
use crate::protocol::{decode_frame, Packet};
use crate::transport::{Transport, TransportEvent, TransportHandle, TransportSink};

/// Event emitted once the transport is open.
pub const EVENT_CONNECTED: &str = "connected";
/// Event emitted when the tracked transport closes.
pub const EVENT_DISCONNECTED: &str = "disconnected";
/// Event emitted with the full packet for every decoded frame.
pub const EVENT_DATA: &str = "data";

/// Delay before an automatic reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport, or the last one closed.
    Disconnected,
    /// Transport opening.
    Connecting,
    /// Transport open; `send` writes frames.
    Open,
    /// An existing transport is being replaced by a new `connect`.
    Closing,
}

/// Event delivered to the client's event loop.
#[derive(Debug)]
pub(crate) enum ClientEvent {
    /// Notification from the transport of the given generation.
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    /// The reconnect delay for `url` has elapsed.
    ReconnectDue { url: String },
    /// Stop [`ConnectionManager::run`].
    Shutdown,
}

struct ConnectionInner {
    state: ConnectionState,
    current_url: Option<String>,
    /// Generation of the currently tracked transport.
    generation: u64,
    handle: Option<Box<dyn TransportHandle>>,
}

/// Owns the transport and drives the connect/reconnect lifecycle.
pub struct ConnectionManager {
    inner: Mutex<ConnectionInner>,
    transport: Arc<dyn Transport>,
    bus: EventBus,
    reconnect_delay: Duration,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ClientEvent>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ConnectionManager")
            .field("state", &inner.state)
            .field("current_url", &inner.current_url)
            .field("generation", &inner.generation)
            .field("reconnect_delay", &self.reconnect_delay)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a manager that dispatches onto `bus`.
    pub fn new(transport: Arc<dyn Transport>, bus: EventBus, reconnect_delay: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            inner: Mutex::new(ConnectionInner {
                state: ConnectionState::Disconnected,
                current_url: None,
                generation: 0,
                handle: None,
            }),
            transport,
            bus,
            reconnect_delay,
            events_tx,
            events_rx: tokio::sync::Mutex::new(events_rx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// URL of the current (or last) connection target.
    #[must_use]
    pub fn current_url(&self) -> Option<String> {
        self.lock().current_url.clone()
    }

    /// Connect to `url`.
    ///
    /// No-op when already connecting or connected to the same URL. Any
    /// other existing transport is closed first.
    pub fn connect(&self, url: &str) {
        let mut inner = self.lock();

        if inner.handle.is_some()
            && matches!(inner.state, ConnectionState::Connecting | ConnectionState::Open)
            && inner.current_url.as_deref() == Some(url)
        {
            log::debug!("[Companion] Already connected to {}, ignoring connect", url);
            return;
        }

        if let Some(old) = inner.handle.take() {
            inner.state = ConnectionState::Closing;
            old.close();
        }

        inner.current_url = Some(url.to_string());
        inner.generation += 1;
        inner.state = ConnectionState::Connecting;
        log::info!("[Companion] Connecting to {}...", url);

        let sink = TransportSink::new(inner.generation, self.events_tx.clone());
        inner.handle = Some(self.transport.open(url, sink));
    }

    /// Close the connection and forget the target, so no reconnect fires.
    pub fn disconnect(&self) {
        let was_live = {
            let mut inner = self.lock();
            let was_live = inner.handle.is_some()
                && matches!(inner.state, ConnectionState::Connecting | ConnectionState::Open);
            if let Some(handle) = inner.handle.take() {
                handle.close();
            }
            // Invalidate the closed transport's pending notifications.
            inner.generation += 1;
            inner.current_url = None;
            inner.state = ConnectionState::Disconnected;
            was_live
        };

        if was_live {
            log::info!("[Companion] Disconnected by request");
            self.bus.emit(EVENT_DISCONNECTED, &json!({}));
        }
    }

    /// Send a packet `{version: 1, type, body}`.
    ///
    /// Dropped with a warning unless the connection is open. Returns whether
    /// the frame was handed to the transport.
    pub fn send(&self, packet_type: &str, body: Value) -> bool {
        let inner = self.lock();

        let handle = match (&inner.handle, inner.state) {
            (Some(handle), ConnectionState::Open) => handle,
            _ => {
                log::warn!(
                    "[Companion] WebSocket not connected, cannot send message '{}'",
                    packet_type
                );
                return false;
            }
        };

        let text = match Packet::new(packet_type, body).encode() {
            Ok(text) => text,
            Err(e) => {
                log::warn!("[Companion] Cannot encode packet '{}': {}", packet_type, e);
                return false;
            }
        };

        match handle.send_text(text) {
            Ok(()) => {
                log::trace!("[Companion] Sent '{}'", packet_type);
                true
            }
            Err(e) => {
                log::warn!("[Companion] Failed to send '{}': {:#}", packet_type, e);
                false
            }
        }
    }

    /// Ask a running [`ConnectionManager::run`] loop to return.
    pub fn shutdown(&self) {
        let _ = self.events_tx.send(ClientEvent::Shutdown);
    }

    /// Process events until [`ConnectionManager::shutdown`] is called.
    pub async fn run(&self) {
        let mut rx = self.events_rx.lock().await;
        while let Some(event) = rx.recv().await {
            if matches!(event, ClientEvent::Shutdown) {
                log::debug!("[Companion] Event loop shutting down");
                break;
            }
            self.handle_event(event);
        }
    }

    /// Process every event already queued, without waiting.
    ///
    /// For hosts that drive the client from their own loop. Returns the
    /// number of events processed; returns 0 while [`ConnectionManager::run`]
    /// owns the queue.
    pub fn process_pending(&self) -> usize {
        let Ok(mut rx) = self.events_rx.try_lock() else {
            return 0;
        };
        let mut processed = 0;
        while let Ok(event) = rx.try_recv() {
            if !matches!(event, ClientEvent::Shutdown) {
                self.handle_event(event);
            }
            processed += 1;
        }
        processed
    }

    pub(crate) fn handle_event(&self, event: ClientEvent) {
        match event {
            ClientEvent::Transport { generation, event } => {
                self.handle_transport_event(generation, event);
            }
            ClientEvent::ReconnectDue { url } => self.handle_reconnect_due(&url),
            ClientEvent::Shutdown => {}
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn handle_transport_event(&self, generation: u64, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                {
                    let mut inner = self.lock();
                    if inner.generation != generation {
                        log::debug!("[Companion] Ignoring open of stale transport #{}", generation);
                        return;
                    }
                    inner.state = ConnectionState::Open;
                }
                log::info!("[Companion] Connected");
                self.bus.emit(EVENT_CONNECTED, &json!({}));
            }
            TransportEvent::Message(text) => {
                if !self.is_current(generation) {
                    log::trace!("[Companion] Ignoring frame from stale transport #{}", generation);
                    return;
                }
                self.dispatch_frame(&text);
            }
            TransportEvent::Close { code, reason } => {
                let url = {
                    let mut inner = self.lock();
                    if inner.generation != generation {
                        log::debug!("[Companion] Ignoring close of stale transport #{}", generation);
                        return;
                    }
                    inner.state = ConnectionState::Disconnected;
                    inner.handle = None;
                    inner.current_url.clone()
                };
                log::info!("[Companion] Connection closed ({} {})", code, reason);
                self.bus.emit(EVENT_DISCONNECTED, &json!({}));
                if let Some(url) = url {
                    self.schedule_reconnect(url);
                }
            }
            TransportEvent::Error(e) => {
                log::error!("[Companion] WebSocket Error: {}", e);
            }
        }
    }

    fn dispatch_frame(&self, text: &str) {
        let frame = match decode_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                let preview: String = text.chars().take(100).collect();
                log::warn!("[Companion] Failed to parse WS message: {} ({})", e, preview);
                return;
            }
        };

        if let Some(event) = &frame.event {
            self.bus.emit(event, &frame.payload);
        }
        self.bus.emit(EVENT_DATA, &frame.packet);
    }

    fn schedule_reconnect(&self, url: String) {
        let tx = self.events_tx.clone();
        let delay = self.reconnect_delay;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                log::info!(
                    "[Companion] Reconnecting to {} in {}ms",
                    url,
                    delay.as_millis()
                );
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(ClientEvent::ReconnectDue { url });
                });
            }
            Err(_) => {
                log::warn!("[Companion] No async runtime, automatic reconnect disabled for {}", url);
            }
        }
    }

    fn handle_reconnect_due(&self, url: &str) {
        let should_reconnect = {
            let inner = self.lock();
            inner.state == ConnectionState::Disconnected && inner.current_url.as_deref() == Some(url)
        };
        if should_reconnect {
            self.connect(url);
        } else {
            log::debug!("[Companion] Reconnect to {} superseded", url);
        }
    }
}
