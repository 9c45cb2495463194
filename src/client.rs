//! `CompanionClient`: the public facade.
//!
//! Owns the event bus, the connection manager and (optionally) a list
//! renderer over a host document. Cloning the client yields another handle
//! to the same connection.

// Rust guideline compliant 2026-02

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::events::{EventBus, Listener};
use crate::modules::{Input, Media, Memory, Soundboard, Stt, Tts, Twitch};
use crate::reactive::Subscription;
use crate::render::{Document, FrameScheduler, IntervalFrames, ListRenderer, ListSource};
use crate::transport::{Transport, WsTransport};

struct ClientInner {
    config: ClientConfig,
    bus: EventBus,
    connection: ConnectionManager,
    renderer: Mutex<Option<ListRenderer>>,
}

/// Client for a companion host.
///
/// Nothing happens on the wire until the event loop runs: drive it with
/// [`CompanionClient::run`] / [`CompanionClient::spawn`], or call
/// [`CompanionClient::process_pending`] from the host's own loop.
#[derive(Clone)]
pub struct CompanionClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for CompanionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompanionClient")
            .field("config", &self.inner.config)
            .field("connection", &self.inner.connection)
            .field("bus", &self.inner.bus)
            .finish_non_exhaustive()
    }
}

impl Default for CompanionClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl CompanionClient {
    /// Client over the WebSocket transport.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(WsTransport))
    }

    /// Client over a custom transport.
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let bus = EventBus::new();
        let connection = ConnectionManager::new(transport, bus.clone(), config.reconnect_delay());
        Self {
            inner: Arc::new(ClientInner {
                config,
                bus,
                connection,
                renderer: Mutex::new(None),
            }),
        }
    }

    /// Attach a host document, re-rendering on tokio-timer frames.
    #[must_use]
    pub fn with_document(self, document: Arc<dyn Document>) -> Self {
        let frames = Arc::new(IntervalFrames::new(self.inner.config.frame_interval()));
        self.with_document_and_frames(document, frames)
    }

    /// Attach a host document and the scheduler for reactive re-renders.
    #[must_use]
    pub fn with_document_and_frames(
        self,
        document: Arc<dyn Document>,
        frames: Arc<dyn FrameScheduler>,
    ) -> Self {
        self.set_document(document, frames);
        self
    }

    /// Replace the host document on a shared client.
    pub fn set_document(&self, document: Arc<dyn Document>, frames: Arc<dyn FrameScheduler>) {
        *self
            .inner
            .renderer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(ListRenderer::new(document, frames));
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The event bus inbound packets are dispatched on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    // === Connection ===

    /// Connect to `url`. See [`ConnectionManager::connect`].
    pub fn connect(&self, url: &str) {
        self.inner.connection.connect(url);
    }

    /// Close the connection without reconnecting.
    pub fn disconnect(&self) {
        self.inner.connection.disconnect();
    }

    /// Send a packet. Returns `false` when not connected.
    pub fn send(&self, packet_type: &str, body: Value) -> bool {
        self.inner.connection.send(packet_type, body)
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Current connection target.
    #[must_use]
    pub fn current_url(&self) -> Option<String> {
        self.inner.connection.current_url()
    }

    /// Whether the connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    // === Events ===

    /// Subscribe to `event`. Returns the handle for [`CompanionClient::off`].
    pub fn on<F>(&self, event: &str, callback: F) -> Listener
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.bus.on(event, callback)
    }

    /// Unsubscribe a listener returned by [`CompanionClient::on`].
    pub fn off(&self, event: &str, listener: &Listener) {
        self.inner.bus.off(event, listener);
    }

    // === Rendering ===

    /// Render a list into the attached document.
    ///
    /// No-op with a warning when no document is attached.
    /// See [`ListRenderer::render_list`].
    pub fn render_list(
        &self,
        template_id: &str,
        source: impl Into<ListSource>,
    ) -> Option<Subscription> {
        let renderer = self
            .inner
            .renderer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match renderer {
            Some(renderer) => renderer.render_list(template_id, source),
            None => {
                log::warn!(
                    "[Companion/render] render_list('{}'): no host document attached",
                    template_id
                );
                None
            }
        }
    }

    // === Event loop ===

    /// Process events until [`CompanionClient::shutdown`].
    pub async fn run(&self) {
        self.inner.connection.run().await;
    }

    /// Run the event loop on a tokio task.
    #[must_use]
    pub fn spawn(&self) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move { client.run().await })
    }

    /// Stop a running event loop. Does not close the connection.
    pub fn shutdown(&self) {
        self.inner.connection.shutdown();
    }

    /// Process already queued events without waiting. Returns how many.
    pub fn process_pending(&self) -> usize {
        self.inner.connection.process_pending()
    }

    // === Feature modules ===

    /// Text-to-speech commands.
    #[must_use]
    pub fn tts(&self) -> Tts<'_> {
        Tts::new(self)
    }

    /// Speech-to-text commands.
    #[must_use]
    pub fn stt(&self) -> Stt<'_> {
        Stt::new(self)
    }

    /// Host variable store.
    #[must_use]
    pub fn memory(&self) -> Memory<'_> {
        Memory::new(self)
    }

    /// Keyboard and mouse events.
    #[must_use]
    pub fn input(&self) -> Input<'_> {
        Input::new(self)
    }

    /// Song recognition events.
    #[must_use]
    pub fn media(&self) -> Media<'_> {
        Media::new(self)
    }

    /// Soundboard commands.
    #[must_use]
    pub fn soundboard(&self) -> Soundboard<'_> {
        Soundboard::new(self)
    }

    /// Twitch commands and events.
    #[must_use]
    pub fn twitch(&self) -> Twitch<'_> {
        Twitch::new(self)
    }
}
