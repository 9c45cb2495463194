//! Companion client - connection, events and reactive rendering for
//! SAMMI-style companion hosts.
//!
//! # Architecture
//!
//! The crate is layered around a single event loop:
//!
//! - **Connection** - self-healing WebSocket connection with reconnect
//! - **Events** - publish/subscribe bus demultiplexing inbound packets
//! - **Reactive** - observable JSON container with change notification
//! - **Render** - template lists reconciled against a host document
//! - **Modules** - typed TTS / STT / memory / Twitch / … wrappers
//!
//! ```no_run
//! use companion_client::{ClientConfig, CompanionClient, TtsOptions};
//!
//! # async fn demo() {
//! let client = CompanionClient::new(ClientConfig::default());
//! client.on("tts_status", |body| {
//!     println!("tts: {body}");
//!     Ok(())
//! });
//! client.connect("ws://127.0.0.1:9450");
//! client.on("connected", {
//!     let client = client.clone();
//!     move |_| {
//!         client.tts().speak("hello", &TtsOptions::default());
//!         Ok(())
//!     }
//! });
//! client.run().await;
//! # }
//! ```
//!
//! # Modules
//!
//! - [`connection`] - lifecycle state machine and reconnect policy
//! - [`events`] - listener registry
//! - [`reactive`] - observable state
//! - [`render`] - list renderer, host document contract, frame scheduling
//! - [`modules`] - feature modules
//! - [`config`] - configuration loading/saving

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod events;
pub mod modules;
pub mod protocol;
pub mod reactive;
pub mod render;
pub mod transport;
pub mod ws;

// Re-export commonly used types
pub use client::CompanionClient;
pub use config::ClientConfig;
pub use connection::{ConnectionState, EVENT_CONNECTED, EVENT_DATA, EVENT_DISCONNECTED};
pub use events::{EventBus, Listener};
pub use modules::{MemoryScope, TtsOptions};
pub use protocol::{Packet, PacketError, PROTOCOL_VERSION};
pub use reactive::{Reactive, Subscription};
pub use render::{Document, ListSource, ManualFrames, MemoryDocument};
pub use transport::{Transport, TransportEvent, TransportHandle, TransportSink, WsTransport};
