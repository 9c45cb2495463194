//! Feature modules.
//!
//! Thin typed wrappers over [`CompanionClient::send`] and
//! [`CompanionClient::on`]. Each module borrows the client it was obtained
//! from (`client.tts()`, `client.twitch()`, …) and holds no state.
//!
//! [`CompanionClient::send`]: crate::CompanionClient::send
//! [`CompanionClient::on`]: crate::CompanionClient::on

/// Generate `on_*` methods that subscribe to a fixed event.
macro_rules! listener_methods {
    ($($(#[$meta:meta])* $name:ident => $event:literal;)*) => {
        $(
            #[doc = concat!("Subscribe to `", $event, "`.")]
            $(#[doc = ""] #[$meta])*
            pub fn $name<F>(&self, callback: F) -> $crate::events::Listener
            where
                F: Fn(&serde_json::Value) -> anyhow::Result<()> + Send + Sync + 'static,
            {
                self.client.on($event, callback)
            }
        )*
    };
}

mod input;
mod media;
mod memory;
mod soundboard;
mod stt;
mod tts;
pub mod twitch;

pub use input::Input;
pub use media::Media;
pub use memory::{Memory, MemoryScope};
pub use soundboard::Soundboard;
pub use stt::Stt;
pub use tts::{Tts, TtsOptions};
pub use twitch::Twitch;
