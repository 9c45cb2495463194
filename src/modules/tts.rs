//! Text-to-speech.

use serde_json::{json, Value};

use crate::client::CompanionClient;

/// Voice selection for [`Tts::speak`].
///
/// `key` wins over `voice`; empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TtsOptions {
    /// Pre-configured voice key on the host.
    pub key: Option<String>,
    /// Voice name.
    pub voice: Option<String>,
}

impl TtsOptions {
    /// Speak with a host voice key.
    #[must_use]
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            voice: None,
        }
    }

    /// Speak with a named voice.
    #[must_use]
    pub fn with_voice(voice: impl Into<String>) -> Self {
        Self {
            key: None,
            voice: Some(voice.into()),
        }
    }
}

/// TTS commands (`tts_*`).
#[derive(Debug, Clone, Copy)]
pub struct Tts<'a> {
    client: &'a CompanionClient,
}

impl<'a> Tts<'a> {
    pub(crate) fn new(client: &'a CompanionClient) -> Self {
        Self { client }
    }

    /// Queue `text` for speech.
    pub fn speak(&self, text: &str, options: &TtsOptions) -> bool {
        let non_empty = |s: &Option<String>| s.as_deref().filter(|s| !s.is_empty()).map(str::to_string);

        if let Some(key) = non_empty(&options.key) {
            self.client
                .send("tts_request_wkey", json!({ "text": text, "key": key }))
        } else if let Some(voice) = non_empty(&options.voice) {
            self.client
                .send("tts_request_wvoice", json!({ "text": text, "voice": voice }))
        } else {
            self.client.send("tts_request", json!(text))
        }
    }

    /// Skip the current utterance.
    pub fn skip(&self) -> bool {
        self.client.send("tts_skip", Value::Null)
    }

    /// Pause the speech queue.
    pub fn pause(&self) -> bool {
        self.client.send("tts_queuestop", Value::Null)
    }

    /// Resume the speech queue.
    pub fn resume(&self) -> bool {
        self.client.send("tts_queuecontinue", Value::Null)
    }

    /// Set the speaking rate.
    pub fn set_rate(&self, rate: f64) -> bool {
        self.client.send("tts_rate", json!(rate))
    }

    /// Set the speech volume.
    pub fn set_volume(&self, volume: f64) -> bool {
        self.client.send("tts_volume", json!(volume))
    }

    listener_methods! {
        /// Playback status changes.
        on_status => "tts_status";
    }
}
