//! Speech-to-text.

use serde_json::Value;

use crate::client::CompanionClient;

/// STT commands and events (`stt_*`).
#[derive(Debug, Clone, Copy)]
pub struct Stt<'a> {
    client: &'a CompanionClient,
}

impl<'a> Stt<'a> {
    pub(crate) fn new(client: &'a CompanionClient) -> Self {
        Self { client }
    }

    /// Start listening.
    pub fn start(&self) -> bool {
        self.client.send("stt_start", Value::Null)
    }

    /// Stop listening.
    pub fn stop(&self) -> bool {
        self.client.send("stt_stop", Value::Null)
    }

    listener_methods! {
        /// Final transcription.
        on_result => "stt_result";
        /// Interim transcription.
        on_partial => "stt_partial";
        on_status => "stt_status";
        /// Trigger phrase recognised.
        on_trigger => "stt_trigger";
    }
}
