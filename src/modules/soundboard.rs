//! Soundboard playback (`soundboard_*`).

use serde_json::{json, Value};

use crate::client::CompanionClient;

/// Soundboard commands.
#[derive(Debug, Clone, Copy)]
pub struct Soundboard<'a> {
    client: &'a CompanionClient,
}

impl<'a> Soundboard<'a> {
    pub(crate) fn new(client: &'a CompanionClient) -> Self {
        Self { client }
    }

    /// Play the sound named `name`.
    pub fn play(&self, name: &str) -> bool {
        self.client.send("soundboard_play", json!({ "name": name }))
    }

    /// Stop every playing sound.
    pub fn stop(&self) -> bool {
        self.client.send("soundboard_stop", Value::Null)
    }

    /// Set the volume, 0.0 to 1.0.
    pub fn set_volume(&self, volume: f64) -> bool {
        self.client.send("soundboard_volume", json!(volume))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::open_client;

    #[test]
    fn test_commands() {
        let (client, transport) = open_client();
        let soundboard = client.soundboard();
        assert!(soundboard.play("airhorn"));
        assert!(soundboard.stop());
        assert!(soundboard.set_volume(0.25));

        assert_eq!(
            transport.sent_json(),
            vec![
                json!({"version": 1, "type": "soundboard_play", "body": {"name": "airhorn"}}),
                json!({"version": 1, "type": "soundboard_stop", "body": null}),
                json!({"version": 1, "type": "soundboard_volume", "body": 0.25}),
            ]
        );
    }
}
