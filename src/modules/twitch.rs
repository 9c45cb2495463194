//! Twitch moderation, channel and interaction commands, plus the
//! notification events the host relays from Twitch.
//!
//! Commands are typed enums serialized with an `action` tag:
//!
//! ```text
//! {"type": "twitch_moderation", "body": {"action": "timeout", "target": "123", "duration": 60}}
//! ```
//!
//! Optional fields are omitted from the body when absent.

#![allow(missing_docs, reason = "variants and fields mirror Twitch API names")]

use serde::{Deserialize, Serialize, Serializer};

use crate::client::CompanionClient;

/// Packet type for [`ModerationCommand`].
pub const TWITCH_MODERATION: &str = "twitch_moderation";
/// Packet type for [`ChannelCommand`].
pub const TWITCH_CHANNEL: &str = "twitch_channel";
/// Packet type for [`InteractionCommand`].
pub const TWITCH_INTERACTION: &str = "twitch_interaction";

/// Chat moderation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ModerationCommand {
    /// Ban a user, permanently unless `duration` (seconds) is set.
    Ban {
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
    },
    Unban {
        target: String,
    },
    /// Time a user out for `duration` seconds.
    Timeout {
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        duration: u64,
    },
    /// `target` is the message id.
    DeleteMessage {
        target: String,
    },
    ClearChat,
    Announce {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    /// `target` is the user id.
    Shoutout {
        target: String,
    },
    ShieldModeOn,
    ShieldModeOff,
    Slow {
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
    },
    SlowOff,
    Followers {
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
    },
    FollowersOff,
    Subscribers,
    SubscribersOff,
    EmoteOnly,
    EmoteOnlyOff,
    UniqueChat,
    UniqueChatOff,
    Mod {
        target: String,
    },
    Unmod {
        target: String,
    },
    Vip {
        target: String,
    },
    Unvip {
        target: String,
    },
}

/// Allowed commercial lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommercialLength {
    Seconds30,
    Seconds60,
    Seconds90,
    Seconds120,
    Seconds150,
    Seconds180,
}

impl CommercialLength {
    /// Length in seconds.
    #[must_use]
    pub fn seconds(self) -> u32 {
        match self {
            Self::Seconds30 => 30,
            Self::Seconds60 => 60,
            Self::Seconds90 => 90,
            Self::Seconds120 => 120,
            Self::Seconds150 => 150,
            Self::Seconds180 => 180,
        }
    }

    /// Length for `seconds`, if Twitch allows it.
    #[must_use]
    pub fn from_seconds(seconds: u32) -> Option<Self> {
        match seconds {
            30 => Some(Self::Seconds30),
            60 => Some(Self::Seconds60),
            90 => Some(Self::Seconds90),
            120 => Some(Self::Seconds120),
            150 => Some(Self::Seconds150),
            180 => Some(Self::Seconds180),
            _ => None,
        }
    }
}

impl Serialize for CommercialLength {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.seconds())
    }
}

impl<'de> Deserialize<'de> for CommercialLength {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let seconds = u32::deserialize(deserializer)?;
        Self::from_seconds(seconds).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid commercial length: {seconds}"))
        })
    }
}

/// Channel management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChannelCommand {
    UpdateInfo {
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        game_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    CreateClip {
        has_delay: bool,
    },
    /// `target` is the user id.
    StartRaid {
        target: String,
    },
    CancelRaid,
    StartCommercial {
        length: CommercialLength,
    },
    CreateMarker {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

/// How a poll ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollEndStatus {
    /// End and show the results.
    Terminated,
    /// End and hide the poll.
    Archived,
}

/// How a prediction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictionEndStatus {
    Resolved,
    Canceled,
    Locked,
}

/// Polls and predictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InteractionCommand {
    CreatePoll {
        title: String,
        options: Vec<String>,
        /// Seconds.
        duration: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        bits_per_vote: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        channel_points_per_vote: Option<u64>,
    },
    EndPoll {
        id: String,
        status: PollEndStatus,
    },
    CreatePrediction {
        title: String,
        outcomes: Vec<String>,
        /// Seconds.
        duration: u64,
    },
    EndPrediction {
        id: String,
        status: PredictionEndStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        winning_outcome_id: Option<String>,
    },
    LockPrediction {
        id: String,
    },
}

/// Twitch commands and notification listeners.
#[derive(Debug, Clone, Copy)]
pub struct Twitch<'a> {
    client: &'a CompanionClient,
}

impl<'a> Twitch<'a> {
    pub(crate) fn new(client: &'a CompanionClient) -> Self {
        Self { client }
    }

    fn send_command<T: Serialize>(&self, packet_type: &str, command: &T) -> bool {
        match serde_json::to_value(command) {
            Ok(body) => self.client.send(packet_type, body),
            Err(e) => {
                log::warn!("[Companion] Cannot serialize {} command: {}", packet_type, e);
                false
            }
        }
    }

    // === Moderation ===

    /// Send any moderation command.
    pub fn moderate(&self, command: &ModerationCommand) -> bool {
        self.send_command(TWITCH_MODERATION, command)
    }

    pub fn ban_user(&self, target: &str, reason: Option<&str>, duration: Option<u64>) -> bool {
        self.moderate(&ModerationCommand::Ban {
            target: target.to_string(),
            reason: reason.map(str::to_string),
            duration,
        })
    }

    pub fn unban_user(&self, target: &str) -> bool {
        self.moderate(&ModerationCommand::Unban {
            target: target.to_string(),
        })
    }

    pub fn timeout_user(&self, target: &str, duration: u64, reason: Option<&str>) -> bool {
        self.moderate(&ModerationCommand::Timeout {
            target: target.to_string(),
            reason: reason.map(str::to_string),
            duration,
        })
    }

    pub fn delete_message(&self, message_id: &str) -> bool {
        self.moderate(&ModerationCommand::DeleteMessage {
            target: message_id.to_string(),
        })
    }

    pub fn clear_chat(&self) -> bool {
        self.moderate(&ModerationCommand::ClearChat)
    }

    pub fn announce(&self, message: &str, color: Option<&str>) -> bool {
        self.moderate(&ModerationCommand::Announce {
            message: message.to_string(),
            color: color.map(str::to_string),
        })
    }

    pub fn shoutout(&self, target_id: &str) -> bool {
        self.moderate(&ModerationCommand::Shoutout {
            target: target_id.to_string(),
        })
    }

    pub fn set_shield_mode(&self, active: bool) -> bool {
        self.moderate(&if active {
            ModerationCommand::ShieldModeOn
        } else {
            ModerationCommand::ShieldModeOff
        })
    }

    // === Channel ===

    /// Send any channel command.
    pub fn channel(&self, command: &ChannelCommand) -> bool {
        self.send_command(TWITCH_CHANNEL, command)
    }

    pub fn update_channel_info(
        &self,
        title: Option<&str>,
        game_id: Option<&str>,
        language: Option<&str>,
    ) -> bool {
        self.channel(&ChannelCommand::UpdateInfo {
            title: title.map(str::to_string),
            game_id: game_id.map(str::to_string),
            language: language.map(str::to_string),
        })
    }

    pub fn create_clip(&self, has_delay: bool) -> bool {
        self.channel(&ChannelCommand::CreateClip { has_delay })
    }

    pub fn start_raid(&self, target_id: &str) -> bool {
        self.channel(&ChannelCommand::StartRaid {
            target: target_id.to_string(),
        })
    }

    pub fn cancel_raid(&self) -> bool {
        self.channel(&ChannelCommand::CancelRaid)
    }

    pub fn start_commercial(&self, length: CommercialLength) -> bool {
        self.channel(&ChannelCommand::StartCommercial { length })
    }

    pub fn create_marker(&self, description: Option<&str>) -> bool {
        self.channel(&ChannelCommand::CreateMarker {
            description: description.map(str::to_string),
        })
    }

    // === Interaction ===

    /// Send any poll or prediction command.
    pub fn interact(&self, command: &InteractionCommand) -> bool {
        self.send_command(TWITCH_INTERACTION, command)
    }

    pub fn create_poll(
        &self,
        title: &str,
        options: &[&str],
        duration: u64,
        bits_per_vote: Option<u64>,
        channel_points_per_vote: Option<u64>,
    ) -> bool {
        self.interact(&InteractionCommand::CreatePoll {
            title: title.to_string(),
            options: options.iter().map(|o| (*o).to_string()).collect(),
            duration,
            bits_per_vote,
            channel_points_per_vote,
        })
    }

    /// End a poll; archived polls are hidden from viewers.
    pub fn end_poll(&self, id: &str, archive: bool) -> bool {
        self.interact(&InteractionCommand::EndPoll {
            id: id.to_string(),
            status: if archive {
                PollEndStatus::Archived
            } else {
                PollEndStatus::Terminated
            },
        })
    }

    pub fn create_prediction(&self, title: &str, outcomes: &[&str], duration: u64) -> bool {
        self.interact(&InteractionCommand::CreatePrediction {
            title: title.to_string(),
            outcomes: outcomes.iter().map(|o| (*o).to_string()).collect(),
            duration,
        })
    }

    pub fn end_prediction(
        &self,
        id: &str,
        status: PredictionEndStatus,
        winning_outcome_id: Option<&str>,
    ) -> bool {
        self.interact(&InteractionCommand::EndPrediction {
            id: id.to_string(),
            status,
            winning_outcome_id: winning_outcome_id.map(str::to_string),
        })
    }

    // === Notifications ===

    listener_methods! {
        on_chat_message => "twitch_chat_message";
        on_follow => "twitch_follow";
        on_subscribe => "twitch_subscribe";
        on_raid => "twitch_raid";
        on_channel_update => "twitch_channel_update";
        on_stream_online => "twitch_stream_online";
        on_stream_offline => "twitch_stream_offline";
        on_poll_begin => "twitch_poll_begin";
        on_poll_progress => "twitch_poll_progress";
        on_poll_end => "twitch_poll_end";
        on_prediction_begin => "twitch_prediction_begin";
        on_prediction_progress => "twitch_prediction_progress";
        on_prediction_end => "twitch_prediction_end";
        on_hype_train_begin => "twitch_hype_train_begin";
        on_hype_train_progress => "twitch_hype_train_progress";
        on_hype_train_end => "twitch_hype_train_end";
        /// Channel point redemption.
        on_redemption => "twitch_redemption";
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{deliver, open_client};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    fn bodies(transport: &crate::transport::testing::MockTransport) -> Vec<(String, Value)> {
        transport
            .sent_json()
            .into_iter()
            .map(|p| (p["type"].as_str().unwrap().to_string(), p["body"].clone()))
            .collect()
    }

    #[test]
    fn test_unit_variant_serializes_as_bare_action() {
        let value = serde_json::to_value(ModerationCommand::ClearChat).unwrap();
        assert_eq!(value, json!({"action": "clear_chat"}));
        let value = serde_json::to_value(ModerationCommand::ShieldModeOn).unwrap();
        assert_eq!(value, json!({"action": "shield_mode_on"}));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let (client, transport) = open_client();
        let twitch = client.twitch();
        twitch.ban_user("42", None, None);
        twitch.timeout_user("42", 600, Some("spam"));

        assert_eq!(
            bodies(&transport),
            vec![
                (
                    TWITCH_MODERATION.to_string(),
                    json!({"action": "ban", "target": "42"})
                ),
                (
                    TWITCH_MODERATION.to_string(),
                    json!({"action": "timeout", "target": "42", "reason": "spam", "duration": 600})
                ),
            ]
        );
    }

    #[test]
    fn test_channel_commands() {
        let (client, transport) = open_client();
        let twitch = client.twitch();
        twitch.update_channel_info(Some("Live!"), Some("509658"), None);
        twitch.create_clip(false);
        twitch.start_commercial(CommercialLength::Seconds90);
        twitch.cancel_raid();

        let sent = bodies(&transport);
        assert!(sent.iter().all(|(t, _)| t == TWITCH_CHANNEL));
        assert_eq!(
            sent[0].1,
            json!({"action": "update_info", "title": "Live!", "game_id": "509658"})
        );
        assert_eq!(sent[1].1, json!({"action": "create_clip", "has_delay": false}));
        assert_eq!(sent[2].1, json!({"action": "start_commercial", "length": 90}));
        assert_eq!(sent[3].1, json!({"action": "cancel_raid"}));
    }

    #[test]
    fn test_interaction_commands() {
        let (client, transport) = open_client();
        let twitch = client.twitch();
        twitch.create_poll("Best?", &["a", "b"], 60, None, Some(100));
        twitch.end_poll("p1", true);
        twitch.end_prediction("pr1", PredictionEndStatus::Resolved, Some("o1"));

        let sent = bodies(&transport);
        assert_eq!(
            sent[0].1,
            json!({
                "action": "create_poll",
                "title": "Best?",
                "options": ["a", "b"],
                "duration": 60,
                "channel_points_per_vote": 100
            })
        );
        assert_eq!(sent[1].1, json!({"action": "end_poll", "id": "p1", "status": "ARCHIVED"}));
        assert_eq!(
            sent[2].1,
            json!({"action": "end_prediction", "id": "pr1", "status": "RESOLVED", "winning_outcome_id": "o1"})
        );
    }

    #[test]
    fn test_commands_deserialize() {
        let cmd: ChannelCommand =
            serde_json::from_value(json!({"action": "start_commercial", "length": 30})).unwrap();
        assert_eq!(
            cmd,
            ChannelCommand::StartCommercial {
                length: CommercialLength::Seconds30
            }
        );
        assert!(serde_json::from_value::<ChannelCommand>(
            json!({"action": "start_commercial", "length": 45})
        )
        .is_err());
    }

    #[test]
    fn test_chat_message_listener() {
        let (client, transport) = open_client();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        client.twitch().on_chat_message(move |body| {
            seen_clone.lock().unwrap().push(body["text"].clone());
            Ok(())
        });

        deliver(
            &client,
            &transport,
            r#"{"type":"twitch_chat_message","body":{"user":"ada","text":"hello"}}"#,
        );
        assert_eq!(*seen.lock().unwrap(), vec![json!("hello")]);
    }
}
