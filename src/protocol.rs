//! Wire envelope for everything exchanged with the companion host.
//!
//! Every frame is a UTF-8 JSON object `{"version": 1, "type": .., "body": ..}`.
//! The core only looks at `type`; `body` is opaque.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version stamped on every outbound packet.
pub const PROTOCOL_VERSION: u32 = 1;

/// Outbound packet envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Envelope version (always [`PROTOCOL_VERSION`] for packets we build).
    pub version: u32,
    /// Event / command discriminator.
    #[serde(rename = "type")]
    pub packet_type: String,
    /// Opaque payload.
    pub body: Value,
}

impl Packet {
    /// Build a packet at the current protocol version.
    pub fn new(packet_type: impl Into<String>, body: Value) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            packet_type: packet_type.into(),
            body,
        }
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn encode(&self) -> Result<String, PacketError> {
        if self.packet_type.is_empty() {
            return Err(PacketError::EmptyType);
        }
        Ok(serde_json::to_string(self)?)
    }
}

/// Why a frame could not be decoded or a packet encoded.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// Frame was not valid JSON.
    #[error("malformed JSON frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Frame was valid JSON but not an object.
    #[error("frame is not a JSON object (got {0})")]
    NotAnObject(&'static str),
    /// Outbound packet had an empty `type`.
    #[error("packet type must not be empty")]
    EmptyType,
}

/// A decoded inbound frame, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    /// Event name (`type`), when present as a non-empty string.
    pub event: Option<String>,
    /// Payload for the typed event: `body`, or the whole packet when
    /// `body` is absent or `null`.
    pub payload: Value,
    /// The full packet, delivered to `data` listeners.
    pub packet: Value,
}

/// Decode one text frame.
pub fn decode_frame(text: &str) -> Result<InboundFrame, PacketError> {
    let packet: Value = serde_json::from_str(text)?;

    let Value::Object(map) = &packet else {
        return Err(PacketError::NotAnObject(json_kind(&packet)));
    };

    let event = map
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let payload = match map.get("body") {
        Some(Value::Null) | None => packet.clone(),
        Some(body) => body.clone(),
    };

    Ok(InboundFrame {
        event,
        payload,
        packet,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
