//! Defines the WebSocket message protocol between the client and the relay,
//! and the mapping from Gemini responses onto it.

use gemini_live::{SessionConfig, types::ServerMessage as UpstreamMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent from the client to the relay.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Session options, naming the voice. This must be the first message.
    Config { config: SessionConfig },
    /// A base64 PCM audio chunk.
    Audio { data: String },
    /// A base64 JPEG frame.
    Image { data: String },
    /// A complete user text turn.
    Text { data: String },
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown message type '{0}'")]
    UnknownType(String),
}

const KNOWN_TYPES: &[&str] = &["config", "audio", "image", "text"];

impl ClientMessage {
    /// Parses one text frame, telling unknown types apart from broken JSON.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(text)?;
        if let Some(kind) = value.get("type").and_then(Value::as_str) {
            if !KNOWN_TYPES.contains(&kind) {
                return Err(EnvelopeError::UnknownType(kind.to_string()));
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Config { .. } => "config",
            ClientMessage::Audio { .. } => "audio",
            ClientMessage::Image { .. } => "image",
            ClientMessage::Text { .. } => "text",
        }
    }
}

/// Messages sent from the relay to the client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Base64 audio from the model, passed through untouched.
    Audio(String),
    Text(String),
    /// Always `true`; the model finished its turn.
    TurnComplete(bool),
    /// Sent once, right before the relay closes a session it could not start.
    Error(String),
}

/// Maps one Gemini response onto the client messages it produces.
///
/// Parts are forwarded in the order they arrived: inline data becomes
/// `audio`, text becomes `text`. A turn-completion flag is appended last.
pub fn forward_upstream(message: UpstreamMessage) -> Vec<ServerMessage> {
    let Some(content) = message.server_content else {
        return Vec::new();
    };

    let mut out: Vec<ServerMessage> = content
        .model_turn
        .map(|turn| turn.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| match (part.inline_data, part.text) {
            (Some(blob), _) => Some(ServerMessage::Audio(blob.data)),
            (None, Some(text)) => Some(ServerMessage::Text(text)),
            (None, None) => None,
        })
        .collect();

    if content.turn_complete {
        out.push(ServerMessage::TurnComplete(true));
    }
    out
}
