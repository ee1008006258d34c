//! Tabletop message protocol exchanged directly between peers
//!
//! Messages are JSON objects tagged by a `type` field. Encoding always goes
//! through the closed [`Message`] enum; decoding yields an [`Inbound`] which
//! is either one of the five recognized kinds or the raw object for anything
//! else, so callers decide explicitly what happens to unknown traffic.

use crate::model::{ChatKind, MessageId, PeerId, Position, TokenId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Wire tags this protocol understands.
pub const RECOGNIZED_TYPES: [&str; 5] = [
    "CHAT",
    "DICE_ROLL",
    "TOKEN_MOVE",
    "BACKGROUND_UPDATE",
    "SYSTEM_MESSAGE",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Chat(Chat),
    DiceRoll(DiceRoll),
    TokenMove(TokenMove),
    BackgroundUpdate(BackgroundUpdate),
    SystemMessage(SystemMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: MessageId,
    pub sender: PeerId,
    pub sender_name: String,
    pub text: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceRoll {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    pub result: u32,
    pub dice_type: String,
    pub sender: PeerId,
    pub sender_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMove {
    pub token_id: TokenId,
    pub position: Position,
    pub sender: PeerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Full background image, sent inline. Bytes travel as a base64 string.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundUpdate {
    #[serde(with = "base64_bytes")]
    pub image: Vec<u8>,
    pub sender: PeerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl std::fmt::Debug for BackgroundUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundUpdate")
            .field("image_len", &self.image.len())
            .field("sender", &self.sender)
            .field("text", &self.text)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    pub text: String,
    pub timestamp: String,
}

impl Message {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn wire_type(&self) -> &'static str {
        match self {
            Message::Chat(_) => RECOGNIZED_TYPES[0],
            Message::DiceRoll(_) => RECOGNIZED_TYPES[1],
            Message::TokenMove(_) => RECOGNIZED_TYPES[2],
            Message::BackgroundUpdate(_) => RECOGNIZED_TYPES[3],
            Message::SystemMessage(_) => RECOGNIZED_TYPES[4],
        }
    }

    pub fn kind(&self) -> ChatKind {
        match self {
            Message::Chat(_) => ChatKind::Chat,
            Message::DiceRoll(_) => ChatKind::DiceRoll,
            Message::TokenMove(_) => ChatKind::TokenMove,
            Message::BackgroundUpdate(_) => ChatKind::BackgroundUpdate,
            Message::SystemMessage(_) => ChatKind::SystemMessage,
        }
    }

    pub fn sender(&self) -> Option<&PeerId> {
        match self {
            Message::Chat(m) => Some(&m.sender),
            Message::DiceRoll(m) => Some(&m.sender),
            Message::TokenMove(m) => Some(&m.sender),
            Message::BackgroundUpdate(m) => Some(&m.sender),
            Message::SystemMessage(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Message::Chat(m) => Some(&m.text),
            Message::SystemMessage(m) => Some(&m.text),
            Message::DiceRoll(m) => m.text.as_deref(),
            Message::TokenMove(m) => m.text.as_deref(),
            Message::BackgroundUpdate(m) => m.text.as_deref(),
        }
    }
}

/// A JSON object whose `type` is missing, unknown, or whose fields do not
/// match the recognized shape for its tag.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub kind: Option<String>,
    pub payload: Value,
}

impl RawMessage {
    fn field(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(Value::as_str)
    }

    /// Non-blank `text` field, if any.
    pub fn text(&self) -> Option<&str> {
        self.field("text").filter(|text| !text.trim().is_empty())
    }

    pub fn id(&self) -> Option<MessageId> {
        self.field("id").map(MessageId::from)
    }

    pub fn sender(&self) -> Option<PeerId> {
        self.field("sender").map(PeerId::from)
    }

    pub fn sender_name(&self) -> Option<String> {
        self.field("senderName").map(str::to_string)
    }

    pub fn timestamp(&self) -> Option<String> {
        self.field("timestamp").map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Recognized(Message),
    Unrecognized(RawMessage),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Decodes one frame received from a peer.
///
/// Only payloads that are not JSON objects at all are errors. Everything
/// else becomes an [`Inbound`], including recognized tags with missing or
/// mistyped fields, which are handed back raw.
pub fn decode(bytes: &[u8]) -> Result<Inbound, DecodeError> {
    let value: Value = serde_json::from_slice(bytes)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }

    let kind = value.get("type").and_then(Value::as_str).map(str::to_string);
    let recognized = kind
        .as_deref()
        .is_some_and(|kind| RECOGNIZED_TYPES.contains(&kind));

    if recognized {
        if let Ok(message) = Message::deserialize(&value) {
            return Ok(Inbound::Recognized(message));
        }
    }

    Ok(Inbound::Unrecognized(RawMessage {
        kind,
        payload: value,
    }))
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chat() -> Message {
        Message::Chat(Chat {
            id: MessageId::new("m-1"),
            sender: PeerId::new("peer-a"),
            sender_name: "Alice".to_string(),
            text: "hello".to_string(),
            timestamp: "12:00:00".to_string(),
        })
    }

    #[test]
    fn test_chat_wire_shape() {
        let value: Value = serde_json::from_slice(&chat().encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "CHAT",
                "id": "m-1",
                "sender": "peer-a",
                "senderName": "Alice",
                "text": "hello",
                "timestamp": "12:00:00",
            })
        );
    }

    #[test]
    fn test_token_move_wire_shape() {
        let message = Message::TokenMove(TokenMove {
            token_id: TokenId::new("token-1"),
            position: Position::new(3, 4),
            sender: PeerId::new("peer-a"),
            text: None,
        });
        let value: Value = serde_json::from_slice(&message.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "TOKEN_MOVE",
                "tokenId": "token-1",
                "position": { "x": 3, "y": 4 },
                "sender": "peer-a",
            })
        );
    }

    #[test]
    fn test_dice_roll_without_optional_fields() {
        let bytes = serde_json::to_vec(&json!({
            "type": "DICE_ROLL",
            "result": 17,
            "diceType": "d20",
            "sender": "peer-b",
            "senderName": "Bob",
        }))
        .unwrap();

        match decode(&bytes).unwrap() {
            Inbound::Recognized(Message::DiceRoll(roll)) => {
                assert_eq!(roll.result, 17);
                assert_eq!(roll.dice_type, "d20");
                assert!(roll.timestamp.is_none());
                assert!(roll.text.is_none());
                assert!(roll.id.is_none());
            }
            other => panic!("Unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_background_bytes_survive_encoding() {
        let image: Vec<u8> = (0..=255).cycle().take(4096).collect();
        let message = Message::BackgroundUpdate(BackgroundUpdate {
            image: image.clone(),
            sender: PeerId::new("host"),
            text: None,
        });

        match decode(&message.encode().unwrap()).unwrap() {
            Inbound::Recognized(Message::BackgroundUpdate(update)) => {
                assert_eq!(update.image, image)
            }
            other => panic!("Unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_recognized_types_match_encoding() {
        let messages = vec![
            chat(),
            Message::SystemMessage(SystemMessage {
                id: None,
                text: "welcome".to_string(),
                timestamp: "12:00:00".to_string(),
            }),
        ];

        for message in messages {
            let value: Value = serde_json::from_slice(&message.encode().unwrap()).unwrap();
            assert_eq!(value["type"], message.wire_type());
            assert!(RECOGNIZED_TYPES.contains(&message.wire_type()));
        }
    }

    #[test]
    fn test_unknown_type_is_kept_raw() {
        let bytes = br#"{"type":"PING","text":"still here","sender":"peer-c"}"#;
        match decode(bytes).unwrap() {
            Inbound::Unrecognized(raw) => {
                assert_eq!(raw.kind.as_deref(), Some("PING"));
                assert_eq!(raw.text(), Some("still here"));
                assert_eq!(raw.sender(), Some(PeerId::new("peer-c")));
            }
            other => panic!("Unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_untyped_message_is_kept_raw() {
        let bytes = br#"{"id":"x","text":"legacy chat","senderName":"Eve"}"#;
        match decode(bytes).unwrap() {
            Inbound::Unrecognized(raw) => {
                assert!(raw.kind.is_none());
                assert_eq!(raw.sender_name().as_deref(), Some("Eve"));
                assert_eq!(raw.id(), Some(MessageId::new("x")));
            }
            other => panic!("Unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_recognized_tag_with_missing_fields_is_raw() {
        let bytes = br#"{"type":"TOKEN_MOVE","tokenId":"t"}"#;
        match decode(bytes).unwrap() {
            Inbound::Unrecognized(raw) => {
                assert_eq!(raw.kind.as_deref(), Some("TOKEN_MOVE"));
                assert!(raw.text().is_none());
            }
            other => panic!("Unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_blank_text_is_not_text() {
        let bytes = br#"{"type":"PING","text":"   "}"#;
        match decode(bytes).unwrap() {
            Inbound::Unrecognized(raw) => assert!(raw.text().is_none()),
            other => panic!("Unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_payloads_are_errors() {
        assert!(matches!(decode(b"not json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode(b"[1,2,3]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode(b"\"text\""), Err(DecodeError::NotAnObject)));
        assert!(decode(b"").is_err());
    }

    #[test]
    fn test_message_accessors() {
        let message = chat();
        assert_eq!(message.kind(), ChatKind::Chat);
        assert_eq!(message.sender(), Some(&PeerId::new("peer-a")));
        assert_eq!(message.text(), Some("hello"));
    }
}
