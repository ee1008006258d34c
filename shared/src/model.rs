//! Tabletop data model shared by every peer

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Identity assigned to a participant by the rendezvous service.
    PeerId
);
string_id!(
    /// Identifier of a tabletop room, fixed when the room is created.
    RoomId
);
string_id!(TokenId);
string_id!(MessageId);

impl RoomId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl TokenId {
    pub fn generate() -> Self {
        Self(format!("token-{}", Uuid::new_v4()))
    }
}

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// The room and the peer that created it. Neither changes while the room lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub room_id: RoomId,
    pub host_peer_id: PeerId,
}

/// Grid cell coordinates. Signed so that out-of-range input from the wire
/// can be represented and then clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    #[serde(deserialize_with = "saturating_coordinate")]
    pub x: i32,
    #[serde(deserialize_with = "saturating_coordinate")]
    pub y: i32,
}

/// Accepts any number. Fractions are floored to their cell and values
/// beyond `i32` saturate, so clamping still puts them on the grid edge.
fn saturating_coordinate<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_nan() {
        return Err(D::Error::custom("coordinate is not a number"));
    }
    Ok(value.floor() as i32)
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Clamps into `[0, width) x [0, height)`. Dimensions are at least 1.
    pub fn clamped(self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_y = height.saturating_sub(1).min(i32::MAX as u32) as i32;
        Self {
            x: self.x.clamp(0, max_x),
            y: self.y.clamp(0, max_y),
        }
    }

    pub fn within(&self, width: u32, height: u32) -> bool {
        self.x >= 0 && self.y >= 0 && (self.x as u32) < width && (self.y as u32) < height
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub color: String,
    pub position: Position,
}

impl Token {
    pub fn new(id: TokenId, color: impl Into<String>) -> Self {
        Self {
            id,
            color: color.into(),
            position: Position::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatKind {
    Chat,
    DiceRoll,
    SystemMessage,
    TokenMove,
    BackgroundUpdate,
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChatKind::Chat => "chat",
            ChatKind::DiceRoll => "dice",
            ChatKind::SystemMessage => "system",
            ChatKind::TokenMove => "token",
            ChatKind::BackgroundUpdate => "background",
        };
        f.write_str(label)
    }
}

/// One displayable entry of a peer's chat log.
///
/// System messages have no sender. The timestamp is whatever wall-clock
/// string the originating peer produced; it is never used for ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub kind: ChatKind,
    pub sender: Option<PeerId>,
    pub sender_name: Option<String>,
    pub text: String,
    pub timestamp: String,
}

impl ChatMessage {
    /// Builds a local system notice with a fresh id and the current time.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            kind: ChatKind::SystemMessage,
            sender: None,
            sender_name: None,
            text: text.into(),
            timestamp: local_timestamp(),
        }
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.sender_name, &self.sender) {
            (Some(name), _) => write!(f, "[{}] {}: {}", self.timestamp, name, self.text),
            (None, Some(peer)) => write!(f, "[{}] {}: {}", self.timestamp, peer, self.text),
            (None, None) => write!(f, "[{}] * {}", self.timestamp, self.text),
        }
    }
}

/// Peer-local wall-clock time, formatted for display.
pub fn local_timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_position_clamped_inside_grid() {
        let pos = Position::new(3, 4).clamped(10, 10);
        assert_eq!(pos, Position::new(3, 4));
    }

    #[test]
    fn test_position_clamped_to_edges() {
        assert_eq!(Position::new(-5, 12).clamped(10, 10), Position::new(0, 9));
        assert_eq!(Position::new(10, 10).clamped(10, 10), Position::new(9, 9));
        assert_eq!(Position::new(i32::MAX, i32::MIN).clamped(1, 1), Position::new(0, 0));
    }

    #[test]
    fn test_position_accepts_any_json_number() {
        let pos: Position = serde_json::from_str(r#"{"x":1e12,"y":2.7}"#).unwrap();
        assert_eq!(pos, Position::new(i32::MAX, 2));

        let pos: Position = serde_json::from_str(r#"{"x":-99999999999,"y":-0.5}"#).unwrap();
        assert_eq!(pos, Position::new(i32::MIN, -1));
        assert_eq!(pos.clamped(10, 10), Position::new(0, 0));

        let pos: Position = serde_json::from_str(r#"{"x":18446744073709551615,"y":3}"#).unwrap();
        assert_eq!(pos.clamped(10, 10), Position::new(9, 3));

        assert!(serde_json::from_str::<Position>(r#"{"x":"3","y":1}"#).is_err());
    }

    #[test]
    fn test_position_within() {
        assert!(Position::new(0, 0).within(1, 1));
        assert!(!Position::new(1, 0).within(1, 1));
        assert!(!Position::new(-1, 0).within(5, 5));
    }

    #[test]
    fn test_token_starts_at_origin() {
        let token = Token::new(TokenId::generate(), "#ff0000");
        assert_eq!(token.position, Position::new(0, 0));
        assert!(token.id.as_str().starts_with("token-"));
    }

    #[test]
    fn test_message_ids_do_not_collide() {
        let ids: HashSet<MessageId> = (0..10_000).map(|_| MessageId::generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_room_ids_are_fresh() {
        assert_ne!(RoomId::generate(), RoomId::generate());
    }

    #[test]
    fn test_peer_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PeerId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_system_message_has_no_sender() {
        let msg = ChatMessage::system("Ready");
        assert_eq!(msg.kind, ChatKind::SystemMessage);
        assert!(msg.sender.is_none());
        assert_eq!(msg.to_string(), format!("[{}] * Ready", msg.timestamp));
    }

    proptest! {
        #[test]
        fn clamped_position_is_always_in_bounds(
            x in any::<i32>(),
            y in any::<i32>(),
            width in 1u32..=50,
            height in 1u32..=50,
        ) {
            let pos = Position::new(x, y).clamped(width, height);
            prop_assert!(pos.within(width, height));
        }
    }
}
