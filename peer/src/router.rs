//! Message routing: outbound broadcast and inbound dispatch
//!
//! Broadcast encodes a message once and offers the same bytes to every
//! connected peer. Dispatch decodes a frame and applies it to exactly one
//! local handler; the handler chosen depends only on the decoded message,
//! never on who sent it or when.

use crate::chat::ChatLog;
use crate::connection::ConnectionRegistry;
use crate::dice::roll_text;
use crate::whiteboard::WhiteboardState;
use log::{debug, warn};
use shared::{
    decode, local_timestamp, ChatKind, ChatMessage, Inbound, Message, MessageId, PeerId,
    RawMessage,
};

/// The local handler an inbound message ends up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Chat,
    DiceRoll,
    TokenMove,
    BackgroundUpdate,
    SystemMessage,
    /// Unrecognized message that still carried text; shown as chat.
    TextFallback,
    Dropped,
}

/// Local outcome of a broadcast: how many hand-offs were tried and how
/// many the transport refused. Says nothing about delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub failed: usize,
}

impl BroadcastReport {
    pub fn delivered_locally(&self) -> usize {
        self.attempted - self.failed
    }
}

pub fn route_of(inbound: &Inbound) -> Route {
    match inbound {
        Inbound::Recognized(Message::Chat(_)) => Route::Chat,
        Inbound::Recognized(Message::DiceRoll(_)) => Route::DiceRoll,
        Inbound::Recognized(Message::TokenMove(_)) => Route::TokenMove,
        Inbound::Recognized(Message::BackgroundUpdate(_)) => Route::BackgroundUpdate,
        Inbound::Recognized(Message::SystemMessage(_)) => Route::SystemMessage,
        Inbound::Unrecognized(raw) if raw.text().is_some() => Route::TextFallback,
        Inbound::Unrecognized(_) => Route::Dropped,
    }
}

/// Sends `message` to every connected peer except `local`.
pub fn broadcast(
    registry: &ConnectionRegistry,
    local: &PeerId,
    message: &Message,
) -> Result<BroadcastReport, serde_json::Error> {
    let payload = message.encode()?;
    let mut report = BroadcastReport::default();

    for connection in registry.connected() {
        if connection.remote_peer() == local {
            continue;
        }
        report.attempted += 1;
        if let Err(e) = connection.send(payload.clone()) {
            warn!("Failed to hand {} to transport: {}", message.wire_type(), e);
            report.failed += 1;
        }
    }

    debug!(
        "Broadcast {} ({} bytes) to {} peers",
        message.wire_type(),
        payload.len(),
        report.attempted
    );
    Ok(report)
}

/// The chat log entry a message produces, if any.
///
/// Chat, dice and system messages always produce one; token moves and
/// background updates only when they carry text. Entries without a wire id
/// get a fresh one.
pub fn chat_record(message: &Message) -> Option<ChatMessage> {
    match message {
        Message::Chat(chat) => Some(ChatMessage {
            id: chat.id.clone(),
            kind: ChatKind::Chat,
            sender: Some(chat.sender.clone()),
            sender_name: Some(chat.sender_name.clone()),
            text: chat.text.clone(),
            timestamp: chat.timestamp.clone(),
        }),
        Message::DiceRoll(roll) => Some(ChatMessage {
            id: roll.id.clone().unwrap_or_else(MessageId::generate),
            kind: ChatKind::DiceRoll,
            sender: Some(roll.sender.clone()),
            sender_name: Some(roll.sender_name.clone()),
            text: roll
                .text
                .clone()
                .unwrap_or_else(|| roll_text(&roll.sender_name, &roll.dice_type, roll.result)),
            timestamp: roll.timestamp.clone().unwrap_or_else(local_timestamp),
        }),
        Message::SystemMessage(system) => Some(ChatMessage {
            id: system.id.clone().unwrap_or_else(MessageId::generate),
            kind: ChatKind::SystemMessage,
            sender: None,
            sender_name: None,
            text: system.text.clone(),
            timestamp: system.timestamp.clone(),
        }),
        Message::TokenMove(_) | Message::BackgroundUpdate(_) => {
            let text = message.text()?.to_string();
            Some(ChatMessage {
                id: MessageId::generate(),
                kind: message.kind(),
                sender: message.sender().cloned(),
                sender_name: None,
                text,
                timestamp: local_timestamp(),
            })
        }
    }
}

fn fallback_record(raw: &RawMessage, from: &PeerId) -> Option<ChatMessage> {
    let text = raw.text()?.to_string();
    Some(ChatMessage {
        id: raw.id().unwrap_or_else(MessageId::generate),
        kind: ChatKind::Chat,
        sender: Some(raw.sender().unwrap_or_else(|| from.clone())),
        sender_name: raw.sender_name(),
        text,
        timestamp: raw.timestamp().unwrap_or_else(local_timestamp),
    })
}

/// Applies one decoded message received from `from`.
pub fn dispatch(
    inbound: Inbound,
    from: &PeerId,
    whiteboard: &mut WhiteboardState,
    chat: &mut ChatLog,
) -> Route {
    let route = route_of(&inbound);

    match inbound {
        Inbound::Recognized(message) => {
            match &message {
                Message::TokenMove(token_move) => {
                    let stored = whiteboard.apply_remote_move(&token_move.token_id, token_move.position);
                    debug!("{} moved {} to {}", from, token_move.token_id, stored);
                }
                Message::BackgroundUpdate(update) => {
                    debug!("{} replaced the background ({} bytes)", from, update.image.len());
                    whiteboard.set_background(update.image.clone());
                }
                Message::Chat(_) | Message::DiceRoll(_) | Message::SystemMessage(_) => {}
            }
            if let Some(record) = chat_record(&message) {
                chat.append(record);
            }
        }
        Inbound::Unrecognized(raw) => match fallback_record(&raw, from) {
            Some(record) => {
                debug!(
                    "Showing unrecognized {} from {} as chat",
                    raw.kind.as_deref().unwrap_or("untyped message"),
                    from
                );
                chat.append(record);
            }
            None => warn!(
                "Dropping {} from {} without text",
                raw.kind.as_deref().unwrap_or("untyped message"),
                from
            ),
        },
    }

    route
}

/// Decodes and applies one raw frame. Malformed frames are logged and dropped.
pub fn dispatch_frame(
    payload: &[u8],
    from: &PeerId,
    whiteboard: &mut WhiteboardState,
    chat: &mut ChatLog,
) -> Route {
    match decode(payload) {
        Ok(inbound) => dispatch(inbound, from, whiteboard, chat),
        Err(e) => {
            warn!("Dropping malformed frame from {}: {}", from, e);
            Route::Dropped
        }
    }
}
