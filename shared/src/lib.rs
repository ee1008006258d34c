//! # Shared Tabletop Protocol
//!
//! Types and wire formats used by every participant of a tabletop mesh: the
//! peers themselves and the rendezvous service that introduces them.
//!
//! ## Protocols
//!
//! ### Tabletop messages (`message`)
//! JSON objects exchanged directly between peers. Each carries a `type` tag
//! (`CHAT`, `DICE_ROLL`, `TOKEN_MOVE`, `BACKGROUND_UPDATE`, `SYSTEM_MESSAGE`)
//! and camelCase payload fields. There is no version field; peers must agree
//! on the recognized set out-of-band. Unknown tags decode to an explicit
//! unrecognized value so receivers can still show any `text` they carry.
//!
//! ### Signaling packets (`signal`)
//! Compact bincode packets between a peer and the rendezvous service:
//! identity allocation, address lookup and liveness heartbeats. The first
//! frame of every direct peer stream is a bincode [`Handshake`].
//!
//! ## Data model (`model`)
//! Identifiers, tokens, grid positions and chat records. Identifiers are
//! random UUIDs so that ids minted independently on different peers do not
//! collide.
//!
//! ## Join descriptors (`descriptor`)
//! The shareable link `...?room=<roomId>&host=<hostPeerId>` handed around
//! out-of-band so new peers can find the host.

pub mod descriptor;
pub mod message;
pub mod model;
pub mod signal;

pub use descriptor::{DescriptorError, JoinDescriptor};
pub use message::{
    decode, BackgroundUpdate, Chat, DecodeError, DiceRoll, Inbound, Message, RawMessage,
    SystemMessage, TokenMove, RECOGNIZED_TYPES,
};
pub use model::{
    local_timestamp, ChatKind, ChatMessage, MessageId, PeerId, Position, RoomId, Session, Token,
    TokenId,
};
pub use signal::{Handshake, SignalPacket};

pub const DEFAULT_GRID_WIDTH: u32 = 10;
pub const DEFAULT_GRID_HEIGHT: u32 = 10;
pub const MAX_GRID_DIMENSION: u32 = 50;

pub const DEFAULT_RENDEZVOUS_PORT: u16 = 9000;
/// Largest signaling datagram either side will read.
pub const MAX_SIGNAL_PACKET: usize = 2048;
/// Peer streams prefix every frame with a big-endian `u32` length.
pub const FRAME_HEADER_LEN: usize = 4;
