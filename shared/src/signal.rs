//! Signaling packets between peers and the rendezvous service

use crate::model::PeerId;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum SignalPacket {
    /// Ask for an identity; `listen_addr` is where the peer accepts direct streams.
    Register {
        listen_addr: SocketAddr,
    },
    Lookup {
        peer_id: PeerId,
    },
    Heartbeat,
    Unregister,

    Assigned {
        peer_id: PeerId,
    },
    Rejected {
        reason: String,
    },
    Located {
        peer_id: PeerId,
        addr: SocketAddr,
    },
    NotFound {
        peer_id: PeerId,
    },
}

impl SignalPacket {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// First frame on a direct peer stream, sent by the dialing side.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub peer_id: PeerId,
}

impl Handshake {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
