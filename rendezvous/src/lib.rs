//! # Rendezvous Server Library
//!
//! The introduction service for tabletop peers. It hands out peer
//! identities and tells a peer where another peer accepts direct streams.
//! Once two peers are connected it is out of the picture: no tabletop
//! message ever passes through it.
//!
//! ## Protocol
//!
//! Peers speak bincode [`shared::SignalPacket`]s over UDP:
//! - `Register { listen_addr }` is answered with `Assigned { peer_id }`, or
//!   `Rejected` when the server is full
//! - `Lookup { peer_id }` is answered with `Located` or `NotFound`
//! - `Heartbeat` keeps a registration alive and gets no answer
//! - `Unregister` drops the registration
//!
//! ## Architecture Design
//!
//! A receiver task decodes datagrams and a timeout task sweeps the
//! directory; both feed one queue that the main loop drains, so directory
//! changes and replies happen in arrival order.
//!
//! ## Module Organization
//!
//! ### Directory Module (`directory`)
//! - Identity allocation with a capacity limit
//! - Listen address per peer
//! - Liveness tracking and eviction
//!
//! ### Network Module (`network`)
//! - UDP socket management and packet dispatch
//! - Background receiver and timeout tasks

pub mod directory;
pub mod network;

pub use directory::{PeerDirectory, PeerEntry};
pub use network::{Server, ServerMessage};
