//! Connection lifecycle and the registry of live peer channels
//!
//! This module owns every channel the local peer holds:
//! - Registration of inbound and outbound connections
//! - The `Connecting -> Connected -> Disconnected` state machine
//! - Removal on close, whether we or the remote side closed
//!
//! The registry is the only place connections are added or removed. Other
//! components enumerate it to find broadcast targets, always as a snapshot
//! taken inside a single event-loop step.

use crate::transport::{Channel, ChannelId};
use log::{debug, info, warn};
use shared::PeerId;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("channel to {0} is closed")]
    Closed(PeerId),
    #[error("no open connection to {0}")]
    UnknownPeer(PeerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// One direct channel to a remote peer
pub struct Connection {
    /// Identity of the peer at the other end
    remote: PeerId,
    status: ConnectionStatus,
    channel: Box<dyn Channel>,
}

impl Connection {
    fn new(channel: Box<dyn Channel>, status: ConnectionStatus) -> Self {
        Self {
            remote: channel.remote_peer().clone(),
            status,
            channel,
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel.id()
    }

    pub fn remote_peer(&self) -> &PeerId {
        &self.remote
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Hands a frame to the channel. See [`Channel::send`].
    pub fn send(&self, payload: Vec<u8>) -> Result<(), ConnectionError> {
        self.channel.send(payload)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("remote", &self.remote)
            .field("channel", &self.channel.id())
            .field("status", &self.status)
            .finish()
    }
}

/// All channels the local peer currently holds, keyed by remote identity.
///
/// Disconnected connections are never kept: the transition to
/// `Disconnected` and the removal happen in the same step, so the registry
/// reflects exactly the channels that are still open.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<PeerId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an inbound connection. There is no admission control: the
    /// connection is `Connected` immediately.
    ///
    /// A second connection from the same peer replaces the first one, whose
    /// channel is closed.
    pub fn accept(&mut self, channel: Box<dyn Channel>) -> PeerId {
        let connection = Connection::new(channel, ConnectionStatus::Connected);
        let remote = connection.remote.clone();
        info!("Accepted connection from {}", remote);
        self.insert(connection);
        remote
    }

    /// Registers an outbound connection we dialed; it stays `Connecting`
    /// until [`mark_connected`](Self::mark_connected).
    pub fn begin(&mut self, channel: Box<dyn Channel>) -> PeerId {
        let connection = Connection::new(channel, ConnectionStatus::Connecting);
        let remote = connection.remote.clone();
        info!("Connecting to {}", remote);
        self.insert(connection);
        remote
    }

    fn insert(&mut self, connection: Connection) {
        if let Some(previous) = self
            .connections
            .insert(connection.remote.clone(), connection)
        {
            warn!("Replacing existing connection to {}", previous.remote);
            previous.channel.close();
        }
    }

    /// Returns false if the peer is unknown or already connected.
    pub fn mark_connected(&mut self, peer: &PeerId) -> bool {
        match self.connections.get_mut(peer) {
            Some(connection) if connection.status == ConnectionStatus::Connecting => {
                connection.status = ConnectionStatus::Connected;
                info!("Connected to {}", peer);
                true
            }
            _ => false,
        }
    }

    /// Closes a connection from our side and removes it.
    pub fn close(&mut self, peer: &PeerId) -> Option<ConnectionStatus> {
        let mut connection = self.connections.remove(peer)?;
        connection.channel.close();
        connection.status = ConnectionStatus::Disconnected;
        info!("Closed connection to {}", peer);
        Some(connection.status)
    }

    /// Handles the remote side (or the transport) closing `channel`.
    ///
    /// Returns false if the connection was already gone, or if `channel` was
    /// replaced by a newer connection from the same peer, which stays open.
    pub fn handle_closed(&mut self, peer: &PeerId, channel: ChannelId) -> bool {
        if !self.owns(peer, channel) {
            debug!("Ignoring close of stale channel {} from {}", channel, peer);
            return false;
        }
        match self.connections.remove(peer) {
            Some(mut connection) => {
                connection.status = ConnectionStatus::Disconnected;
                info!("Connection to {} closed by remote", peer);
                true
            }
            None => false,
        }
    }

    /// Whether `channel` is the registered channel to `peer`.
    pub fn owns(&self, peer: &PeerId, channel: ChannelId) -> bool {
        self.connections
            .get(peer)
            .is_some_and(|connection| connection.channel_id() == channel)
    }

    /// Closes every connection. Used on shutdown.
    pub fn close_all(&mut self) -> usize {
        let peers: Vec<PeerId> = self.connections.keys().cloned().collect();
        for peer in &peers {
            self.close(peer);
        }
        peers.len()
    }

    /// Status of the connection to `peer`; unknown peers are `Disconnected`.
    pub fn status(&self, peer: &PeerId) -> ConnectionStatus {
        self.connections
            .get(peer)
            .map(Connection::status)
            .unwrap_or(ConnectionStatus::Disconnected)
    }

    pub fn send_to(&self, peer: &PeerId, payload: Vec<u8>) -> Result<(), ConnectionError> {
        match self.connections.get(peer) {
            Some(connection) if connection.is_connected() => connection.send(payload),
            _ => Err(ConnectionError::UnknownPeer(peer.clone())),
        }
    }

    /// Connections currently eligible as broadcast targets.
    pub fn connected(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(|c| c.is_connected())
    }

    /// Snapshot of connected peer ids, sorted for stable display.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.connected().map(|c| c.remote.clone()).collect();
        peers.sort();
        peers
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every frame and close call instead of transmitting.
    #[derive(Clone, Default)]
    pub(crate) struct Outbox {
        pub frames: Arc<Mutex<Vec<Vec<u8>>>>,
        pub closed: Arc<Mutex<bool>>,
        pub fail: bool,
    }

    pub(crate) struct RecordingChannel {
        id: ChannelId,
        remote: PeerId,
        outbox: Outbox,
    }

    impl Channel for RecordingChannel {
        fn remote_peer(&self) -> &PeerId {
            &self.remote
        }

        fn id(&self) -> ChannelId {
            self.id
        }

        fn send(&self, payload: Vec<u8>) -> Result<(), ConnectionError> {
            if self.outbox.fail {
                return Err(ConnectionError::Closed(self.remote.clone()));
            }
            self.outbox.frames.lock().unwrap().push(payload);
            Ok(())
        }

        fn close(&self) {
            *self.outbox.closed.lock().unwrap() = true;
        }
    }

    pub(crate) fn recording(remote: &str) -> (Box<dyn Channel>, Outbox) {
        let outbox = Outbox::default();
        let channel = RecordingChannel {
            id: ChannelId::next(),
            remote: PeerId::new(remote),
            outbox: outbox.clone(),
        };
        (Box::new(channel), outbox)
    }

    pub(crate) fn failing(remote: &str) -> Box<dyn Channel> {
        Box::new(RecordingChannel {
            id: ChannelId::next(),
            remote: PeerId::new(remote),
            outbox: Outbox {
                fail: true,
                ..Outbox::default()
            },
        })
    }

    #[test]
    fn test_registry_creation() {
        let registry = ConnectionRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.connected_peers().is_empty());
    }

    #[test]
    fn test_accept_is_connected_immediately() {
        let mut registry = ConnectionRegistry::new();
        let (channel, _) = recording("peer-a");

        let peer = registry.accept(channel);
        assert_eq!(peer, PeerId::new("peer-a"));
        assert_eq!(registry.status(&peer), ConnectionStatus::Connected);
        assert_eq!(registry.connected_peers(), vec![peer]);
    }

    #[test]
    fn test_outbound_connection_lifecycle() {
        let mut registry = ConnectionRegistry::new();
        let (channel, outbox) = recording("host");

        let peer = registry.begin(channel);
        assert_eq!(registry.status(&peer), ConnectionStatus::Connecting);
        assert_eq!(registry.connected().count(), 0);
        assert!(registry.send_to(&peer, b"early".to_vec()).is_err());

        assert!(registry.mark_connected(&peer));
        assert!(!registry.mark_connected(&peer));
        assert_eq!(registry.status(&peer), ConnectionStatus::Connected);

        assert_eq!(registry.close(&peer), Some(ConnectionStatus::Disconnected));
        assert_eq!(registry.status(&peer), ConnectionStatus::Disconnected);
        assert!(registry.is_empty());
        assert!(*outbox.closed.lock().unwrap());
    }

    #[test]
    fn test_remote_close_removes_connection() {
        let mut registry = ConnectionRegistry::new();
        let (channel, outbox) = recording("peer-a");
        let id = channel.id();
        let peer = registry.accept(channel);

        assert!(registry.handle_closed(&peer, id));
        assert!(!registry.handle_closed(&peer, id));
        assert!(registry.is_empty());
        assert!(!*outbox.closed.lock().unwrap());
    }

    #[test]
    fn test_close_unknown_peer() {
        let mut registry = ConnectionRegistry::new();
        assert_eq!(registry.close(&PeerId::new("ghost")), None);
    }

    #[test]
    fn test_reconnect_replaces_previous_channel() {
        let mut registry = ConnectionRegistry::new();
        let (first, first_outbox) = recording("peer-a");
        let (second, second_outbox) = recording("peer-a");

        registry.accept(first);
        registry.accept(second);

        assert_eq!(registry.len(), 1);
        assert!(*first_outbox.closed.lock().unwrap());

        registry
            .send_to(&PeerId::new("peer-a"), b"hi".to_vec())
            .unwrap();
        assert!(first_outbox.frames.lock().unwrap().is_empty());
        assert_eq!(second_outbox.frames.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_close_of_replaced_channel_is_ignored() {
        let mut registry = ConnectionRegistry::new();
        let (first, _) = recording("peer-a");
        let (second, second_outbox) = recording("peer-a");
        let (first_id, second_id) = (first.id(), second.id());
        let peer = registry.accept(first);
        registry.accept(second);

        assert!(!registry.handle_closed(&peer, first_id));
        assert!(!registry.owns(&peer, first_id));
        assert!(registry.owns(&peer, second_id));
        assert_eq!(registry.connected_peers(), vec![peer.clone()]);

        registry.send_to(&peer, b"still open".to_vec()).unwrap();
        assert_eq!(second_outbox.frames.lock().unwrap().len(), 1);

        assert!(registry.handle_closed(&peer, second_id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_send_to_unknown_peer() {
        let registry = ConnectionRegistry::new();
        assert_eq!(
            registry.send_to(&PeerId::new("ghost"), Vec::new()),
            Err(ConnectionError::UnknownPeer(PeerId::new("ghost")))
        );
    }

    #[test]
    fn test_close_all() {
        let mut registry = ConnectionRegistry::new();
        let (a, a_outbox) = recording("peer-a");
        let (b, b_outbox) = recording("peer-b");
        registry.accept(a);
        registry.accept(b);

        assert_eq!(registry.close_all(), 2);
        assert!(registry.is_empty());
        assert!(*a_outbox.closed.lock().unwrap());
        assert!(*b_outbox.closed.lock().unwrap());
    }

    #[test]
    fn test_connected_peers_sorted() {
        let mut registry = ConnectionRegistry::new();
        for name in ["peer-c", "peer-a", "peer-b"] {
            registry.accept(recording(name).0);
        }
        let peers: Vec<String> = registry
            .connected_peers()
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(peers, vec!["peer-a", "peer-b", "peer-c"]);
    }
}
