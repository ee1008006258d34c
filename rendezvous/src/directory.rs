//! Registry of peers known to the rendezvous server
//!
//! This module tracks every peer that has asked for an identity:
//! - Identity allocation with a capacity limit
//! - Where each peer accepts direct streams, for lookups by other peers
//! - Liveness from heartbeats, and eviction of peers that went quiet
//!
//! Only addresses are kept here. Tabletop traffic never passes through the
//! server, so nothing about rooms or their contents is known.

use log::info;
use shared::PeerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// One registered peer
#[derive(Debug)]
pub struct PeerEntry {
    pub peer_id: PeerId,
    /// Source address of the peer's signaling socket
    pub signal_addr: SocketAddr,
    /// Address other peers dial for a direct stream
    pub listen_addr: SocketAddr,
    /// Last time any packet arrived from this peer
    pub last_seen: Instant,
}

impl PeerEntry {
    pub fn new(peer_id: PeerId, signal_addr: SocketAddr, listen_addr: SocketAddr) -> Self {
        Self {
            peer_id,
            signal_addr,
            listen_addr: advertised_addr(listen_addr, signal_addr),
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// A peer listening on a wildcard address is reachable on the IP its
/// signaling packets came from.
fn advertised_addr(listen: SocketAddr, signal: SocketAddr) -> SocketAddr {
    if listen.ip().is_unspecified() {
        SocketAddr::new(signal.ip(), listen.port())
    } else {
        listen
    }
}

pub struct PeerDirectory {
    peers: HashMap<PeerId, PeerEntry>,
    max_peers: usize,
    timeout: Duration,
}

impl PeerDirectory {
    pub fn new(max_peers: usize, timeout: Duration) -> Self {
        Self {
            peers: HashMap::new(),
            max_peers,
            timeout,
        }
    }

    /// Allocates a fresh identity. Returns `None` at capacity.
    ///
    /// A peer registering again from the same signaling address replaces its
    /// old entry and gets a new identity.
    pub fn register(&mut self, signal_addr: SocketAddr, listen_addr: SocketAddr) -> Option<PeerId> {
        if let Some(previous) = self.find_by_signal_addr(signal_addr) {
            info!("Peer {} re-registered from {}", previous, signal_addr);
            self.remove(&previous);
        }

        if self.peers.len() >= self.max_peers {
            return None;
        }

        let peer_id = PeerId::new(Uuid::new_v4().to_string());
        let entry = PeerEntry::new(peer_id.clone(), signal_addr, listen_addr);
        info!(
            "Peer {} registered from {}, listening on {}",
            peer_id, signal_addr, entry.listen_addr
        );
        self.peers.insert(peer_id.clone(), entry);

        Some(peer_id)
    }

    /// Where `peer_id` accepts direct streams.
    pub fn lookup(&self, peer_id: &PeerId) -> Option<SocketAddr> {
        self.peers.get(peer_id).map(|entry| entry.listen_addr)
    }

    /// Refreshes liveness for the peer behind `signal_addr`.
    pub fn touch(&mut self, signal_addr: SocketAddr) -> bool {
        match self
            .peers
            .values_mut()
            .find(|entry| entry.signal_addr == signal_addr)
        {
            Some(entry) => {
                entry.touch();
                true
            }
            None => false,
        }
    }

    pub fn find_by_signal_addr(&self, signal_addr: SocketAddr) -> Option<PeerId> {
        self.peers
            .values()
            .find(|entry| entry.signal_addr == signal_addr)
            .map(|entry| entry.peer_id.clone())
    }

    pub fn remove(&mut self, peer_id: &PeerId) -> bool {
        match self.peers.remove(peer_id) {
            Some(entry) => {
                info!("Peer {} left", entry.peer_id);
                true
            }
            None => false,
        }
    }

    /// Evicts peers not heard from within the timeout.
    pub fn check_timeouts(&mut self) -> Vec<PeerId> {
        let timeout = self.timeout;
        let timed_out: Vec<PeerId> = self
            .peers
            .values()
            .filter(|entry| entry.is_timed_out(timeout))
            .map(|entry| entry.peer_id.clone())
            .collect();

        for peer_id in &timed_out {
            info!("Peer {} timed out", peer_id);
            self.peers.remove(peer_id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
