//! In-process transport: every peer lives in the same process and frames are
//! moved through the peers' event queues directly

use super::{Channel, ChannelId, EventSender, PeerEvent, Rendezvous, SignalingError};
use crate::connection::ConnectionError;
use log::{debug, info};
use shared::PeerId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Hub {
    next_id: u32,
    peers: HashMap<PeerId, EventSender>,
    refuse_identities: bool,
}

/// Shared rendezvous point for peers running in one process.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn hub(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a rendezvous handle whose inbound events go to `events`.
    pub fn endpoint(&self, events: EventSender) -> MemoryRendezvous {
        MemoryRendezvous {
            network: self.clone(),
            events,
            identity: None,
        }
    }

    /// Makes every following identity request fail until switched back.
    pub fn refuse_identities(&self, refuse: bool) {
        self.hub().refuse_identities = refuse;
    }

    pub fn peer_count(&self) -> usize {
        self.hub().peers.len()
    }
}

pub struct MemoryRendezvous {
    network: MemoryNetwork,
    events: EventSender,
    identity: Option<PeerId>,
}

impl MemoryRendezvous {
    pub fn identity(&self) -> Option<&PeerId> {
        self.identity.as_ref()
    }
}

impl Rendezvous for MemoryRendezvous {
    async fn request_identity(&mut self) -> Result<PeerId, SignalingError> {
        let peer_id = {
            let mut hub = self.network.hub();
            if hub.refuse_identities {
                return Err(SignalingError::Rejected(
                    "identity allocation unavailable".to_string(),
                ));
            }
            hub.next_id += 1;
            let peer_id = PeerId::new(format!("peer-{}", hub.next_id));
            hub.peers.insert(peer_id.clone(), self.events.clone());
            peer_id
        };

        info!("Assigned in-memory identity {}", peer_id);
        self.identity = Some(peer_id.clone());
        Ok(peer_id)
    }

    async fn connect(&mut self, remote: &PeerId) -> Result<Box<dyn Channel>, SignalingError> {
        let local = self.identity.clone().ok_or(SignalingError::NoIdentity)?;
        let remote_events = self
            .network
            .hub()
            .peers
            .get(remote)
            .cloned()
            .ok_or_else(|| SignalingError::UnknownPeer(remote.clone()))?;

        let id = ChannelId::next();
        let open = Arc::new(AtomicBool::new(true));
        let inbound = MemoryChannel {
            id,
            remote: local.clone(),
            local: remote.clone(),
            sink: self.events.clone(),
            open: Arc::clone(&open),
        };

        remote_events
            .send(PeerEvent::Opened(Box::new(inbound)))
            .map_err(|_| SignalingError::UnknownPeer(remote.clone()))?;

        debug!("{} opened in-memory channel to {}", local, remote);
        Ok(Box::new(MemoryChannel {
            id,
            remote: remote.clone(),
            local,
            sink: remote_events,
            open,
        }))
    }
}

/// One direction of an in-memory connection. Both directions share the
/// `open` flag, so closing either side closes the pair, and the id, so each
/// side's events name the channel the receiving side holds.
pub struct MemoryChannel {
    id: ChannelId,
    remote: PeerId,
    local: PeerId,
    sink: EventSender,
    open: Arc<AtomicBool>,
}

impl Channel for MemoryChannel {
    fn remote_peer(&self) -> &PeerId {
        &self.remote
    }

    fn id(&self) -> ChannelId {
        self.id
    }

    fn send(&self, payload: Vec<u8>) -> Result<(), ConnectionError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(ConnectionError::Closed(self.remote.clone()));
        }
        self.sink
            .send(PeerEvent::Data {
                from: self.local.clone(),
                channel: self.id,
                payload,
            })
            .map_err(|_| ConnectionError::Closed(self.remote.clone()))
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.sink.send(PeerEvent::Closed {
                peer: self.local.clone(),
                channel: self.id,
            });
        }
    }
}
