//! The seam between the tabletop core and whatever moves bytes between peers
//!
//! The core only ever sees two things from a transport: a [`Rendezvous`]
//! that hands out identities and dials other peers, and [`Channel`]s that
//! accept outbound frames. Everything inbound arrives as [`PeerEvent`]s on
//! the peer's single event queue, which keeps all state mutation on one
//! logical thread.

pub mod memory;
pub mod net;

use crate::connection::ConnectionError;
use shared::PeerId;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("rendezvous service rejected the request: {0}")]
    Rejected(String),
    #[error("no identity has been assigned yet")]
    NoIdentity,
    #[error("peer {0} is not known to the rendezvous service")]
    UnknownPeer(PeerId),
    #[error("timed out waiting for the rendezvous service")]
    Timeout,
    #[error("unexpected signaling reply: {0}")]
    UnexpectedReply(String),
    #[error("signaling I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("signaling codec failed: {0}")]
    Codec(#[from] bincode::Error),
}

/// Tells successive channels to the same remote peer apart, so events from
/// a replaced channel can be recognized as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    /// A process-wide unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that happened on the wire, queued for the peer's event loop.
///
/// `channel` is the [`Channel::id`] of the local channel the event belongs to.
pub enum PeerEvent {
    /// A remote peer dialed us and completed its handshake.
    Opened(Box<dyn Channel>),
    Data {
        from: PeerId,
        channel: ChannelId,
        payload: Vec<u8>,
    },
    Closed {
        peer: PeerId,
        channel: ChannelId,
    },
}

impl fmt::Debug for PeerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerEvent::Opened(channel) => {
                write!(f, "Opened({} {})", channel.remote_peer(), channel.id())
            }
            PeerEvent::Data {
                from,
                channel,
                payload,
            } => write!(
                f,
                "Data {{ from: {} {}, len: {} }}",
                from,
                channel,
                payload.len()
            ),
            PeerEvent::Closed { peer, channel } => write!(f, "Closed({} {})", peer, channel),
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<PeerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PeerEvent>;

pub fn event_queue() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Outbound half of a direct connection to one remote peer.
pub trait Channel: Send {
    fn remote_peer(&self) -> &PeerId;

    /// Carried by every data and close event this channel produces.
    fn id(&self) -> ChannelId;

    /// Hands one encoded frame to the transport without waiting.
    ///
    /// `Ok` only means the transport accepted the frame locally; nothing is
    /// acknowledged end to end.
    fn send(&self, payload: Vec<u8>) -> Result<(), ConnectionError>;

    /// Closes the connection from our side. The remote sees a close event.
    fn close(&self);
}

/// Identity allocation and connection brokering.
pub trait Rendezvous {
    fn request_identity(&mut self) -> impl Future<Output = Result<PeerId, SignalingError>> + Send;

    fn connect(
        &mut self,
        remote: &PeerId,
    ) -> impl Future<Output = Result<Box<dyn Channel>, SignalingError>> + Send;
}
