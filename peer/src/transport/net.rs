//! Network transport: UDP signaling with a rendezvous server, direct TCP
//! streams between peers

use super::{Channel, ChannelId, EventSender, PeerEvent, Rendezvous, SignalingError};
use crate::connection::ConnectionError;
use log::{debug, error, info, warn};
use shared::{Handshake, PeerId, SignalPacket, FRAME_HEADER_LEN, MAX_SIGNAL_PACKET};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, timeout_at, Instant};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);
/// Largest handshake a dialing peer may send before it is known.
pub const MAX_HANDSHAKE_FRAME: usize = 1024;
/// Up-front buffer reservation when reading a frame; the rest grows as bytes arrive.
const READ_CHUNK: usize = 64 * 1024;

/// Reads one length-prefixed frame of any size.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    read_frame_limited(reader, u32::MAX as usize).await
}

/// Reads one length-prefixed frame, refusing headers that announce more
/// than `limit` bytes.
pub async fn read_frame_limited<R: AsyncRead + Unpin>(
    reader: &mut R,
    limit: usize,
) -> io::Result<Vec<u8>> {
    let len = reader.read_u32().await? as usize;
    if len > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds limit of {}", len, limit),
        ));
    }

    let mut frame = Vec::with_capacity(len.min(READ_CHUNK));
    (&mut *reader).take(len as u64).read_to_end(&mut frame).await?;
    if frame.len() < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream ended inside a frame",
        ));
    }
    Ok(frame)
}

/// Writes one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> io::Result<()> {
    let len = u32::try_from(frame.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame exceeds u32 length"))?;
    let mut header = [0u8; FRAME_HEADER_LEN];
    header.copy_from_slice(&len.to_be_bytes());
    writer.write_all(&header).await?;
    writer.write_all(frame).await?;
    writer.flush().await
}

enum Outbound {
    Frame(Vec<u8>),
    Close,
}

/// A direct TCP stream to one remote peer.
///
/// Frames are queued to a writer task so `send` never blocks the event
/// loop; a reader task forwards inbound frames and finally a close event.
pub struct TcpChannel {
    id: ChannelId,
    remote: PeerId,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl TcpChannel {
    /// Starts the writer task. The returned reader must be spawned by the
    /// caller once the channel itself has been handed over, so no data
    /// event can overtake the open event.
    fn start(
        stream: TcpStream,
        remote: PeerId,
        events: EventSender,
    ) -> (Self, impl Future<Output = ()> + Send + 'static) {
        let id = ChannelId::next();
        let (reader, writer) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::write_loop(writer, outbound_rx, remote.clone()));
        let read = Self::read_loop(reader, remote.clone(), id, events);

        (
            Self {
                id,
                remote,
                outbound,
            },
            read,
        )
    }

    async fn write_loop(
        mut writer: OwnedWriteHalf,
        mut outbound: mpsc::UnboundedReceiver<Outbound>,
        remote: PeerId,
    ) {
        while let Some(message) = outbound.recv().await {
            match message {
                Outbound::Frame(frame) => {
                    if let Err(e) = write_frame(&mut writer, &frame).await {
                        warn!("Failed to write frame to {}: {}", remote, e);
                        break;
                    }
                }
                Outbound::Close => break,
            }
        }
        let _ = writer.shutdown().await;
    }

    async fn read_loop(
        mut reader: OwnedReadHalf,
        remote: PeerId,
        channel: ChannelId,
        events: EventSender,
    ) {
        loop {
            match read_frame(&mut reader).await {
                Ok(payload) => {
                    let event = PeerEvent::Data {
                        from: remote.clone(),
                        channel,
                        payload,
                    };
                    if events.send(event).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    debug!("Stream {} from {} ended: {}", channel, remote, e);
                    break;
                }
            }
        }
        let _ = events.send(PeerEvent::Closed {
            peer: remote,
            channel,
        });
    }
}

impl Channel for TcpChannel {
    fn remote_peer(&self) -> &PeerId {
        &self.remote
    }

    fn id(&self) -> ChannelId {
        self.id
    }

    fn send(&self, payload: Vec<u8>) -> Result<(), ConnectionError> {
        self.outbound
            .send(Outbound::Frame(payload))
            .map_err(|_| ConnectionError::Closed(self.remote.clone()))
    }

    fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Rendezvous over UDP plus a TCP listener for inbound peer streams.
pub struct NetRendezvous {
    socket: Arc<UdpSocket>,
    server: SocketAddr,
    listen_addr: SocketAddr,
    identity: Option<PeerId>,
    events: EventSender,
    listener_task: JoinHandle<()>,
}

impl NetRendezvous {
    /// Binds the signaling socket and the peer listener. Inbound streams are
    /// accepted unconditionally and reported as [`PeerEvent::Opened`].
    pub async fn bind(
        server: &str,
        listen: &str,
        events: EventSender,
    ) -> Result<Self, SignalingError> {
        let server = lookup_host(server).await?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "rendezvous address did not resolve")
        })?;
        let bind_addr = if server.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);

        let listener = TcpListener::bind(listen).await?;
        let listen_addr = listener.local_addr()?;
        info!("Accepting peer streams on {}", listen_addr);

        let listener_task = tokio::spawn(Self::accept_loop(listener, events.clone()));

        Ok(Self {
            socket,
            server,
            listen_addr,
            identity: None,
            events,
            listener_task,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn identity(&self) -> Option<&PeerId> {
        self.identity.as_ref()
    }

    async fn accept_loop(listener: TcpListener, events: EventSender) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let events = events.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::accept_stream(stream, events).await {
                            warn!("Rejected stream from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting peer stream: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    async fn accept_stream(mut stream: TcpStream, events: EventSender) -> Result<(), SignalingError> {
        let hello = timeout(
            REQUEST_TIMEOUT,
            read_frame_limited(&mut stream, MAX_HANDSHAKE_FRAME),
        )
            .await
            .map_err(|_| SignalingError::Timeout)??;
        let handshake = Handshake::decode(&hello)?;
        let _ = stream.set_nodelay(true);

        debug!("Handshake from {}", handshake.peer_id);
        let (channel, read) = TcpChannel::start(stream, handshake.peer_id, events.clone());
        if events.send(PeerEvent::Opened(Box::new(channel))).is_ok() {
            tokio::spawn(read);
        }
        Ok(())
    }

    /// Sends one request and waits for the server's reply.
    ///
    /// Replies to earlier requests that timed out may still be queued on the
    /// socket; anything that does not answer `packet` is skipped.
    async fn request(&self, packet: &SignalPacket) -> Result<SignalPacket, SignalingError> {
        let data = packet.encode()?;
        self.socket.send_to(&data, self.server).await?;

        let deadline = Instant::now() + REQUEST_TIMEOUT;
        let mut buffer = [0u8; MAX_SIGNAL_PACKET];
        loop {
            let (len, addr) = timeout_at(deadline, self.socket.recv_from(&mut buffer))
                .await
                .map_err(|_| SignalingError::Timeout)??;
            if addr != self.server {
                warn!("Ignoring signaling packet from unexpected address {}", addr);
                continue;
            }
            let reply = SignalPacket::decode(&buffer[..len])?;
            if answers(packet, &reply) {
                return Ok(reply);
            }
            debug!("Skipping stale signaling reply {:?}", reply);
        }
    }

    async fn locate(&self, remote: &PeerId) -> Result<SocketAddr, SignalingError> {
        let lookup = SignalPacket::Lookup {
            peer_id: remote.clone(),
        };
        match self.request(&lookup).await? {
            SignalPacket::Located { addr, .. } => Ok(addr),
            SignalPacket::NotFound { peer_id } => Err(SignalingError::UnknownPeer(peer_id)),
            other => Err(SignalingError::UnexpectedReply(format!("{:?}", other))),
        }
    }

    /// Keeps our directory entry alive until the returned task is aborted.
    pub fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let server = self.server;

        tokio::spawn(async move {
            let mut ticker = interval(HEARTBEAT_INTERVAL);
            let data = match SignalPacket::Heartbeat.encode() {
                Ok(data) => data,
                Err(e) => {
                    error!("Failed to encode heartbeat: {}", e);
                    return;
                }
            };

            loop {
                ticker.tick().await;
                if let Err(e) = socket.send_to(&data, server).await {
                    warn!("Failed to send heartbeat: {}", e);
                }
            }
        })
    }

    /// Tells the server we are leaving. Best effort.
    pub async fn unregister(&self) {
        if let Ok(data) = SignalPacket::Unregister.encode() {
            let _ = self.socket.send_to(&data, self.server).await;
        }
    }
}

/// Whether `reply` is a possible answer to `request`.
fn answers(request: &SignalPacket, reply: &SignalPacket) -> bool {
    match (request, reply) {
        (SignalPacket::Register { .. }, SignalPacket::Assigned { .. })
        | (SignalPacket::Register { .. }, SignalPacket::Rejected { .. }) => true,
        (SignalPacket::Lookup { peer_id }, SignalPacket::Located { peer_id: found, .. })
        | (SignalPacket::Lookup { peer_id }, SignalPacket::NotFound { peer_id: found }) => {
            peer_id == found
        }
        _ => false,
    }
}

impl Drop for NetRendezvous {
    fn drop(&mut self) {
        self.listener_task.abort();
    }
}

impl Rendezvous for NetRendezvous {
    async fn request_identity(&mut self) -> Result<PeerId, SignalingError> {
        let register = SignalPacket::Register {
            listen_addr: self.listen_addr,
        };
        match self.request(&register).await? {
            SignalPacket::Assigned { peer_id } => {
                info!("Rendezvous assigned identity {}", peer_id);
                self.identity = Some(peer_id.clone());
                Ok(peer_id)
            }
            SignalPacket::Rejected { reason } => Err(SignalingError::Rejected(reason)),
            other => Err(SignalingError::UnexpectedReply(format!("{:?}", other))),
        }
    }

    async fn connect(&mut self, remote: &PeerId) -> Result<Box<dyn Channel>, SignalingError> {
        let local = self.identity.clone().ok_or(SignalingError::NoIdentity)?;
        let addr = self.locate(remote).await?;

        let mut stream = timeout(REQUEST_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| SignalingError::Timeout)??;
        let _ = stream.set_nodelay(true);

        let hello = Handshake { peer_id: local }.encode()?;
        write_frame(&mut stream, &hello).await?;

        info!("Opened stream to {} at {}", remote, addr);
        let (channel, read) = TcpChannel::start(stream, remote.clone(), self.events.clone());
        tokio::spawn(read);
        Ok(Box::new(channel))
    }
}
