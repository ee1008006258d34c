//! Server network layer: UDP signaling and peer liveness

use crate::directory::PeerDirectory;
use log::{debug, error, info, warn};
use shared::{PeerId, SignalPacket, MAX_SIGNAL_PACKET};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// How often the directory is swept for silent peers
pub const TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: SignalPacket, addr: SocketAddr },
    PeerTimeout { peer_id: PeerId },
    Shutdown,
}

/// Rendezvous server handing out identities and peer addresses
pub struct Server {
    socket: Arc<UdpSocket>,
    directory: Arc<RwLock<PeerDirectory>>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_peers: usize,
        peer_timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Rendezvous server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            directory: Arc::new(RwLock::new(PeerDirectory::new(max_peers, peer_timeout))),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle for stopping [`run`](Self::run) from another task.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub async fn peer_count(&self) -> usize {
        self.directory.read().await.len()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_SIGNAL_PACKET];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match SignalPacket::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to decode packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that evicts peers whose heartbeats stopped
    fn spawn_timeout_checker(&self) {
        let directory = Arc::clone(&self.directory);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TIMEOUT_CHECK_INTERVAL);

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut directory = directory.write().await;
                    directory.check_timeouts()
                };

                for peer_id in timed_out {
                    if server_tx.send(ServerMessage::PeerTimeout { peer_id }).is_err() {
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet(&self, packet: &SignalPacket, addr: SocketAddr) {
        let data = match packet.encode() {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode {:?}: {}", packet, e);
                return;
            }
        };
        if let Err(e) = self.socket.send_to(&data, addr).await {
            error!("Failed to send packet to {}: {}", addr, e);
        }
    }

    /// Applies one signaling packet and returns the reply, if any.
    pub async fn handle_packet(
        &self,
        packet: SignalPacket,
        addr: SocketAddr,
    ) -> Option<SignalPacket> {
        let mut directory = self.directory.write().await;

        match packet {
            SignalPacket::Register { listen_addr } => Some(
                match directory.register(addr, listen_addr) {
                    Some(peer_id) => SignalPacket::Assigned { peer_id },
                    None => {
                        warn!("Rejecting {}: directory full", addr);
                        SignalPacket::Rejected {
                            reason: "rendezvous server is full".to_string(),
                        }
                    }
                },
            ),

            SignalPacket::Lookup { peer_id } => {
                directory.touch(addr);
                Some(match directory.lookup(&peer_id) {
                    Some(listen) => SignalPacket::Located {
                        peer_id,
                        addr: listen,
                    },
                    None => SignalPacket::NotFound { peer_id },
                })
            }

            SignalPacket::Heartbeat => {
                if !directory.touch(addr) {
                    debug!("Heartbeat from unregistered address {}", addr);
                }
                None
            }

            SignalPacket::Unregister => {
                if let Some(peer_id) = directory.find_by_signal_addr(addr) {
                    directory.remove(&peer_id);
                }
                None
            }

            other => {
                warn!("Unexpected packet {:?} from {}", other, addr);
                None
            }
        }
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_timeout_checker();

        info!("Rendezvous server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    if let Some(reply) = self.handle_packet(packet, addr).await {
                        self.send_packet(&reply, addr).await;
                    }
                }
                ServerMessage::PeerTimeout { peer_id } => {
                    debug!("Evicted {}", peer_id);
                }
                ServerMessage::Shutdown => break,
            }
        }

        info!("Rendezvous server shutting down");
        Ok(())
    }
}
