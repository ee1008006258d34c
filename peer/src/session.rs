//! Session setup and the per-peer tabletop aggregate
//!
//! [`SessionManager`] talks to the rendezvous collaborator: it creates rooms,
//! joins them and renders the shareable link. [`Tabletop`] owns everything a
//! peer holds once it is in a room (connections, whiteboard and chat log)
//! and is the single place where events and local actions mutate them.

use crate::chat::ChatLog;
use crate::connection::ConnectionRegistry;
use crate::dice::{roll_text, DiceKind};
use crate::router::{self, BroadcastReport, Route};
use crate::transport::{Channel, PeerEvent, Rendezvous, SignalingError};
use crate::whiteboard::{random_color, WhiteboardError, WhiteboardState};
use log::{debug, error, info, warn};
use shared::{
    local_timestamp, BackgroundUpdate, Chat, ChatMessage, DescriptorError, DiceRoll,
    JoinDescriptor, Message, MessageId, PeerId, Position, RoomId, Session, SystemMessage, Token,
    TokenId, TokenMove,
};
use thiserror::Error;

pub const STATUS_READY: &str = "Ready";
pub const STATUS_CLOSED: &str = "Connection closed";

#[derive(Debug, Error)]
pub enum TabletopError {
    #[error(transparent)]
    Whiteboard(#[from] WhiteboardError),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result of joining a room: the identity we were given and the open
/// channel to the host.
pub struct Joined {
    pub session: Session,
    pub local_peer: PeerId,
    pub channel: Box<dyn Channel>,
}

pub struct SessionManager<R: Rendezvous> {
    rendezvous: R,
    base_url: String,
    local_peer: Option<PeerId>,
    session: Option<Session>,
}

impl<R: Rendezvous> SessionManager<R> {
    pub fn new(rendezvous: R, base_url: impl Into<String>) -> Self {
        Self {
            rendezvous,
            base_url: base_url.into(),
            local_peer: None,
            session: None,
        }
    }

    pub fn rendezvous(&self) -> &R {
        &self.rendezvous
    }

    pub fn local_peer(&self) -> Option<&PeerId> {
        self.local_peer.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Creates a new room with this peer as host.
    ///
    /// The room id is fixed before the identity request goes out. A failed
    /// request is logged and returned; it is never retried.
    pub async fn create_session(&mut self) -> Result<Session, SignalingError> {
        let room_id = RoomId::generate();

        let host_peer_id = match self.rendezvous.request_identity().await {
            Ok(peer_id) => peer_id,
            Err(e) => {
                error!("Could not create room {}: {}", room_id, e);
                return Err(e);
            }
        };

        let session = Session {
            room_id,
            host_peer_id: host_peer_id.clone(),
        };
        info!("Created room {} hosted by {}", session.room_id, host_peer_id);

        self.local_peer = Some(host_peer_id);
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Joins the room a descriptor points at by dialing its host.
    ///
    /// Nothing is transferred on join: the new peer starts with an empty
    /// whiteboard and chat log.
    pub async fn join_session(
        &mut self,
        descriptor: &JoinDescriptor,
    ) -> Result<Joined, SignalingError> {
        let local_peer = match self.rendezvous.request_identity().await {
            Ok(peer_id) => peer_id,
            Err(e) => {
                error!("Could not join room {}: {}", descriptor.room_id, e);
                return Err(e);
            }
        };
        self.local_peer = Some(local_peer.clone());

        let channel = match self.rendezvous.connect(&descriptor.host_peer_id).await {
            Ok(channel) => channel,
            Err(e) => {
                error!(
                    "Could not reach host {} of room {}: {}",
                    descriptor.host_peer_id, descriptor.room_id, e
                );
                return Err(e);
            }
        };

        let session = Session::from(descriptor.clone());
        info!(
            "Joined room {} as {} via host {}",
            session.room_id, local_peer, session.host_peer_id
        );
        self.session = Some(session.clone());

        Ok(Joined {
            session,
            local_peer,
            channel,
        })
    }

    /// `None` until an identity has been assigned and a room exists.
    pub fn shareable_descriptor(&self) -> Option<JoinDescriptor> {
        self.local_peer.as_ref()?;
        self.session.as_ref().map(JoinDescriptor::from)
    }

    pub fn shareable_link(&self) -> Result<Option<String>, DescriptorError> {
        self.shareable_descriptor()
            .map(|descriptor| descriptor.to_link(&self.base_url))
            .transpose()
    }
}

/// Everything one peer holds for the room it is in.
///
/// All mutation goes through `&mut self`, so events and local actions are
/// applied one at a time and every broadcast a step triggers finishes
/// before the next step starts.
#[derive(Debug)]
pub struct Tabletop {
    local: PeerId,
    name: String,
    session: Session,
    connections: ConnectionRegistry,
    whiteboard: WhiteboardState,
    chat: ChatLog,
    status: String,
}

impl Tabletop {
    fn new(local: PeerId, name: String, session: Session) -> Self {
        Self {
            local,
            name,
            session,
            connections: ConnectionRegistry::new(),
            whiteboard: WhiteboardState::new(),
            chat: ChatLog::new(),
            status: STATUS_READY.to_string(),
        }
    }

    /// The tabletop of the peer that created `session`.
    pub fn host(session: Session, name: impl Into<String>) -> Self {
        let local = session.host_peer_id.clone();
        Self::new(local, name.into(), session)
    }

    /// The tabletop of a peer that just joined, holding its channel to the host.
    pub fn join(joined: Joined, name: impl Into<String>) -> Self {
        let mut tabletop = Self::new(joined.local_peer, name.into(), joined.session);
        let host = tabletop.connections.begin(joined.channel);
        if tabletop.connections.mark_connected(&host) {
            tabletop.set_status(format!("Connected to {}", host));
        }
        tabletop
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.local
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_host(&self) -> bool {
        self.session.host_peer_id == self.local
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn whiteboard(&self) -> &WhiteboardState {
        &self.whiteboard
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    fn set_status(&mut self, status: String) {
        self.chat.append(ChatMessage::system(status.clone()));
        self.status = status;
    }

    /// Applies one transport event. Returns the route taken for data frames.
    pub fn handle_event(&mut self, event: PeerEvent) -> Option<Route> {
        match event {
            PeerEvent::Opened(channel) => {
                let peer = self.connections.accept(channel);
                self.set_status(format!("Connected to {}", peer));
                None
            }
            PeerEvent::Data {
                from,
                channel,
                payload,
            } => {
                if !self.connections.owns(&from, channel) {
                    debug!(
                        "Ignoring {} bytes from {} on unregistered channel {}",
                        payload.len(),
                        from,
                        channel
                    );
                    return None;
                }
                Some(router::dispatch_frame(
                    &payload,
                    &from,
                    &mut self.whiteboard,
                    &mut self.chat,
                ))
            }
            PeerEvent::Closed { peer, channel } => {
                if self.connections.handle_closed(&peer, channel) {
                    self.set_status(STATUS_CLOSED.to_string());
                }
                None
            }
        }
    }

    /// Appends the message's chat record, if it has one, then broadcasts it.
    fn publish(&mut self, message: Message) -> Result<BroadcastReport, TabletopError> {
        if let Some(record) = router::chat_record(&message) {
            self.chat.append(record);
        }
        Ok(router::broadcast(&self.connections, &self.local, &message)?)
    }

    /// Sends a chat line. Blank text is ignored and `Ok(None)` returned.
    pub fn send_chat(&mut self, text: &str) -> Result<Option<BroadcastReport>, TabletopError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let message = Message::Chat(Chat {
            id: MessageId::generate(),
            sender: self.local.clone(),
            sender_name: self.name.clone(),
            text: text.to_string(),
            timestamp: local_timestamp(),
        });
        self.publish(message).map(Some)
    }

    /// Rolls one die and shares the result. Returns the rolled value.
    pub fn roll_dice(&mut self, kind: DiceKind) -> Result<(u32, BroadcastReport), TabletopError> {
        let result = kind.roll(&mut rand::thread_rng());
        let message = Message::DiceRoll(DiceRoll {
            id: Some(MessageId::generate()),
            result,
            dice_type: kind.to_string(),
            sender: self.local.clone(),
            sender_name: self.name.clone(),
            timestamp: Some(local_timestamp()),
            text: Some(roll_text(&self.name, kind.as_str(), result)),
        });
        let report = self.publish(message)?;
        Ok((result, report))
    }

    /// Adds a token locally. Other peers learn about it on its first move.
    pub fn create_token(&mut self, color: Option<String>) -> Token {
        let color = color.unwrap_or_else(|| random_color(&mut rand::thread_rng()));
        let token = self.whiteboard.create_token(color);
        info!("Created token {} ({})", token.id, token.color);
        token
    }

    /// Moves a known token and broadcasts the clamped position.
    pub fn move_token(
        &mut self,
        id: &TokenId,
        position: Position,
    ) -> Result<(Position, BroadcastReport), TabletopError> {
        let stored = self.whiteboard.move_token(id, position)?;
        let message = Message::TokenMove(TokenMove {
            token_id: id.clone(),
            position: stored,
            sender: self.local.clone(),
            text: None,
        });
        let report = self.publish(message)?;
        Ok((stored, report))
    }

    /// Replaces the background and sends the whole image to every peer.
    ///
    /// Meant for the host; other peers are not stopped from doing it.
    pub fn set_background_image(
        &mut self,
        image: Vec<u8>,
    ) -> Result<BroadcastReport, TabletopError> {
        if !self.is_host() {
            warn!("Background changed by non-host peer {}", self.local);
        }
        self.whiteboard.set_background(image.clone());
        let message = Message::BackgroundUpdate(BackgroundUpdate {
            image,
            sender: self.local.clone(),
            text: None,
        });
        self.publish(message)
    }

    /// Local only; other peers keep their own grid size.
    pub fn resize_grid(&mut self, width: u32, height: u32) -> Result<(), TabletopError> {
        self.whiteboard.resize(width, height)?;
        info!("Grid resized to {}x{}", width, height);
        Ok(())
    }

    /// Broadcasts a system notice. Blank text is ignored.
    pub fn announce(&mut self, text: &str) -> Result<Option<BroadcastReport>, TabletopError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let message = Message::SystemMessage(SystemMessage {
            id: Some(MessageId::generate()),
            text: text.to_string(),
            timestamp: local_timestamp(),
        });
        self.publish(message).map(Some)
    }

    /// Closes the connection to one peer from our side.
    pub fn disconnect(&mut self, peer: &PeerId) -> bool {
        if self.connections.close(peer).is_none() {
            return false;
        }
        self.set_status(STATUS_CLOSED.to_string());
        true
    }

    /// Closes every connection. Whiteboard and chat are kept.
    pub fn shutdown(&mut self) -> usize {
        let closed = self.connections.close_all();
        if closed > 0 {
            self.set_status(STATUS_CLOSED.to_string());
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::recording;
    use crate::transport::memory::MemoryNetwork;
    use crate::transport::{event_queue, ChannelId};
    use shared::{decode, ChatKind, Inbound};
    use tokio_test::assert_ok;

    fn session() -> Session {
        Session {
            room_id: RoomId::new("R1"),
            host_peer_id: PeerId::new("host"),
        }
    }

    fn sent_messages(frames: &[Vec<u8>]) -> Vec<Message> {
        frames
            .iter()
            .map(|frame| match decode(frame).unwrap() {
                Inbound::Recognized(message) => message,
                other => panic!("Unexpected frame: {:?}", other),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_session() {
        let network = MemoryNetwork::new();
        let (tx, _rx) = event_queue();
        let mut manager = SessionManager::new(network.endpoint(tx), "http://localhost:3000");
        assert!(manager.shareable_descriptor().is_none());
        assert!(assert_ok!(manager.shareable_link()).is_none());

        let session = assert_ok!(manager.create_session().await);
        assert_eq!(manager.local_peer(), Some(&session.host_peer_id));
        assert_eq!(manager.session(), Some(&session));

        let link = assert_ok!(manager.shareable_link()).unwrap();
        let parsed = JoinDescriptor::parse(&link).unwrap();
        assert_eq!(Session::from(parsed), session);
    }

    #[tokio::test]
    async fn test_create_session_failure_is_reported() {
        let network = MemoryNetwork::new();
        network.refuse_identities(true);
        let (tx, _rx) = event_queue();
        let mut manager = SessionManager::new(network.endpoint(tx), "http://localhost:3000");

        let result = manager.create_session().await;
        assert!(matches!(result, Err(SignalingError::Rejected(_))));
        assert!(manager.session().is_none());
        assert!(manager.shareable_descriptor().is_none());
    }

    #[tokio::test]
    async fn test_join_session_dials_host() {
        let network = MemoryNetwork::new();
        let (host_tx, mut host_rx) = event_queue();
        let (guest_tx, _guest_rx) = event_queue();
        let mut host = SessionManager::new(network.endpoint(host_tx), "http://localhost:3000");
        let mut guest = SessionManager::new(network.endpoint(guest_tx), "http://localhost:3000");

        let session = assert_ok!(host.create_session().await);
        let descriptor = host.shareable_descriptor().unwrap();
        let joined = assert_ok!(guest.join_session(&descriptor).await);

        assert_eq!(joined.session, session);
        assert_ne!(joined.local_peer, session.host_peer_id);
        assert_eq!(joined.channel.remote_peer(), &session.host_peer_id);
        assert_eq!(guest.shareable_descriptor(), Some(descriptor));

        match host_rx.try_recv() {
            Ok(PeerEvent::Opened(channel)) => assert_eq!(channel.remote_peer(), &joined.local_peer),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_unknown_host() {
        let network = MemoryNetwork::new();
        let (tx, _rx) = event_queue();
        let mut guest = SessionManager::new(network.endpoint(tx), "http://localhost:3000");
        let descriptor = JoinDescriptor {
            room_id: RoomId::new("R1"),
            host_peer_id: PeerId::new("peer-404"),
        };

        let result = guest.join_session(&descriptor).await;
        assert!(matches!(result, Err(SignalingError::UnknownPeer(_))));
        assert!(guest.session().is_none());
    }

    #[test]
    fn test_host_starts_ready_and_empty() {
        let table = Tabletop::host(session(), "Host");
        assert!(table.is_host());
        assert_eq!(table.status(), STATUS_READY);
        assert!(table.chat().is_empty());
        assert!(table.connections().is_empty());
        assert_eq!(table.whiteboard().token_count(), 0);
    }

    #[test]
    fn test_join_registers_host_connection() {
        let (channel, _) = recording("host");
        let table = Tabletop::join(
            Joined {
                session: session(),
                local_peer: PeerId::new("guest"),
                channel,
            },
            "Guest",
        );

        assert!(!table.is_host());
        assert_eq!(table.connections().connected_peers(), vec![PeerId::new("host")]);
        assert_eq!(table.status(), "Connected to host");
        assert_eq!(table.chat().last().unwrap().kind, ChatKind::SystemMessage);
    }

    #[test]
    fn test_open_and_close_update_status() {
        let mut table = Tabletop::host(session(), "Host");
        let (channel, _) = recording("peer-a");
        let id = channel.id();

        table.handle_event(PeerEvent::Opened(channel));
        assert_eq!(table.status(), "Connected to peer-a");
        assert_eq!(table.connections().len(), 1);

        table.handle_event(PeerEvent::Closed {
            peer: PeerId::new("peer-a"),
            channel: id,
        });
        assert_eq!(table.status(), STATUS_CLOSED);
        assert!(table.connections().is_empty());

        let notices: Vec<&str> = table.chat().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(notices, vec!["Connected to peer-a", STATUS_CLOSED]);
    }

    #[test]
    fn test_data_from_unconnected_peer_is_ignored() {
        let mut table = Tabletop::host(session(), "Host");
        let route = table.handle_event(PeerEvent::Data {
            from: PeerId::new("stranger"),
            channel: ChannelId::next(),
            payload: br#"{"type":"SYSTEM_MESSAGE","text":"hi","timestamp":"t"}"#.to_vec(),
        });
        assert_eq!(route, None);
        assert!(table.chat().is_empty());
    }

    #[test]
    fn test_replaced_channel_events_are_stale() {
        let mut table = Tabletop::host(session(), "Host");
        let (first, _) = recording("peer-a");
        let (second, _) = recording("peer-a");
        let (first_id, second_id) = (first.id(), second.id());
        table.handle_event(PeerEvent::Opened(first));
        table.handle_event(PeerEvent::Opened(second));

        let frame = br#"{"type":"SYSTEM_MESSAGE","text":"hi","timestamp":"t"}"#.to_vec();
        let stale = table.handle_event(PeerEvent::Data {
            from: PeerId::new("peer-a"),
            channel: first_id,
            payload: frame.clone(),
        });
        assert_eq!(stale, None);

        table.handle_event(PeerEvent::Closed {
            peer: PeerId::new("peer-a"),
            channel: first_id,
        });
        assert_eq!(table.connections().connected_peers(), vec![PeerId::new("peer-a")]);
        assert_eq!(table.status(), "Connected to peer-a");

        let route = table.handle_event(PeerEvent::Data {
            from: PeerId::new("peer-a"),
            channel: second_id,
            payload: frame,
        });
        assert_eq!(route, Some(Route::SystemMessage));
        assert_eq!(table.chat().last().unwrap().text, "hi");
    }

    #[test]
    fn test_send_chat_appends_and_broadcasts() {
        let mut table = Tabletop::host(session(), "Host");
        let (channel, outbox) = recording("peer-a");
        table.handle_event(PeerEvent::Opened(channel));

        let report = table.send_chat("hello").unwrap().unwrap();
        assert_eq!(report.attempted, 1);

        let entry = table.chat().last().unwrap();
        assert_eq!(entry.text, "hello");
        assert_eq!(entry.sender, Some(PeerId::new("host")));

        let sent = sent_messages(&outbox.frames.lock().unwrap());
        match &sent[..] {
            [Message::Chat(chat)] => {
                assert_eq!(chat.text, "hello");
                assert_eq!(chat.sender_name, "Host");
                assert_eq!(chat.id, entry.id);
            }
            other => panic!("Unexpected frames: {:?}", other),
        }
    }

    #[test]
    fn test_blank_chat_is_ignored() {
        let mut table = Tabletop::host(session(), "Host");
        let (channel, outbox) = recording("peer-a");
        table.handle_event(PeerEvent::Opened(channel));
        let before = table.chat().len();

        assert!(table.send_chat("   ").unwrap().is_none());
        assert!(table.send_chat("").unwrap().is_none());
        assert_eq!(table.chat().len(), before);
        assert!(outbox.frames.lock().unwrap().is_empty());
    }

    #[test]
    fn test_roll_dice() {
        let mut table = Tabletop::host(session(), "Host");
        let (channel, outbox) = recording("peer-a");
        table.handle_event(PeerEvent::Opened(channel));

        let (result, report) = table.roll_dice(DiceKind::D8).unwrap();
        assert!((1..=8).contains(&result));
        assert_eq!(report.attempted, 1);

        let entry = table.chat().last().unwrap();
        assert_eq!(entry.kind, ChatKind::DiceRoll);
        assert_eq!(entry.text, format!("Host rolled a d8: {}", result));

        match &sent_messages(&outbox.frames.lock().unwrap())[..] {
            [Message::DiceRoll(roll)] => {
                assert_eq!(roll.result, result);
                assert_eq!(roll.dice_type, "d8");
                assert_eq!(roll.text.as_deref(), Some(entry.text.as_str()));
            }
            other => panic!("Unexpected frames: {:?}", other),
        };
    }

    #[test]
    fn test_move_token_broadcasts_clamped_position() {
        let mut table = Tabletop::host(session(), "Host");
        let (channel, outbox) = recording("peer-a");
        table.handle_event(PeerEvent::Opened(channel));
        let token = table.create_token(Some("#ff0000".to_string()));
        let chat_len = table.chat().len();

        let (stored, report) = table.move_token(&token.id, Position::new(12, 4)).unwrap();
        assert_eq!(stored, Position::new(9, 4));
        assert_eq!(report.attempted, 1);
        assert_eq!(table.chat().len(), chat_len);

        match &sent_messages(&outbox.frames.lock().unwrap())[..] {
            [Message::TokenMove(token_move)] => {
                assert_eq!(token_move.token_id, token.id);
                assert_eq!(token_move.position, Position::new(9, 4));
                assert_eq!(token_move.sender, PeerId::new("host"));
            }
            other => panic!("Unexpected frames: {:?}", other),
        };
    }

    #[test]
    fn test_move_unknown_token_sends_nothing() {
        let mut table = Tabletop::host(session(), "Host");
        let (channel, outbox) = recording("peer-a");
        table.handle_event(PeerEvent::Opened(channel));

        let result = table.move_token(&TokenId::new("nope"), Position::new(1, 1));
        assert!(matches!(
            result,
            Err(TabletopError::Whiteboard(WhiteboardError::UnknownToken(_)))
        ));
        assert!(outbox.frames.lock().unwrap().is_empty());
    }

    #[test]
    fn test_create_token_random_color() {
        let mut table = Tabletop::host(session(), "Host");
        let token = table.create_token(None);
        assert!(token.color.starts_with('#'));
        assert_eq!(token.color.len(), 7);
        assert_eq!(table.whiteboard().token(&token.id), Some(&token));
    }

    #[test]
    fn test_background_sent_whole() {
        let mut table = Tabletop::host(session(), "Host");
        let (channel, outbox) = recording("peer-a");
        table.handle_event(PeerEvent::Opened(channel));
        let image: Vec<u8> = (0..=255).cycle().take(10_000).collect();

        table.set_background_image(image.clone()).unwrap();
        assert_eq!(table.whiteboard().background(), Some(image.as_slice()));

        match &sent_messages(&outbox.frames.lock().unwrap())[..] {
            [Message::BackgroundUpdate(update)] => assert_eq!(update.image, image),
            other => panic!("Unexpected frames: {:?}", other),
        };
    }

    #[test]
    fn test_resize_is_local() {
        let mut table = Tabletop::host(session(), "Host");
        let (channel, outbox) = recording("peer-a");
        table.handle_event(PeerEvent::Opened(channel));

        table.resize_grid(20, 15).unwrap();
        assert_eq!(table.whiteboard().grid_width(), 20);
        assert!(table.resize_grid(51, 15).is_err());
        assert_eq!(table.whiteboard().grid_height(), 15);
        assert!(outbox.frames.lock().unwrap().is_empty());
    }

    #[test]
    fn test_announce() {
        let mut table = Tabletop::host(session(), "Host");
        let (channel, outbox) = recording("peer-a");
        table.handle_event(PeerEvent::Opened(channel));

        table.announce("Session starts").unwrap();
        let entry = table.chat().last().unwrap();
        assert_eq!(entry.kind, ChatKind::SystemMessage);
        assert_eq!(entry.text, "Session starts");
        assert!(matches!(
            &sent_messages(&outbox.frames.lock().unwrap())[..],
            [Message::SystemMessage(_)]
        ));
    }

    #[test]
    fn test_disconnect_excludes_peer_from_later_broadcasts() {
        let mut table = Tabletop::host(session(), "Host");
        let (a, a_outbox) = recording("peer-a");
        let (b, b_outbox) = recording("peer-b");
        table.handle_event(PeerEvent::Opened(a));
        table.handle_event(PeerEvent::Opened(b));

        assert!(table.disconnect(&PeerId::new("peer-a")));
        assert!(!table.disconnect(&PeerId::new("peer-a")));
        assert!(*a_outbox.closed.lock().unwrap());

        let report = table.send_chat("still here?").unwrap().unwrap();
        assert_eq!(report.attempted, 1);
        assert!(a_outbox.frames.lock().unwrap().is_empty());
        assert_eq!(b_outbox.frames.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_shutdown_keeps_state() {
        let mut table = Tabletop::host(session(), "Host");
        table.handle_event(PeerEvent::Opened(recording("peer-a").0));
        table.create_token(None);
        table.send_chat("bye").unwrap();

        assert_eq!(table.shutdown(), 1);
        assert!(table.connections().is_empty());
        assert_eq!(table.whiteboard().token_count(), 1);
        assert!(table.chat().iter().any(|m| m.text == "bye"));
        assert_eq!(table.status(), STATUS_CLOSED);
    }
}
