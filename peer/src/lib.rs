//! # Tabletop Peer Library
//!
//! Everything a participant of a virtual tabletop runs: joining or hosting a
//! room, holding direct channels to other peers, and keeping a local copy of
//! the shared whiteboard and chat log in step with them.
//!
//! ## Architecture Overview
//!
//! There is no state server. Every peer keeps its own whiteboard and chat
//! log, applies its own actions immediately and broadcasts them to every peer
//! it is connected to. Inbound messages are applied in the order they are
//! received.
//!
//! ### Single-threaded event loop
//! Transport tasks never touch tabletop state. They turn socket activity
//! into [`transport::PeerEvent`]s on one queue, and the peer's loop applies
//! events and console commands one at a time. A handler, including any
//! broadcast it triggers, runs to completion before the next one starts.
//!
//! ### Best-effort consistency
//! Broadcasts are fire-and-forget and nothing is versioned. Concurrent token
//! moves resolve to whichever move a peer applied last, so peers can
//! disagree. A peer that joins late starts with an empty table.
//!
//! ## Module Organization
//!
//! ### Session (`session`)
//! - Room creation and joining through the rendezvous collaborator
//! - The shareable join link
//! - The [`session::Tabletop`] aggregate that owns all per-peer state
//!
//! ### Connections (`connection`)
//! - Registry of open channels keyed by remote peer
//! - `Connecting -> Connected -> Disconnected` lifecycle
//!
//! ### Routing (`router`)
//! - Broadcast of one encoded message to every connected peer
//! - Dispatch of inbound frames to exactly one handler, with a chat
//!   fallback for unrecognized messages that carry text
//!
//! ### Whiteboard (`whiteboard`), Chat (`chat`), Dice (`dice`)
//! - Grid, background image and tokens with clamped positions
//! - Append-only chat and event log
//! - d4 to d20 rolls
//!
//! ### Transport (`transport`)
//! - The [`transport::Rendezvous`] and [`transport::Channel`] seam
//! - `net`: UDP signaling plus direct TCP streams
//! - `memory`: in-process hub for tests
//!
//! ### Console (`commands`, `network`)
//! - Slash command parsing
//! - [`network::PeerNode`], the async loop tying it all together
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use peer::network::PeerNode;
//! use peer::session::{SessionManager, Tabletop};
//! use peer::transport::{event_queue, net::NetRendezvous};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (events, inbox) = event_queue();
//!     let rendezvous = NetRendezvous::bind("127.0.0.1:9000", "127.0.0.1:0", events).await?;
//!     let mut manager = SessionManager::new(rendezvous, "http://localhost:3000");
//!
//!     let session = manager.create_session().await?;
//!     println!("{:?}", manager.shareable_link()?);
//!
//!     let tabletop = Tabletop::host(session, "Game Master");
//!     PeerNode::new(manager, tabletop, inbox)
//!         .run(tokio::io::BufReader::new(tokio::io::stdin()))
//!         .await
//! }
//! ```

pub mod chat;
pub mod commands;
pub mod connection;
pub mod dice;
pub mod network;
pub mod router;
pub mod session;
pub mod transport;
pub mod whiteboard;

pub use chat::ChatLog;
pub use connection::{ConnectionError, ConnectionRegistry, ConnectionStatus};
pub use dice::DiceKind;
pub use router::{BroadcastReport, Route};
pub use session::{Joined, SessionManager, Tabletop, TabletopError};
pub use transport::{Channel, ChannelId, PeerEvent, Rendezvous, SignalingError};
pub use whiteboard::{WhiteboardError, WhiteboardState};
