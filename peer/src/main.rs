use clap::{Parser, Subcommand};
use log::info;
use peer::network::PeerNode;
use peer::session::{SessionManager, Tabletop};
use peer::transport::event_queue;
use peer::transport::net::NetRendezvous;
use shared::{JoinDescriptor, DEFAULT_RENDEZVOUS_PORT};
use tokio::io::{stdin, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Rendezvous server address
    #[arg(short = 'r', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_RENDEZVOUS_PORT))]
    rendezvous: String,

    /// Address to accept direct peer streams on
    #[arg(short = 'l', long, default_value = "127.0.0.1:0")]
    listen: String,

    /// Name shown next to your chat messages and rolls
    #[arg(short = 'n', long, default_value = "Adventurer")]
    name: String,

    /// Origin used when printing the join link
    #[arg(short = 'b', long, default_value = "http://localhost:3000")]
    base_url: String,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Create a new room and wait for players
    Host,
    /// Join a room from its link
    Join {
        /// Link printed by the host, e.g. http://localhost:3000/?room=...&host=...
        link: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let (events, inbox) = event_queue();
    let rendezvous = NetRendezvous::bind(&args.rendezvous, &args.listen, events).await?;
    info!("Using rendezvous server {}", args.rendezvous);

    let mut manager = SessionManager::new(rendezvous, args.base_url);

    let tabletop = match args.mode {
        Mode::Host => {
            let session = manager.create_session().await?;
            if let Some(link) = manager.shareable_link()? {
                println!("Share this link: {}", link);
            }
            Tabletop::host(session, args.name)
        }
        Mode::Join { link } => {
            let descriptor = JoinDescriptor::parse(&link)?;
            let joined = manager.join_session(&descriptor).await?;
            Tabletop::join(joined, args.name)
        }
    };

    let heartbeat = manager.rendezvous().spawn_heartbeat();
    println!("Type /help for commands");

    let mut node = PeerNode::new(manager, tabletop, inbox);
    let result = node.run(BufReader::new(stdin())).await;

    heartbeat.abort();
    node.manager().rendezvous().unregister().await;
    info!("Left the room");

    result
}
