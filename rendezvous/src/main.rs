use clap::Parser;
use log::info;
use rendezvous::Server;
use shared::DEFAULT_RENDEZVOUS_PORT;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_RENDEZVOUS_PORT)]
    port: u16,

    /// Seconds without a heartbeat before a peer is forgotten
    #[arg(short, long, default_value = "10")]
    timeout_secs: u64,

    /// Maximum number of registered peers
    #[arg(short, long, default_value = "256")]
    max_peers: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    info!("Starting rendezvous server...");
    info!("Peer timeout: {}s", args.timeout_secs);
    info!("Max peers: {}", args.max_peers);

    let mut server =
        Server::new(&address, args.max_peers, Duration::from_secs(args.timeout_secs)).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
