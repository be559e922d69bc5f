//! kwconnect CLI tools: diagnostics against a running host.

#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kwconnect_common::action;
use kwconnect_host::config::{DEFAULT_LISTEN, DEFAULT_ORIGIN};
use kwconnect_host::socket::SocketClient;
use kwconnect_host::PeerClient;
use serde_json::{json, Value};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "kwconnect")]
#[command(about = "kwconnect CLI tools")]
struct Args {
    /// Host address (host:port)
    #[arg(short, long, env = "KWCONNECT_LISTEN", default_value = DEFAULT_LISTEN)]
    addr: SocketAddr,

    /// Origin to declare on every message
    #[arg(long, env = "KWCONNECT_ORIGIN", default_value = DEFAULT_ORIGIN)]
    origin: String,

    /// Reply timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a ping and print the echoed data
    Ping {
        /// JSON value to echo (plain strings are sent as strings)
        #[arg(short, long, default_value = "\"ping\"")]
        data: String,
    },

    /// Exchange keys and print the host's reply
    Handshake {
        #[arg(short, long, default_value = "kwconnect-cli")]
        client_id: String,
    },

    /// Exchange keys, then request the database hash
    Hash {
        #[arg(short, long, default_value = "kwconnect-cli")]
        client_id: String,
    },

    /// Show version information
    Version,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    kwconnect_common::init_tracing();

    let args = Args::parse();

    if let Command::Version = args.command {
        println!("kwconnect {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut client = SocketClient::connect(args.addr, args.origin.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", args.addr))?
        .with_timeout(Duration::from_millis(args.timeout_ms));

    match args.command {
        Command::Ping { data } => {
            let data: Value = serde_json::from_str(&data).unwrap_or(Value::String(data));

            let start = Instant::now();
            let response = client.call(PeerClient::ping_request(data)).await?;
            println!("Response from {}: RTT={:?}", args.addr, start.elapsed());
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Handshake { client_id } => {
            let mut peer = PeerClient::new(client_id);
            let response = client.call(peer.handshake_request()).await?;
            debug!("handshake response: {}", response);
            println!("{}", serde_json::to_string_pretty(&response)?);

            peer.complete_handshake(response)?;
            println!(
                "Connected as {} (host version {})",
                peer.client_id(),
                peer.host_version().unwrap_or("unknown")
            );
        }
        Command::Hash { client_id } => {
            let mut peer = PeerClient::new(client_id);
            let response = client.call(peer.handshake_request()).await?;
            peer.complete_handshake(response)?;

            let (request, nonce) = peer.encrypted_request(
                action::GET_DATABASE_HASH,
                json!({ "action": action::GET_DATABASE_HASH }),
            )?;
            let response = client.call(request).await?;
            let payload = peer.open_response(&nonce, response)?;

            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Command::Version => {}
    }

    Ok(())
}
