use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use medlink::PeerId;
use medlink::model::{Location, Packet, PeerType, RoomId};
use medlink::peer::{Role, Session, SessionConfig, SessionError};
use medlink::relay::{RelayConfig, RelayService};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "medlink")]
#[command(about = "Signaling relay and data-channel peer for ambulance dispatch")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Relay {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: SocketAddr,

        #[arg(long, default_value_t = 300)]
        peer_ttl_secs: u64,

        #[arg(long, default_value_t = 60)]
        sweep_interval_secs: u64,
    },

    /// Open a data channel to another peer and exchange JSON lines over it.
    Peer {
        #[arg(long)]
        id: String,

        /// Peer to negotiate with.
        #[arg(long, conflicts_with = "room", required_unless_present = "room")]
        target: Option<String>,

        /// Room whose first responding member becomes the peer.
        #[arg(long)]
        room: Option<String>,

        /// Create the channel and send the offer instead of waiting for one.
        #[arg(long)]
        initiator: bool,

        #[arg(long, default_value = "user")]
        peer_type: PeerType,

        #[arg(long, env = "MEDLINK_RELAY_URL")]
        relay_url: Option<String>,

        #[arg(long = "stun", env = "MEDLINK_STUN_SERVERS", value_delimiter = ',')]
        stun_servers: Vec<String>,

        #[arg(long, env = "MEDLINK_POLL_INTERVAL_MS")]
        poll_interval_ms: Option<u64>,

        /// Seconds to wait for the channel; 0 waits forever.
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Relay {
            bind,
            peer_ttl_secs,
            sweep_interval_secs,
        } => {
            let config = RelayConfig {
                peer_ttl: Duration::from_secs(peer_ttl_secs),
                sweep_interval: Duration::from_secs(sweep_interval_secs),
            };
            run_relay(bind, config).await
        }

        Commands::Peer {
            id,
            target,
            room,
            initiator,
            peer_type,
            relay_url,
            stun_servers,
            poll_interval_ms,
            timeout_secs,
        } => {
            let mut config = SessionConfig::from_env().with_peer_type(peer_type);
            if let Some(url) = relay_url {
                config = config.with_relay_url(url);
            }
            if !stun_servers.is_empty() {
                config = config.with_stun_servers(stun_servers);
            }
            if let Some(ms) = poll_interval_ms {
                config = config
                    .with_poll_interval(Duration::from_millis(ms))
                    .with_heartbeat_interval(Duration::from_millis(ms));
            }
            config = config.with_negotiation_timeout(
                (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            );

            let role = if initiator {
                Role::Initiator
            } else {
                Role::Responder
            };
            let destination = match (target, room) {
                (Some(target), _) => Destination::Peer(PeerId::from(target)),
                (None, Some(room)) => Destination::Room(RoomId::from(room)),
                (None, None) => anyhow::bail!("either --target or --room is required"),
            };

            run_peer(PeerId::from(id), destination, role, config).await
        }
    }
}

enum Destination {
    Peer(PeerId),
    Room(RoomId),
}

async fn run_relay(bind: SocketAddr, config: RelayConfig) -> Result<()> {
    let service = RelayService::new(config);
    let sweeper = service.spawn_sweeper();

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind relay to {bind}"))?;

    println!("{}", "🚑 medlink relay".green().bold());
    println!("   Listening on {}", listener.local_addr()?.to_string().cyan());

    tokio::select! {
        result = medlink::relay::serve(listener, service) => {
            result.context("Relay server stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("{}", "Shutting down relay".yellow());
        }
    }

    sweeper.abort();
    Ok(())
}

async fn run_peer(
    peer_id: PeerId,
    destination: Destination,
    role: Role,
    config: SessionConfig,
) -> Result<()> {
    println!(
        "{} {} via {}",
        "📡 Peer".green().bold(),
        peer_id.to_string().bold(),
        config.relay_base_url.cyan()
    );

    let session = Session::over_http(peer_id, config).context("Invalid relay URL")?;
    session.on_data(|payload| println!("{} {}", "⬅".blue().bold(), payload));

    let mut status_rx = session.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            let line = format!("state: {}", status.state);
            match status.end_reason {
                Some(reason) => println!("{} ({:?})", line.yellow(), reason),
                None => println!("{}", line.dimmed()),
            }
        }
    });

    let started = match destination {
        Destination::Peer(target) => session.initialize(target, role).await,
        Destination::Room(room) => session.join_room(room, role).await,
    };
    match started {
        Ok(()) => {}
        Err(err) if err.is_relay_failure() => {
            warn!("Relay unavailable, session keeps retrying: {}", err);
        }
        Err(err) => return Err(err).context("Failed to start session"),
    }

    tokio::select! {
        result = exchange_lines(&session) => result?,
        _ = tokio::signal::ctrl_c() => {}
    }

    session.disconnect().await;
    info!("Session for {} closed", session.peer_id());
    println!("{}", "Disconnected".yellow());
    Ok(())
}

/// Waits for the channel, then sends every stdin line: `lat,lng` as a location
/// update, JSON as-is, anything else as `{"text": ..}`.
async fn exchange_lines(session: &Session) -> Result<()> {
    match session.wait_until_open(Duration::MAX).await {
        Ok(()) => println!("{}", "✨ Data channel open, type JSON lines to send".green()),
        Err(SessionError::SessionClosed) => {
            anyhow::bail!("Session closed before the channel opened")
        }
        Err(err) => return Err(err.into()),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let payload = parse_line(line)?;

        match session.send(&payload).await {
            Ok(()) => println!("{} {}", "➡".green().bold(), payload),
            Err(SessionError::SessionClosed) => {
                println!("{}", "Channel closed by the remote peer".yellow());
                break;
            }
            Err(err) => println!("{} {}", "✗".red().bold(), err),
        }
    }

    Ok(())
}

fn parse_line(line: &str) -> Result<Value> {
    if let Some(location) = parse_location(line) {
        return serde_json::to_value(Packet::location(location)).context("Invalid location");
    }
    Ok(serde_json::from_str::<Value>(line).unwrap_or_else(|_| json!({ "text": line })))
}

fn parse_location(line: &str) -> Option<Location> {
    let (lat, lng) = line.split_once(',')?;
    let latitude = lat.trim().parse::<f64>().ok()?;
    let longitude = lng.trim().parse::<f64>().ok()?;
    Some(Location::new(latitude, longitude))
}
