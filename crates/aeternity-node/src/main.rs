//! aeternity observer node.
//!
//! Connects to the configured network, answers pings, and logs the key
//! blocks and micro block transactions it observes.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod node;

use config::{NodeConfig, PeerConfig};
use node::Node;

/// Read-only listener for aeternity block announcements.
#[derive(Parser, Debug)]
#[command(name = "aeternity-node")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "aeternity-node.toml")]
    config: PathBuf,

    /// Network to connect to (mainnet, testnet)
    #[arg(short, long)]
    network: Option<String>,

    /// P2P listening port
    #[arg(short, long)]
    port: Option<u16>,

    /// Additional peer, as pp_<key>@host:port (repeatable)
    #[arg(long = "peer")]
    peer: Vec<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Parse `--peer pp_<key>@host:port` entries.
    pub fn peers(&self) -> Result<Vec<PeerConfig>> {
        self.peer
            .iter()
            .map(|entry| {
                let (pubkey, addr) = entry
                    .split_once('@')
                    .ok_or_else(|| anyhow::anyhow!("Peer {entry:?} lacks '@'"))?;
                let (host, port) = addr
                    .rsplit_once(':')
                    .ok_or_else(|| anyhow::anyhow!("Peer {entry:?} lacks a port"))?;
                Ok(PeerConfig {
                    pubkey: pubkey.to_string(),
                    host: host.to_string(),
                    port: port
                        .parse()
                        .map_err(|_| anyhow::anyhow!("Peer {entry:?} has a bad port"))?,
                })
            })
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting aeternity observer node v{}", env!("CARGO_PKG_VERSION"));

    let config = NodeConfig::load(&args.config, &args)?;
    info!("Network: {}", config.network);
    info!("P2P: {}", config.listen_address);

    let node = Node::start(config).await?;

    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                tracing::error!("Node error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    node.shutdown();
    info!("aeternity node stopped");
    Ok(())
}
