//! Node configuration.

use crate::Args;
use aeternity_encoding::{decode_expecting, Prefix};
use aeternity_network::{Keypair, ListenerConfig, NetworkId, Peer, DEFAULT_PORT};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::Path;

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Network to join (mainnet, testnet).
    pub network: String,
    /// P2P bind address.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Static identity; a fresh one is generated when omitted.
    #[serde(default)]
    pub keypair: Option<KeypairConfig>,
    /// Peers dialed at startup.
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

fn default_listen_address() -> String {
    format!("0.0.0.0:{DEFAULT_PORT}")
}

/// Hex-encoded Curve25519 keypair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeypairConfig {
    pub public: String,
    pub secret: String,
}

/// One bootstrap peer entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// `pp_` identifier of the peer's static key.
    pub pubkey: String,
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: "mainnet".to_string(),
            listen_address: default_listen_address(),
            keypair: None,
            peers: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from file, then apply CLI overrides.
    pub fn load(config_path: &Path, args: &Args) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Self::default()
        };

        if let Some(ref network) = args.network {
            config.network = network.clone();
        }
        if let Some(port) = args.port {
            let host = config
                .listen_address
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            config.listen_address = format!("{host}:{port}");
        }
        config.peers.extend(args.peers()?);

        Ok(config)
    }

    /// Resolve into the listener's runtime configuration.
    pub fn listener_config(&self) -> Result<ListenerConfig> {
        let network: NetworkId = self
            .network
            .parse()
            .with_context(|| format!("Unknown network {:?}", self.network))?;

        let keypair = match &self.keypair {
            Some(keys) => parse_keypair(keys)?,
            None => Keypair::generate().context("Failed to generate a keypair")?,
        };

        let listen_addr: SocketAddr = self
            .listen_address
            .parse()
            .with_context(|| format!("Bad listen address {:?}", self.listen_address))?;

        let mut config = ListenerConfig::new(network, keypair);
        config.listen_addr = listen_addr;
        for peer in &self.peers {
            config.initial_peers.push(resolve_peer(peer)?);
        }
        Ok(config)
    }
}

fn parse_keypair(keys: &KeypairConfig) -> Result<Keypair> {
    let public = decode_key(&keys.public).context("Bad public key")?;
    let secret = decode_key(&keys.secret).context("Bad secret key")?;
    Ok(Keypair { public, secret })
}

fn decode_key(value: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(value).context("Key is not hex")?;
    let key: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("Key must be 32 bytes, found {}", bytes.len()))?;
    Ok(key)
}

/// Resolve a peer entry: `pp_` key plus a host that may be a name or an IP.
pub fn resolve_peer(peer: &PeerConfig) -> Result<Peer> {
    let pubkey: [u8; 32] = decode_expecting(Prefix::PeerPubkey, &peer.pubkey)
        .map_err(|e| anyhow::anyhow!("Bad peer pubkey {:?}: {e}", peer.pubkey))?
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("Peer pubkey {:?} is not 32 bytes", peer.pubkey))?;

    let host: IpAddr = match peer.host.parse() {
        Ok(ip) => ip,
        Err(_) => {
            let mut addrs = (peer.host.as_str(), peer.port)
                .to_socket_addrs()
                .with_context(|| format!("Cannot resolve host {:?}", peer.host))?;
            match addrs.next() {
                Some(addr) => addr.ip(),
                None => bail!("Host {:?} resolved to no addresses", peer.host),
            }
        }
    };

    Ok(Peer::new(pubkey, host, peer.port))
}
