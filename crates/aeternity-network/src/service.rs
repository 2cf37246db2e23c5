//! Network service: TCP listener, initial dials, consumer hooks.
//!
//! The service binds the listening socket, hands every accepted connection
//! to its own task, and dials the configured bootstrap peers through the
//! registry. Consumers observe the chain through a broadcast channel: one
//! event stream carrying decoded key blocks and micro block transactions.
//! Broadcast receivers that fall behind lose old events instead of
//! back-pressuring connection tasks.

use crate::connection::{ConnectionContext, PeerConnection};
use crate::noise::Keypair;
use crate::{
    NetworkId, NetworkResult, Peer, PeerRegistry, DEFAULT_PORT, FIRST_PING_TIMEOUT,
    HANDSHAKE_TIMEOUT,
};
use aeternity_serialization::{KeyBlock, SignedTransaction};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Capacity of the consumer event channel.
const EVENT_CHANNEL_SIZE: usize = 1024;

/// Listener configuration.
#[derive(Clone)]
pub struct ListenerConfig {
    /// Address to accept inbound peers on.
    pub listen_addr: SocketAddr,
    /// Network to join; fixes the genesis hash in prologue and pings.
    pub network: NetworkId,
    /// Static identity keypair.
    pub keypair: Keypair,
    /// Peers dialed at startup.
    pub initial_peers: Vec<Peer>,
    /// Noise handshake window.
    pub handshake_timeout: Duration,
    /// Window for an accepted peer to complete its first ping.
    pub first_ping_timeout: Duration,
}

impl ListenerConfig {
    /// Configuration with protocol-default timers.
    pub fn new(network: NetworkId, keypair: Keypair) -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            network,
            keypair,
            initial_peers: Vec::new(),
            handshake_timeout: HANDSHAKE_TIMEOUT,
            first_ping_timeout: FIRST_PING_TIMEOUT,
        }
    }
}

/// Events published to consumers. Both hooks are best-effort: a slow
/// consumer lags and drops, dispatch never waits.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// A decoded key block announcement.
    KeyBlock(Box<KeyBlock>),
    /// The transactions of an announced micro block, in wire order.
    MicroBlockTxs {
        /// `mh_` hash of the micro block.
        block_hash: String,
        txs: Vec<SignedTransaction>,
    },
}

/// Running network service.
pub struct NetworkService {
    registry: PeerRegistry,
    events: broadcast::Sender<ChainEvent>,
    local_addr: SocketAddr,
    pubkey: [u8; 32],
    accept_task: JoinHandle<()>,
}

impl NetworkService {
    /// Bind the listener, start accepting, and dial the configured peers.
    pub async fn start(config: ListenerConfig) -> NetworkResult<Self> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(
            addr = %local_addr,
            network = %config.network,
            "listener started"
        );

        let registry = PeerRegistry::new();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let pubkey = config.keypair.public;

        let ctx = ConnectionContext {
            network: config.network,
            keypair: Arc::new(config.keypair),
            listen_port: local_addr.port(),
            registry: registry.clone(),
            events: events.clone(),
            handshake_timeout: config.handshake_timeout,
            first_ping_timeout: config.first_ping_timeout,
        };

        let accept_ctx = ctx.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let ctx = accept_ctx.clone();
                        tokio::spawn(async move {
                            if let Err(err) = PeerConnection::accept(stream, addr, ctx).await {
                                warn!(addr = %addr, error = %err, "inbound connection ended");
                            }
                        });
                    }
                    Err(err) => {
                        error!(error = %err, "accept failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        for peer in config.initial_peers {
            registry.try_connect(peer, ctx.clone());
        }

        Ok(Self {
            registry,
            events,
            local_addr,
            pubkey,
            accept_task,
        })
    }

    /// Subscribe to decoded chain events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    /// The shared peer registry.
    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Our static public key.
    pub fn pubkey(&self) -> [u8; 32] {
        self.pubkey
    }

    /// Stop accepting new connections. Live connection tasks wind down on
    /// their own when their sockets close.
    pub fn shutdown(&self) {
        self.accept_task.abort();
        info!(addr = %self.local_addr, "listener stopped");
    }
}

impl Drop for NetworkService {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}
