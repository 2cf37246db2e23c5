//! Shared peer registry.
//!
//! Process-wide set of known peers keyed by their 32-byte static public key.
//! The registry is the only mutable state shared across connection tasks; it
//! is injected explicitly rather than reached through a global so tests can
//! run many instances side by side.

use crate::connection::{ConnectionContext, PeerConnection};
use crate::{NetworkError, NetworkResult, PING_SHARE};
use aeternity_encoding::{encode as encode_id, Prefix};
use aeternity_rlp::{decode, encode, RlpItem};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, info};

/// A known peer. A peer may be known without an active connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Static Curve25519 public key.
    pub pubkey: [u8; 32],
    /// Host address.
    pub host: IpAddr,
    /// TCP listening port.
    pub port: u16,
}

impl Peer {
    /// Peer from its parts.
    pub fn new(pubkey: [u8; 32], host: IpAddr, port: u16) -> Self {
        Self { pubkey, host, port }
    }

    /// Socket address to dial.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// `pp_` identifier for logs and APIs.
    pub fn id(&self) -> String {
        encode_id(Prefix::PeerPubkey, &self.pubkey)
    }
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.id(), self.host, self.port)
    }
}

#[derive(Debug)]
struct PeerEntry {
    peer: Peer,
    /// Whether a live session currently owns this peer.
    connected: bool,
}

/// Cloneable handle to the shared registry.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    inner: Arc<RwLock<HashMap<[u8; 32], PeerEntry>>>,
}

impl PeerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Membership check.
    pub fn has_peer(&self, pubkey: &[u8; 32]) -> bool {
        self.inner.read().contains_key(pubkey)
    }

    /// Whether a live session currently owns the peer.
    pub fn is_connected(&self, pubkey: &[u8; 32]) -> bool {
        self.inner
            .read()
            .get(pubkey)
            .map(|e| e.connected)
            .unwrap_or(false)
    }

    /// Idempotent insert. An existing entry wins over a repeated insert.
    pub fn add_peer(&self, peer: Peer) {
        let mut peers = self.inner.write();
        peers.entry(peer.pubkey).or_insert_with(|| {
            debug!(peer = %peer, "registered peer");
            PeerEntry {
                peer,
                connected: false,
            }
        });
    }

    /// Claim the live-session slot for a peer, inserting it if unknown.
    /// Returns false when another session already owns the peer; the later
    /// session must yield to the earlier one.
    pub fn claim_connection(&self, peer: Peer) -> bool {
        let mut peers = self.inner.write();
        let entry = peers.entry(peer.pubkey).or_insert_with(|| PeerEntry {
            peer,
            connected: false,
        });
        if entry.connected {
            return false;
        }
        entry.connected = true;
        true
    }

    /// Drop a peer, live or not. Called on socket close.
    pub fn remove_peer(&self, pubkey: &[u8; 32]) {
        if self.inner.write().remove(pubkey).is_some() {
            debug!(peer = %encode_id(Prefix::PeerPubkey, pubkey), "removed peer");
        }
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True when no peers are known.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Snapshot of peers to share in a ping, excluding one pubkey and capped
    /// at the advisory share count.
    pub fn share_sample(&self, exclude: &[u8; 32]) -> Vec<Peer> {
        self.inner
            .read()
            .values()
            .filter(|e| &e.peer.pubkey != exclude)
            .take(PING_SHARE as usize)
            .map(|e| e.peer.clone())
            .collect()
    }

    /// Dial a peer in the background unless a session already owns it.
    pub fn try_connect(&self, peer: Peer, ctx: ConnectionContext) {
        if peer.pubkey == ctx.keypair.public {
            return;
        }
        if self.is_connected(&peer.pubkey) {
            debug!(peer = %peer, "already connected, not dialing");
            return;
        }
        info!(peer = %peer, "dialing peer");
        tokio::spawn(async move {
            if let Err(err) = PeerConnection::dial(peer.clone(), ctx).await {
                debug!(peer = %peer, error = %err, "outbound connection ended");
            }
        });
    }

    /// Canonical decoder for peer lists embedded in ping payloads.
    pub fn rlp_decode_peers(data: &[u8]) -> NetworkResult<Vec<Peer>> {
        peers_from_item(&decode(data)?)
    }

    /// Inverse of [`rlp_decode_peers`](Self::rlp_decode_peers).
    pub fn rlp_encode_peers(peers: &[Peer]) -> Vec<u8> {
        encode(&peers_to_item(peers))
    }
}

/// Decode a peer list item: each peer is `[pubkey, host, port]` with the
/// host in binary form (4 or 16 bytes).
pub(crate) fn peers_from_item(item: &RlpItem) -> NetworkResult<Vec<Peer>> {
    let mut peers = Vec::new();
    for entry in item.as_list()? {
        let fields = entry.as_list()?;
        if fields.len() != 3 {
            return Err(NetworkError::InvalidMessage(format!(
                "peer entry with {} fields",
                fields.len()
            )));
        }
        let pubkey: [u8; 32] = fields[0].to_fixed()?;
        let host_bytes = fields[1].as_bytes()?;
        let host = match host_bytes.len() {
            4 => {
                let octets: [u8; 4] = host_bytes.try_into().expect("checked length");
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            16 => {
                let octets: [u8; 16] = host_bytes.try_into().expect("checked length");
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            n => {
                return Err(NetworkError::InvalidMessage(format!(
                    "peer host of {n} bytes"
                )))
            }
        };
        let port = fields[2].to_u64()?;
        if port > u16::MAX as u64 {
            return Err(NetworkError::InvalidMessage(format!(
                "peer port {port} out of range"
            )));
        }
        peers.push(Peer::new(pubkey, host, port as u16));
    }
    Ok(peers)
}

/// Encode a peer list to its wire item.
pub(crate) fn peers_to_item(peers: &[Peer]) -> RlpItem {
    RlpItem::List(
        peers
            .iter()
            .map(|peer| {
                let host = match peer.host {
                    IpAddr::V4(v4) => v4.octets().to_vec(),
                    IpAddr::V6(v6) => v6.octets().to_vec(),
                };
                RlpItem::List(vec![
                    RlpItem::bytes(peer.pubkey.to_vec()),
                    RlpItem::bytes(host),
                    RlpItem::from_u64(peer.port as u64),
                ])
            })
            .collect(),
    )
}
