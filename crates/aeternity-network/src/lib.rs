//! # aeternity-network
//!
//! Peer-to-peer listener for aeternity block announcements.
//!
//! This crate provides:
//! - Noise_XK encrypted sessions over TCP
//! - Application-level fragmentation and reassembly
//! - The typed message set and its RLP codecs
//! - A shared peer registry and the per-connection state machine
//! - A network service publishing key blocks and block transactions
//!
//! The listener is a read-only observer: it answers pings and follows block
//! announcements, but never serves blocks, gossips transactions, or takes
//! part in consensus.

mod connection;
mod error;
mod fragment;
mod message;
mod noise;
mod registry;
mod service;

pub use connection::{ConnectionContext, ConnectionState, PeerConnection};
pub use error::{NetworkError, NetworkResult};
pub use fragment::{fragment_message, is_fragment, Reassembler};
pub use message::{
    BlockTxs, GetBlockTxs, KeyBlockAnnouncement, Message, MessageType, MicroBlockAnnouncement,
    PingPayload, Response,
};
pub use noise::{frame_stream, Keypair, NoiseFrameCodec, NoiseFramed, NoiseSession, NOISE_PARAMS};
pub use registry::{Peer, PeerRegistry};
pub use service::{ChainEvent, ListenerConfig, NetworkService};

use std::time::Duration;

/// Wire protocol version carried in pings and the Noise prologue.
pub const PROTOCOL_VERSION: u64 = 1;

/// Default P2P port.
pub const DEFAULT_PORT: u16 = 3015;

/// Largest datagram handed to the Noise session in one piece.
pub const MAX_PACKET_SIZE: usize = 511;

/// Payload bytes per fragment; the remainder rides in the last one.
pub const FRAGMENT_SIZE: usize = 507;

/// Ceiling on a reassembled logical message.
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024; // 10 MB

/// Advisory cap on peers shared in a ping.
pub const PING_SHARE: u64 = 32;

/// Noise handshake must complete within this window.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// An accepted peer must complete a ping exchange within this window.
pub const FIRST_PING_TIMEOUT: Duration = Duration::from_secs(30);

/// Genesis hash for mainnet.
pub const MAINNET_GENESIS_HASH: [u8; 32] = [
    0x6C, 0x15, 0xDA, 0x6E, 0xBF, 0xAF, 0x02, 0x78, 0xFE, 0xAF, 0x4D, 0xF1, 0xB0, 0xF1, 0xA9,
    0x82, 0x55, 0x07, 0xAE, 0x7B, 0x9A, 0x49, 0x4B, 0xC3, 0x4C, 0x91, 0x71, 0x3F, 0x38, 0xDD,
    0x57, 0x83,
];

/// Genesis hash for testnet.
pub const TESTNET_GENESIS_HASH: [u8; 32] = [
    0xAE, 0x24, 0x94, 0xDB, 0xE0, 0xAD, 0xCC, 0x8A, 0x62, 0xB1, 0xDE, 0x13, 0x51, 0x14, 0xF8,
    0x79, 0x22, 0xFB, 0x96, 0x61, 0x0B, 0x0C, 0x82, 0x00, 0x06, 0xBA, 0x8A, 0xEF, 0x45, 0x55,
    0x52, 0xCE,
];

/// Network selector. The genesis hash doubles as the network identifier
/// inside the Noise prologue and as the ping-time network guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkId {
    Mainnet,
    Testnet,
}

impl NetworkId {
    /// Genesis hash for this network.
    pub fn genesis_hash(&self) -> [u8; 32] {
        match self {
            NetworkId::Mainnet => MAINNET_GENESIS_HASH,
            NetworkId::Testnet => TESTNET_GENESIS_HASH,
        }
    }

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            NetworkId::Mainnet => "mainnet",
            NetworkId::Testnet => "testnet",
        }
    }
}

impl std::str::FromStr for NetworkId {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(NetworkId::Mainnet),
            "testnet" => Ok(NetworkId::Testnet),
            other => Err(NetworkError::UnknownNetwork(other.to_string())),
        }
    }
}

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
