//! Network error types.

use aeternity_rlp::RlpError;
use aeternity_serialization::SerializationError;
use thiserror::Error;

/// Listener errors.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Connection closed by the remote side.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Noise handshake failure.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// TCP connect did not finish inside its window.
    #[error("Connect timed out")]
    ConnectTimeout,

    /// Noise handshake did not finish inside its window.
    #[error("Handshake timed out")]
    HandshakeTimeout,

    /// Accepted peer never completed a ping exchange.
    #[error("First ping timed out")]
    FirstPingTimeout,

    /// An earlier session already owns this peer.
    #[error("Peer already has a live session")]
    DuplicateConnection,

    /// Wire code outside the defined message set.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(u16),

    /// Structurally broken payload.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Reassembled message over the size ceiling.
    #[error("Message too large: {size} bytes, max {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    /// Fragment sequencing violation.
    #[error("Fragment out of order: expected index {expected}, got {found}")]
    FragmentOutOfOrder { expected: u16, found: u16 },

    /// Fragment total differs from the one announced first.
    #[error("Fragment total changed: announced {announced}, got {found}")]
    FragmentTotalChanged { announced: u16, found: u16 },

    /// Fragment with no payload or an impossible header.
    #[error("Malformed fragment: {0}")]
    MalformedFragment(String),

    /// Network name outside {mainnet, testnet}.
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    /// Noise layer failure.
    #[error("Noise failure: {0}")]
    Noise(#[from] snow::Error),

    /// RLP failure in a payload.
    #[error("RLP failure: {0}")]
    Rlp(#[from] RlpError),

    /// Chain object failure in a payload.
    #[error("Serialization failure: {0}")]
    Serialization(#[from] SerializationError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
