//! Serialization error types.

use aeternity_rlp::RlpError;
use thiserror::Error;

/// Chain object and header errors.
#[derive(Error, Debug)]
pub enum SerializationError {
    /// Underlying RLP failure.
    #[error("RLP failure: {0}")]
    Rlp(#[from] RlpError),

    /// Object carries a different tag than the template expects.
    #[error("Unexpected object tag: expected {expected}, found {found}")]
    UnexpectedTag { expected: u64, found: u64 },

    /// Object version the decoder does not understand.
    #[error("Unsupported object version {found} for tag {tag}")]
    UnsupportedVersion { tag: u64, found: u64 },

    /// Field list does not match the template arity.
    #[error("Wrong field count: expected {expected}, found {found}")]
    FieldCount { expected: usize, found: usize },

    /// Header shorter than its fixed prefix.
    #[error("Truncated header: need at least {expected} bytes, found {found}")]
    TruncatedHeader { expected: usize, found: usize },

    /// Header-type bit does not match the expected block kind.
    #[error("Header type bit does not mark a {expected} block")]
    WrongHeaderType { expected: &'static str },

    /// Reserved flag bits must be zero.
    #[error("Reserved header flag bits are set: {0:#010x}")]
    ReservedFlagsSet(u32),

    /// Hash field of the wrong width.
    #[error("Hash field must be 32 bytes, found {0}")]
    BadHashWidth(usize),
}

/// Result type for serialization operations.
pub type SerializationResult<T> = Result<T, SerializationError>;
