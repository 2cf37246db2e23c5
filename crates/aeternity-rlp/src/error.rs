//! RLP error types.

use thiserror::Error;

/// RLP codec errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RlpError {
    /// Input ended before the announced payload.
    #[error("Truncated input: need {needed} more bytes")]
    Truncated { needed: usize },

    /// Input continues past the decoded item.
    #[error("Trailing bytes after item: {0} left over")]
    TrailingBytes(usize),

    /// Single byte below 0x80 must encode as itself.
    #[error("Non-canonical single byte encoding")]
    NonCanonicalByte,

    /// Payload below 56 bytes must use the short form.
    #[error("Non-canonical length: short form required for {0} bytes")]
    NonCanonicalLength(usize),

    /// Multi-byte length field carries leading zeroes.
    #[error("Length field has leading zero bytes")]
    LeadingZeroLength,

    /// Length field wider than the platform can address.
    #[error("Length field of {0} bytes exceeds supported width")]
    LengthOverflow(usize),

    /// Empty input where an item was expected.
    #[error("Empty input")]
    Empty,

    /// Item is a list where a byte string was expected, or vice versa.
    #[error("Unexpected item kind: expected {expected}")]
    UnexpectedKind { expected: &'static str },

    /// Integer field wider than 8 bytes.
    #[error("Integer field of {0} bytes does not fit u64")]
    IntegerOverflow(usize),

    /// Integer field with a leading zero byte.
    #[error("Non-canonical integer: leading zero byte")]
    NonCanonicalInteger,
}

/// Result type for RLP operations.
pub type RlpResult<T> = Result<T, RlpError>;
