//! Encoding error types.

use thiserror::Error;

/// Identifier encoding errors.
#[derive(Error, Debug)]
pub enum EncodingError {
    /// Identifier lacks the `<tag>_` separator.
    #[error("Identifier without prefix: {0}")]
    MissingPrefix(String),

    /// Tag not in the known set.
    #[error("Unknown prefix tag: {0}")]
    UnknownPrefix(String),

    /// Tag valid but not the one the caller required.
    #[error("Wrong prefix: expected {expected}_, found {found}_")]
    WrongPrefix {
        expected: &'static str,
        found: &'static str,
    },

    /// Base58 alphabet or checksum failure.
    #[error("Base58check failure: {0}")]
    Base58(String),
}

/// Result type for encoding operations.
pub type EncodingResult<T> = Result<T, EncodingError>;
