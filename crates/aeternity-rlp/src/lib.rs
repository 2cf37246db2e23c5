//! # aeternity-rlp
//!
//! Recursive length prefix (RLP) codec for aeternity wire structures.
//!
//! This crate provides:
//! - Encoding of byte strings and arbitrarily nested lists
//! - Strict decoding that rejects non-canonical and truncated input
//! - Unsigned integer helpers (minimal big-endian byte strings)

mod decode;
mod encode;
mod error;
mod item;

pub use decode::{decode, decode_prefix};
pub use encode::encode;
pub use error::{RlpError, RlpResult};
pub use item::RlpItem;

/// Longest payload encodable in the short form (single length byte).
pub const SHORT_FORM_MAX: usize = 55;

/// First byte of a short-form byte string (empty string encodes as 0x80).
pub const BYTES_OFFSET: u8 = 0x80;

/// First byte of a short-form list (empty list encodes as 0xC0).
pub const LIST_OFFSET: u8 = 0xC0;
