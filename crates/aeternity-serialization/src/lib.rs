//! # aeternity-serialization
//!
//! Chain object deserialization for the aeternity wire protocol.
//!
//! This crate provides:
//! - The type+version tagged object envelope (`[tag, vsn, field...]` RLP lists)
//! - The light micro block template and the signed transaction envelope
//! - Bit-exact key and micro block header layouts
//! - Decoded, API-facing views carrying prefixed identifiers

mod error;
mod header;
mod object;

pub use error::{SerializationError, SerializationResult};
pub use header::{KeyBlock, KeyBlockHeader, MicroBlockHeader, MicroBlockInfo, POW_EVIDENCE_LEN};
pub use object::{LightMicroBody, ObjectTag, SignedTransaction};
