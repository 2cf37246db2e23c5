//! Identifier type tags.

use crate::{EncodingError, EncodingResult};

/// Type tag carried ahead of every API-facing identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prefix {
    /// Key block hash (`kh_`).
    KeyBlockHash,
    /// Micro block hash (`mh_`).
    MicroBlockHash,
    /// Block state root (`bs_`).
    BlockStateHash,
    /// Block transaction root (`bx_`).
    BlockTxHash,
    /// Account public key (`ak_`).
    AccountPubkey,
    /// Transaction hash (`th_`).
    TxHash,
    /// Contract bytearray (`cb_`).
    ContractBytearray,
    /// Peer public key (`pp_`).
    PeerPubkey,
}

impl Prefix {
    /// The two-character tag, without the separator.
    pub fn tag(self) -> &'static str {
        match self {
            Prefix::KeyBlockHash => "kh",
            Prefix::MicroBlockHash => "mh",
            Prefix::BlockStateHash => "bs",
            Prefix::BlockTxHash => "bx",
            Prefix::AccountPubkey => "ak",
            Prefix::TxHash => "th",
            Prefix::ContractBytearray => "cb",
            Prefix::PeerPubkey => "pp",
        }
    }

    /// Parse a tag back to its prefix.
    pub fn from_tag(tag: &str) -> EncodingResult<Self> {
        match tag {
            "kh" => Ok(Prefix::KeyBlockHash),
            "mh" => Ok(Prefix::MicroBlockHash),
            "bs" => Ok(Prefix::BlockStateHash),
            "bx" => Ok(Prefix::BlockTxHash),
            "ak" => Ok(Prefix::AccountPubkey),
            "th" => Ok(Prefix::TxHash),
            "cb" => Ok(Prefix::ContractBytearray),
            "pp" => Ok(Prefix::PeerPubkey),
            other => Err(EncodingError::UnknownPrefix(other.to_string())),
        }
    }
}

impl std::fmt::Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}
