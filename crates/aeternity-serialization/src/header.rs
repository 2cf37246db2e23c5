//! Bit-exact block header layouts.
//!
//! Both header kinds share a fixed big-endian prefix:
//!
//! ```text
//! +----------+----------+--------+- ... -+
//! | version  |  flags   | height |  ...  |
//! | 4 bytes  | 4 bytes  | 8 bytes|       |
//! +----------+----------+--------+- ... -+
//! ```
//!
//! The flags word packs sub-byte fields: bit 31 is the header-type bit
//! (1 = key block, 0 = micro block), bit 30 is the info flag on key blocks
//! and the proof-of-fraud flag on micro blocks, and the remaining 30 bits
//! are reserved and must be zero. Parsing is explicit bit manipulation;
//! host struct layout is never relied on.

use crate::{SerializationError, SerializationResult};
use aeternity_encoding::{blake2b256, encode as encode_id, Prefix};
use bytes::{Buf, BufMut, BytesMut};

/// Number of u32 words in the proof-of-work evidence.
pub const POW_EVIDENCE_LEN: usize = 42;

/// Header-type bit: set on key block headers.
const FLAG_KEY_HEADER: u32 = 1 << 31;
/// Info flag (key blocks) / proof-of-fraud flag (micro blocks).
const FLAG_AUX: u32 = 1 << 30;
/// All defined flag bits; the rest are reserved.
const FLAG_MASK: u32 = FLAG_KEY_HEADER | FLAG_AUX;

/// Fixed-size part of a key block header.
const KEY_HEADER_BASE_LEN: usize = 4 + 4 + 8 + 32 * 5 + 4 + POW_EVIDENCE_LEN * 4 + 8 + 8;

/// Fixed-size part of a micro block header.
const MICRO_HEADER_BASE_LEN: usize = 4 + 4 + 8 + 32 * 4 + 8;

/// Key block header, raw binary view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBlockHeader {
    pub version: u32,
    /// Info flag from the packed flags word.
    pub info_flag: bool,
    pub height: u64,
    pub prev_hash: [u8; 32],
    pub prev_key_hash: [u8; 32],
    pub root_hash: [u8; 32],
    pub miner: [u8; 32],
    pub beneficiary: [u8; 32],
    pub target: u32,
    pub pow_evidence: [u32; POW_EVIDENCE_LEN],
    pub nonce: u64,
    pub time: u64,
    /// Trailing info bytes, empty when the info flag is clear.
    pub info: Vec<u8>,
}

impl KeyBlockHeader {
    /// Parse the bit-packed layout.
    pub fn parse(data: &[u8]) -> SerializationResult<Self> {
        if data.len() < KEY_HEADER_BASE_LEN {
            return Err(SerializationError::TruncatedHeader {
                expected: KEY_HEADER_BASE_LEN,
                found: data.len(),
            });
        }
        let mut buf = data;
        let version = buf.get_u32();
        let flags = buf.get_u32();
        if flags & FLAG_KEY_HEADER == 0 {
            return Err(SerializationError::WrongHeaderType { expected: "key" });
        }
        if flags & !FLAG_MASK != 0 {
            return Err(SerializationError::ReservedFlagsSet(flags & !FLAG_MASK));
        }
        let height = buf.get_u64();
        let mut prev_hash = [0u8; 32];
        buf.copy_to_slice(&mut prev_hash);
        let mut prev_key_hash = [0u8; 32];
        buf.copy_to_slice(&mut prev_key_hash);
        let mut root_hash = [0u8; 32];
        buf.copy_to_slice(&mut root_hash);
        let mut miner = [0u8; 32];
        buf.copy_to_slice(&mut miner);
        let mut beneficiary = [0u8; 32];
        buf.copy_to_slice(&mut beneficiary);
        let target = buf.get_u32();
        let mut pow_evidence = [0u32; POW_EVIDENCE_LEN];
        for word in pow_evidence.iter_mut() {
            *word = buf.get_u32();
        }
        let nonce = buf.get_u64();
        let time = buf.get_u64();
        let info = buf.to_vec();

        Ok(Self {
            version,
            info_flag: flags & FLAG_AUX != 0,
            height,
            prev_hash,
            prev_key_hash,
            root_hash,
            miner,
            beneficiary,
            target,
            pow_evidence,
            nonce,
            time,
            info,
        })
    }

    /// Exact inverse of [`parse`](Self::parse).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(KEY_HEADER_BASE_LEN + self.info.len());
        buf.put_u32(self.version);
        let mut flags = FLAG_KEY_HEADER;
        if self.info_flag {
            flags |= FLAG_AUX;
        }
        buf.put_u32(flags);
        buf.put_u64(self.height);
        buf.put_slice(&self.prev_hash);
        buf.put_slice(&self.prev_key_hash);
        buf.put_slice(&self.root_hash);
        buf.put_slice(&self.miner);
        buf.put_slice(&self.beneficiary);
        buf.put_u32(self.target);
        for word in &self.pow_evidence {
            buf.put_u32(*word);
        }
        buf.put_u64(self.nonce);
        buf.put_u64(self.time);
        buf.put_slice(&self.info);
        buf.to_vec()
    }

    /// API-facing view of this header, computed over its raw bytes.
    pub fn to_key_block(&self) -> KeyBlock {
        let raw = self.to_bytes();
        // A key block on top of a micro block points at the micro block with
        // prev_hash while prev_key_hash names the last key ancestor; only
        // when both coincide is prev_hash itself a key block hash.
        let prev_prefix = if self.prev_hash == self.prev_key_hash {
            Prefix::KeyBlockHash
        } else {
            Prefix::MicroBlockHash
        };
        KeyBlock {
            hash: encode_id(Prefix::KeyBlockHash, &blake2b256(&raw)),
            version: self.version,
            height: self.height,
            prev_hash: encode_id(prev_prefix, &self.prev_hash),
            prev_key_hash: encode_id(Prefix::KeyBlockHash, &self.prev_key_hash),
            root_hash: encode_id(Prefix::BlockStateHash, &self.root_hash),
            miner: encode_id(Prefix::AccountPubkey, &self.miner),
            beneficiary: encode_id(Prefix::AccountPubkey, &self.beneficiary),
            target: self.target,
            pow_evidence: self.pow_evidence.to_vec(),
            nonce: self.nonce,
            time: self.time,
            info: encode_id(Prefix::ContractBytearray, &self.info),
        }
    }
}

/// Micro block header, raw binary view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicroBlockHeader {
    pub version: u32,
    /// Proof-of-fraud flag from the packed flags word.
    pub pof_flag: bool,
    pub height: u64,
    pub prev_hash: [u8; 32],
    pub prev_key_hash: [u8; 32],
    pub root_hash: [u8; 32],
    pub txs_hash: [u8; 32],
    pub time: u64,
    /// Trailing bytes, present when a proof of fraud is attached.
    pub trailing: Vec<u8>,
}

impl MicroBlockHeader {
    /// Parse the bit-packed layout.
    pub fn parse(data: &[u8]) -> SerializationResult<Self> {
        if data.len() < MICRO_HEADER_BASE_LEN {
            return Err(SerializationError::TruncatedHeader {
                expected: MICRO_HEADER_BASE_LEN,
                found: data.len(),
            });
        }
        let mut buf = data;
        let version = buf.get_u32();
        let flags = buf.get_u32();
        if flags & FLAG_KEY_HEADER != 0 {
            return Err(SerializationError::WrongHeaderType { expected: "micro" });
        }
        if flags & !FLAG_MASK != 0 {
            return Err(SerializationError::ReservedFlagsSet(flags & !FLAG_MASK));
        }
        let height = buf.get_u64();
        let mut prev_hash = [0u8; 32];
        buf.copy_to_slice(&mut prev_hash);
        let mut prev_key_hash = [0u8; 32];
        buf.copy_to_slice(&mut prev_key_hash);
        let mut root_hash = [0u8; 32];
        buf.copy_to_slice(&mut root_hash);
        let mut txs_hash = [0u8; 32];
        buf.copy_to_slice(&mut txs_hash);
        let time = buf.get_u64();
        let trailing = buf.to_vec();

        Ok(Self {
            version,
            pof_flag: flags & FLAG_AUX != 0,
            height,
            prev_hash,
            prev_key_hash,
            root_hash,
            txs_hash,
            time,
            trailing,
        })
    }

    /// Exact inverse of [`parse`](Self::parse).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(MICRO_HEADER_BASE_LEN + self.trailing.len());
        buf.put_u32(self.version);
        let flags = if self.pof_flag { FLAG_AUX } else { 0 };
        buf.put_u32(flags);
        buf.put_u64(self.height);
        buf.put_slice(&self.prev_hash);
        buf.put_slice(&self.prev_key_hash);
        buf.put_slice(&self.root_hash);
        buf.put_slice(&self.txs_hash);
        buf.put_u64(self.time);
        buf.put_slice(&self.trailing);
        buf.to_vec()
    }

    /// Blake2b-256 over the raw header bytes.
    pub fn hash(&self) -> [u8; 32] {
        blake2b256(&self.to_bytes())
    }

    /// API-facing view of this header.
    pub fn to_info(&self) -> MicroBlockInfo {
        let prev_prefix = if self.prev_hash == self.prev_key_hash {
            Prefix::KeyBlockHash
        } else {
            Prefix::MicroBlockHash
        };
        MicroBlockInfo {
            hash: encode_id(Prefix::MicroBlockHash, &self.hash()),
            version: self.version,
            height: self.height,
            prev_hash: encode_id(prev_prefix, &self.prev_hash),
            prev_key_hash: encode_id(Prefix::KeyBlockHash, &self.prev_key_hash),
            root_hash: encode_id(Prefix::BlockStateHash, &self.root_hash),
            txs_hash: encode_id(Prefix::BlockTxHash, &self.txs_hash),
            time: self.time,
        }
    }
}

/// Decoded key block as surfaced to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBlock {
    /// `kh_` hash of the header bytes.
    pub hash: String,
    pub version: u32,
    pub height: u64,
    /// `mh_` unless this block sits directly on its key ancestor, then `kh_`.
    pub prev_hash: String,
    /// `kh_` hash of the previous key block.
    pub prev_key_hash: String,
    /// `bs_` state root.
    pub root_hash: String,
    /// `ak_` miner account.
    pub miner: String,
    /// `ak_` beneficiary account.
    pub beneficiary: String,
    pub target: u32,
    pub pow_evidence: Vec<u32>,
    pub nonce: u64,
    pub time: u64,
    /// `cb_` info bytes.
    pub info: String,
}

/// Decoded micro block header as surfaced to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicroBlockInfo {
    /// `mh_` hash of the header bytes.
    pub hash: String,
    pub version: u32,
    pub height: u64,
    pub prev_hash: String,
    pub prev_key_hash: String,
    /// `bs_` state root.
    pub root_hash: String,
    /// `bx_` transaction root.
    pub txs_hash: String,
    pub time: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key_header() -> KeyBlockHeader {
        KeyBlockHeader {
            version: 1,
            info_flag: true,
            height: 650_000,
            prev_hash: [0x01; 32],
            prev_key_hash: [0x02; 32],
            root_hash: [0x03; 32],
            miner: [0x04; 32],
            beneficiary: [0x05; 32],
            target: 0x1F03_93F2,
            pow_evidence: std::array::from_fn(|i| i as u32 * 1000 + 7),
            nonce: 0xDEAD_BEEF_0123_4567,
            time: 1_700_000_000_000,
            info: vec![0x00, 0x00, 0x02, 0x9F],
        }
    }

    fn sample_micro_header() -> MicroBlockHeader {
        MicroBlockHeader {
            version: 1,
            pof_flag: false,
            height: 650_001,
            prev_hash: [0x0A; 32],
            prev_key_hash: [0x0B; 32],
            root_hash: [0x0C; 32],
            txs_hash: [0x0D; 32],
            time: 1_700_000_003_000,
            trailing: Vec::new(),
        }
    }

    #[test]
    fn key_header_roundtrip() {
        let header = sample_key_header();
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), KEY_HEADER_BASE_LEN + 4);
        assert_eq!(KeyBlockHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn key_header_flags_word_layout() {
        let header = sample_key_header();
        let bytes = header.to_bytes();
        // version 1, then flags with bit 31 (key) and bit 30 (info) set.
        assert_eq!(&bytes[0..4], &[0, 0, 0, 1]);
        assert_eq!(&bytes[4..8], &[0xC0, 0, 0, 0]);
    }

    #[test]
    fn key_header_rejects_micro_type_bit() {
        let mut bytes = sample_key_header().to_bytes();
        bytes[4] &= !0x80;
        assert!(matches!(
            KeyBlockHeader::parse(&bytes),
            Err(SerializationError::WrongHeaderType { expected: "key" })
        ));
    }

    #[test]
    fn key_header_rejects_reserved_bits() {
        let mut bytes = sample_key_header().to_bytes();
        bytes[7] |= 0x01;
        assert!(matches!(
            KeyBlockHeader::parse(&bytes),
            Err(SerializationError::ReservedFlagsSet(1))
        ));
    }

    #[test]
    fn key_header_rejects_truncation() {
        let bytes = sample_key_header().to_bytes();
        assert!(matches!(
            KeyBlockHeader::parse(&bytes[..KEY_HEADER_BASE_LEN - 1]),
            Err(SerializationError::TruncatedHeader { .. })
        ));
    }

    #[test]
    fn key_block_view_prefixes() {
        let block = sample_key_header().to_key_block();
        assert!(block.hash.starts_with("kh_"));
        assert!(block.prev_hash.starts_with("mh_"));
        assert!(block.prev_key_hash.starts_with("kh_"));
        assert!(block.root_hash.starts_with("bs_"));
        assert!(block.miner.starts_with("ak_"));
        assert!(block.beneficiary.starts_with("ak_"));
        assert!(block.info.starts_with("cb_"));
        assert_eq!(block.pow_evidence.len(), POW_EVIDENCE_LEN);
    }

    #[test]
    fn key_block_prev_prefix_follows_key_ancestor_rule() {
        let mut header = sample_key_header();
        header.prev_hash = header.prev_key_hash;
        let block = header.to_key_block();
        assert!(block.prev_hash.starts_with("kh_"));
    }

    #[test]
    fn micro_header_roundtrip() {
        let header = sample_micro_header();
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), MICRO_HEADER_BASE_LEN);
        assert_eq!(MicroBlockHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn micro_header_pof_flag_roundtrip() {
        let mut header = sample_micro_header();
        header.pof_flag = true;
        header.trailing = vec![0xEE; 40];
        let parsed = MicroBlockHeader::parse(&header.to_bytes()).unwrap();
        assert!(parsed.pof_flag);
        assert_eq!(parsed.trailing.len(), 40);
    }

    #[test]
    fn micro_header_rejects_key_type_bit() {
        let mut bytes = sample_micro_header().to_bytes();
        bytes[4] |= 0x80;
        assert!(matches!(
            MicroBlockHeader::parse(&bytes),
            Err(SerializationError::WrongHeaderType { expected: "micro" })
        ));
    }

    #[test]
    fn micro_hash_matches_manual_blake2b() {
        let header = sample_micro_header();
        assert_eq!(header.hash(), blake2b256(&header.to_bytes()));
    }

    #[test]
    fn micro_info_prefixes() {
        let info = sample_micro_header().to_info();
        assert!(info.hash.starts_with("mh_"));
        assert!(info.txs_hash.starts_with("bx_"));
        assert!(info.root_hash.starts_with("bs_"));
    }
}
