//! Test data builders.

use aeternity_rlp::RlpItem;
use aeternity_serialization::{
    KeyBlockHeader, MicroBlockHeader, SignedTransaction, POW_EVIDENCE_LEN,
};

/// A key block header with recognizable field values.
pub fn key_block_header(height: u64) -> KeyBlockHeader {
    KeyBlockHeader {
        version: 1,
        info_flag: false,
        height,
        prev_hash: [0x11; 32],
        prev_key_hash: [0x12; 32],
        root_hash: [0x13; 32],
        miner: [0x14; 32],
        beneficiary: [0x15; 32],
        target: 0x2100FFFF,
        pow_evidence: [3; POW_EVIDENCE_LEN],
        nonce: height.wrapping_mul(7919),
        time: 1_700_000_000_000 + height,
        info: Vec::new(),
    }
}

/// A key block header padded with info bytes so its announcement spans
/// several fragments on the wire.
pub fn oversized_key_block_header(height: u64, info_len: usize) -> KeyBlockHeader {
    let mut header = key_block_header(height);
    header.info_flag = true;
    header.info = (0..info_len).map(|i| (i % 251) as u8).collect();
    header
}

/// A micro block header chained under the given key block height.
pub fn micro_block_header(height: u64) -> MicroBlockHeader {
    MicroBlockHeader {
        version: 1,
        pof_flag: false,
        height,
        prev_hash: [0x21; 32],
        prev_key_hash: [0x22; 32],
        root_hash: [0x23; 32],
        txs_hash: [0x24; 32],
        time: 1_700_000_000_500 + height,
        trailing: Vec::new(),
    }
}

/// A signed transaction with an opaque spend-like body.
pub fn signed_tx(seed: u8) -> SignedTransaction {
    let tx_body = aeternity_rlp::encode(&RlpItem::List(vec![
        RlpItem::from_u64(12),
        RlpItem::from_u64(1),
        RlpItem::bytes(vec![seed; 32]),
        RlpItem::from_u64(20_000 + seed as u64),
    ]));
    SignedTransaction {
        signatures: vec![vec![seed; 64]],
        tx_body,
        tx_type_tag: 12,
    }
}
