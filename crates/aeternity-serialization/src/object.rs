//! Type+version tagged chain objects.
//!
//! Serialized chain objects are RLP lists of the form `[tag, vsn, field...]`.
//! The tag selects the template, the version gates layout changes. Only the
//! two templates the listener consumes are implemented here; transaction
//! bodies stay opaque apart from their own leading tag.

use crate::{SerializationError, SerializationResult};
use aeternity_encoding::blake2b256;
use aeternity_rlp::{decode, encode, RlpItem};

/// Object tags understood by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum ObjectTag {
    /// Signed transaction envelope.
    SignedTransaction = 11,
    /// Micro block body without full transactions.
    LightMicroBlock = 101,
}

impl ObjectTag {
    /// Wire value of the tag.
    pub fn value(self) -> u64 {
        self as u64
    }
}

/// Split a serialized object into (tag, vsn, fields), checking the template.
fn open_envelope(
    data: &[u8],
    expected: ObjectTag,
    vsn: u64,
    arity: usize,
) -> SerializationResult<Vec<RlpItem>> {
    let item = decode(data)?;
    let fields = item.as_list()?;
    if fields.len() != arity + 2 {
        return Err(SerializationError::FieldCount {
            expected: arity + 2,
            found: fields.len(),
        });
    }
    let tag = fields[0].to_u64()?;
    if tag != expected.value() {
        return Err(SerializationError::UnexpectedTag {
            expected: expected.value(),
            found: tag,
        });
    }
    let found_vsn = fields[1].to_u64()?;
    if found_vsn != vsn {
        return Err(SerializationError::UnsupportedVersion {
            tag,
            found: found_vsn,
        });
    }
    Ok(fields[2..].to_vec())
}

/// Wrap fields into a tagged envelope.
fn seal_envelope(tag: ObjectTag, vsn: u64, fields: Vec<RlpItem>) -> Vec<u8> {
    let mut items = Vec::with_capacity(fields.len() + 2);
    items.push(RlpItem::from_u64(tag.value()));
    items.push(RlpItem::from_u64(vsn));
    items.extend(fields);
    encode(&RlpItem::List(items))
}

/// Light micro block body: the raw header plus transaction hashes and an
/// optional proof of fraud, without the transactions themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightMicroBody {
    /// Raw micro block header bytes.
    pub header: Vec<u8>,
    /// Hashes of the transactions contained in the block.
    pub tx_hashes: Vec<[u8; 32]>,
    /// Proof of fraud objects, empty when absent.
    pub pof: Vec<Vec<u8>>,
}

impl LightMicroBody {
    const VSN: u64 = 1;

    /// Deserialize a tagged light micro block body.
    pub fn deserialize(data: &[u8]) -> SerializationResult<Self> {
        let fields = open_envelope(data, ObjectTag::LightMicroBlock, Self::VSN, 3)?;
        let header = fields[0].as_bytes()?.to_vec();
        let mut tx_hashes = Vec::new();
        for item in fields[1].as_list()? {
            let bytes = item.as_bytes()?;
            let hash: [u8; 32] = bytes
                .try_into()
                .map_err(|_| SerializationError::BadHashWidth(bytes.len()))?;
            tx_hashes.push(hash);
        }
        let mut pof = Vec::new();
        for item in fields[2].as_list()? {
            pof.push(item.as_bytes()?.to_vec());
        }
        Ok(Self {
            header,
            tx_hashes,
            pof,
        })
    }

    /// Serialize back to the tagged envelope.
    pub fn serialize(&self) -> Vec<u8> {
        seal_envelope(
            ObjectTag::LightMicroBlock,
            Self::VSN,
            vec![
                RlpItem::bytes(self.header.clone()),
                RlpItem::List(
                    self.tx_hashes
                        .iter()
                        .map(|h| RlpItem::bytes(h.to_vec()))
                        .collect(),
                ),
                RlpItem::List(self.pof.iter().map(|p| RlpItem::bytes(p.clone())).collect()),
            ],
        )
    }
}

/// Signed transaction envelope. The inner transaction body keeps its own
/// `[tag, vsn, ...]` prefix and is not interpreted beyond that tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Signatures over the inner transaction.
    pub signatures: Vec<Vec<u8>>,
    /// Serialized inner transaction, tag prefix included.
    pub tx_body: Vec<u8>,
    /// Leading object tag of the inner transaction.
    pub tx_type_tag: u64,
}

impl SignedTransaction {
    const VSN: u64 = 1;

    /// Deserialize a tagged signed transaction.
    pub fn deserialize(data: &[u8]) -> SerializationResult<Self> {
        let fields = open_envelope(data, ObjectTag::SignedTransaction, Self::VSN, 2)?;
        let mut signatures = Vec::new();
        for item in fields[0].as_list()? {
            signatures.push(item.as_bytes()?.to_vec());
        }
        let tx_body = fields[1].as_bytes()?.to_vec();
        let inner = decode(&tx_body)?;
        let inner_fields = inner.as_list()?;
        if inner_fields.len() < 2 {
            return Err(SerializationError::FieldCount {
                expected: 2,
                found: inner_fields.len(),
            });
        }
        let tx_type_tag = inner_fields[0].to_u64()?;
        Ok(Self {
            signatures,
            tx_body,
            tx_type_tag,
        })
    }

    /// Serialize back to the tagged envelope.
    pub fn serialize(&self) -> Vec<u8> {
        seal_envelope(
            ObjectTag::SignedTransaction,
            Self::VSN,
            vec![
                RlpItem::List(
                    self.signatures
                        .iter()
                        .map(|s| RlpItem::bytes(s.clone()))
                        .collect(),
                ),
                RlpItem::bytes(self.tx_body.clone()),
            ],
        )
    }

    /// Transaction hash: Blake2b-256 over the serialized envelope.
    pub fn hash(&self) -> [u8; 32] {
        blake2b256(&self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque_tx_body(tag: u64) -> Vec<u8> {
        encode(&RlpItem::List(vec![
            RlpItem::from_u64(tag),
            RlpItem::from_u64(1),
            RlpItem::bytes(vec![0xAA; 16]),
        ]))
    }

    #[test]
    fn light_micro_body_roundtrip() {
        let body = LightMicroBody {
            header: vec![0x42; 156],
            tx_hashes: vec![[0x11; 32], [0x22; 32]],
            pof: vec![],
        };
        let serialized = body.serialize();
        assert_eq!(LightMicroBody::deserialize(&serialized).unwrap(), body);
    }

    #[test]
    fn light_micro_body_rejects_wrong_tag() {
        let sealed = seal_envelope(
            ObjectTag::SignedTransaction,
            1,
            vec![
                RlpItem::bytes(vec![]),
                RlpItem::List(vec![]),
                RlpItem::List(vec![]),
            ],
        );
        let err = LightMicroBody::deserialize(&sealed).unwrap_err();
        assert!(matches!(
            err,
            SerializationError::UnexpectedTag {
                expected: 101,
                found: 11
            }
        ));
    }

    #[test]
    fn light_micro_body_rejects_short_hash() {
        let mangled = seal_envelope(
            ObjectTag::LightMicroBlock,
            1,
            vec![
                RlpItem::bytes(vec![0x42; 156]),
                RlpItem::List(vec![RlpItem::bytes(vec![0x11; 31])]),
                RlpItem::List(vec![]),
            ],
        );
        assert!(matches!(
            LightMicroBody::deserialize(&mangled),
            Err(SerializationError::BadHashWidth(31))
        ));
    }

    #[test]
    fn signed_tx_roundtrip_exposes_inner_tag() {
        let tx = SignedTransaction {
            signatures: vec![vec![0x01; 64], vec![0x02; 64]],
            tx_body: opaque_tx_body(12),
            tx_type_tag: 12,
        };
        let decoded = SignedTransaction::deserialize(&tx.serialize()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.tx_type_tag, 12);
    }

    #[test]
    fn signed_tx_hash_is_stable() {
        let tx = SignedTransaction {
            signatures: vec![vec![0x01; 64]],
            tx_body: opaque_tx_body(12),
            tx_type_tag: 12,
        };
        assert_eq!(tx.hash(), tx.hash());
        assert_eq!(tx.hash(), blake2b256(&tx.serialize()));
    }

    #[test]
    fn version_gate() {
        let sealed = seal_envelope(
            ObjectTag::LightMicroBlock,
            7,
            vec![
                RlpItem::bytes(vec![]),
                RlpItem::List(vec![]),
                RlpItem::List(vec![]),
            ],
        );
        assert!(matches!(
            LightMicroBody::deserialize(&sealed),
            Err(SerializationError::UnsupportedVersion { tag: 101, found: 7 })
        ));
    }
}
