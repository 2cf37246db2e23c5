//! # aeternity-encoding
//!
//! Prefixed identifier encoding and the Blake2b-256 primitive.
//!
//! Binary hashes and keys cross the API boundary as base58check strings
//! carrying a three-character type tag, e.g. `kh_...` for a key block hash.
//! The check part is the first four bytes of sha256(sha256(payload)),
//! appended before the base58 alphabet is applied.

mod error;
mod hash;
mod prefix;

pub use error::{EncodingError, EncodingResult};
pub use hash::blake2b256;
pub use prefix::Prefix;

/// Encode `data` as a prefixed base58check identifier.
pub fn encode(prefix: Prefix, data: &[u8]) -> String {
    format!(
        "{}_{}",
        prefix.tag(),
        bs58::encode(data).with_check().into_string()
    )
}

/// Decode a prefixed identifier, validating the tag and the checksum.
pub fn decode(value: &str) -> EncodingResult<(Prefix, Vec<u8>)> {
    let (tag, body) = value
        .split_once('_')
        .ok_or_else(|| EncodingError::MissingPrefix(value.to_string()))?;
    let prefix = Prefix::from_tag(tag)?;
    let data = bs58::decode(body)
        .with_check(None)
        .into_vec()
        .map_err(|e| EncodingError::Base58(e.to_string()))?;
    Ok((prefix, data))
}

/// Decode an identifier, additionally requiring a specific prefix.
pub fn decode_expecting(prefix: Prefix, value: &str) -> EncodingResult<Vec<u8>> {
    let (found, data) = decode(value)?;
    if found != prefix {
        return Err(EncodingError::WrongPrefix {
            expected: prefix.tag(),
            found: found.tag(),
        });
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_prefixes() {
        let payload = [0xABu8; 32];
        for prefix in [
            Prefix::KeyBlockHash,
            Prefix::MicroBlockHash,
            Prefix::BlockStateHash,
            Prefix::BlockTxHash,
            Prefix::AccountPubkey,
            Prefix::TxHash,
            Prefix::ContractBytearray,
            Prefix::PeerPubkey,
        ] {
            let encoded = encode(prefix, &payload);
            assert!(encoded.starts_with(&format!("{}_", prefix.tag())));
            let (decoded_prefix, decoded) = decode(&encoded).unwrap();
            assert_eq!(decoded_prefix, prefix);
            assert_eq!(decoded, payload);
        }
    }

    #[test]
    fn tampered_checksum_rejected() {
        let encoded = encode(Prefix::KeyBlockHash, &[0x11; 32]);
        let mut chars: Vec<char> = encoded.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '1' { '2' } else { '1' };
        let tampered: String = chars.into_iter().collect();
        assert!(decode(&tampered).is_err());
    }

    #[test]
    fn unknown_tag_rejected() {
        let encoded = encode(Prefix::TxHash, &[0x22; 32]);
        let body = encoded.split_once('_').unwrap().1;
        assert!(matches!(
            decode(&format!("zz_{body}")),
            Err(EncodingError::UnknownPrefix(_))
        ));
    }

    #[test]
    fn missing_separator_rejected() {
        assert!(matches!(
            decode("khabcdef"),
            Err(EncodingError::MissingPrefix(_))
        ));
    }

    #[test]
    fn wrong_prefix_rejected() {
        let encoded = encode(Prefix::KeyBlockHash, &[0x33; 32]);
        assert!(matches!(
            decode_expecting(Prefix::MicroBlockHash, &encoded),
            Err(EncodingError::WrongPrefix { .. })
        ));
    }
}
