//! Strict RLP decoding.
//!
//! Decoding enforces canonical form: single bytes below 0x80 must encode as
//! themselves, payloads below 56 bytes must use the short form, and length
//! fields must carry no leading zeroes. Non-canonical input is how malformed
//! or malicious peers smuggle ambiguity into hashed structures, so it is
//! rejected outright.

use crate::{RlpError, RlpItem, RlpResult, BYTES_OFFSET, LIST_OFFSET, SHORT_FORM_MAX};

/// Decode a single item, rejecting trailing bytes.
pub fn decode(data: &[u8]) -> RlpResult<RlpItem> {
    let (item, consumed) = decode_prefix(data)?;
    if consumed != data.len() {
        return Err(RlpError::TrailingBytes(data.len() - consumed));
    }
    Ok(item)
}

/// Decode the item at the front of `data`, returning it and the bytes consumed.
pub fn decode_prefix(data: &[u8]) -> RlpResult<(RlpItem, usize)> {
    let first = *data.first().ok_or(RlpError::Empty)?;

    if first < BYTES_OFFSET {
        return Ok((RlpItem::Bytes(vec![first]), 1));
    }

    if first < LIST_OFFSET {
        let (payload, consumed) = read_payload(data, first, BYTES_OFFSET)?;
        if payload.len() == 1 && payload[0] < BYTES_OFFSET {
            return Err(RlpError::NonCanonicalByte);
        }
        Ok((RlpItem::Bytes(payload.to_vec()), consumed))
    } else {
        let (payload, consumed) = read_payload(data, first, LIST_OFFSET)?;
        let mut items = Vec::new();
        let mut rest = payload;
        while !rest.is_empty() {
            let (item, used) = decode_prefix(rest)?;
            items.push(item);
            rest = &rest[used..];
        }
        Ok((RlpItem::List(items), consumed))
    }
}

/// Read the payload slice announced by the header byte `first`.
fn read_payload<'a>(data: &'a [u8], first: u8, offset: u8) -> RlpResult<(&'a [u8], usize)> {
    let tag = (first - offset) as usize;

    let (payload_len, header_len) = if tag <= SHORT_FORM_MAX {
        (tag, 1)
    } else {
        let len_width = tag - SHORT_FORM_MAX;
        if len_width > 8 {
            return Err(RlpError::LengthOverflow(len_width));
        }
        if data.len() < 1 + len_width {
            return Err(RlpError::Truncated {
                needed: 1 + len_width - data.len(),
            });
        }
        let len_bytes = &data[1..1 + len_width];
        if len_bytes[0] == 0 {
            return Err(RlpError::LeadingZeroLength);
        }
        let mut len = 0usize;
        for &b in len_bytes {
            len = len
                .checked_shl(8)
                .and_then(|l| l.checked_add(b as usize))
                .ok_or(RlpError::LengthOverflow(len_width))?;
        }
        if len <= SHORT_FORM_MAX {
            return Err(RlpError::NonCanonicalLength(len));
        }
        (len, 1 + len_width)
    };

    let total = header_len + payload_len;
    if data.len() < total {
        return Err(RlpError::Truncated {
            needed: total - data.len(),
        });
    }
    Ok((&data[header_len..total], total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode;

    #[test]
    fn roundtrip_strings() {
        for payload in [
            Vec::new(),
            vec![0x00],
            vec![0x7F],
            vec![0x80],
            b"dog".to_vec(),
            vec![0x55; 55],
            vec![0x56; 56],
            vec![0xAB; 1024],
        ] {
            let item = RlpItem::bytes(payload);
            assert_eq!(decode(&encode(&item)).unwrap(), item);
        }
    }

    #[test]
    fn roundtrip_nested_lists() {
        let item = RlpItem::list(vec![
            RlpItem::bytes(b"cat".to_vec()),
            RlpItem::list(vec![
                RlpItem::from_u64(1),
                RlpItem::from_u64(0),
                RlpItem::bytes(vec![0xFF; 60]),
            ]),
            RlpItem::list(vec![]),
        ]);
        assert_eq!(decode(&encode(&item)).unwrap(), item);
    }

    #[test]
    fn empty_input_rejected() {
        assert_eq!(decode(&[]), Err(RlpError::Empty));
    }

    #[test]
    fn trailing_bytes_rejected() {
        assert_eq!(decode(&[0x80, 0x00]), Err(RlpError::TrailingBytes(1)));
    }

    #[test]
    fn truncated_payload_rejected() {
        assert_eq!(
            decode(&[0x83, b'd', b'o']),
            Err(RlpError::Truncated { needed: 1 })
        );
    }

    #[test]
    fn non_canonical_single_byte_rejected() {
        // 0x7F wrapped in a header instead of bare.
        assert_eq!(decode(&[0x81, 0x7F]), Err(RlpError::NonCanonicalByte));
    }

    #[test]
    fn non_canonical_long_form_rejected() {
        // 3-byte payload announced via length-of-length.
        assert_eq!(
            decode(&[0xB8, 0x03, b'd', b'o', b'g']),
            Err(RlpError::NonCanonicalLength(3))
        );
    }

    #[test]
    fn leading_zero_length_rejected() {
        let mut data = vec![0xB9, 0x00, 0x38];
        data.extend(vec![0u8; 56]);
        assert_eq!(decode(&data), Err(RlpError::LeadingZeroLength));
    }

    #[test]
    fn decode_prefix_reports_consumed() {
        let encoded = encode(&RlpItem::bytes(b"dog".to_vec()));
        let mut data = encoded.clone();
        data.extend_from_slice(&[0xDE, 0xAD]);
        let (item, consumed) = decode_prefix(&data).unwrap();
        assert_eq!(item, RlpItem::bytes(b"dog".to_vec()));
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn known_vector_list_of_strings() {
        // ["cat", "dog"]
        let data = hex::decode("c88363617483646f67").unwrap();
        let item = decode(&data).unwrap();
        assert_eq!(
            item,
            RlpItem::list(vec![
                RlpItem::bytes(b"cat".to_vec()),
                RlpItem::bytes(b"dog".to_vec()),
            ])
        );
        assert_eq!(encode(&item), data);
    }
}
