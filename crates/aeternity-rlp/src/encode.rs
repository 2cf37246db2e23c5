//! RLP encoding.

use crate::{RlpItem, BYTES_OFFSET, LIST_OFFSET, SHORT_FORM_MAX};
use bytes::{BufMut, BytesMut};

/// Encode an item tree to its wire form.
pub fn encode(item: &RlpItem) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(encoded_len(item));
    encode_into(item, &mut buf);
    buf.to_vec()
}

fn encode_into(item: &RlpItem, buf: &mut BytesMut) {
    match item {
        RlpItem::Bytes(data) => {
            // A single byte below 0x80 is its own encoding.
            if data.len() == 1 && data[0] < BYTES_OFFSET {
                buf.put_u8(data[0]);
                return;
            }
            put_header(buf, BYTES_OFFSET, data.len());
            buf.put_slice(data);
        }
        RlpItem::List(items) => {
            let payload_len: usize = items.iter().map(encoded_len).sum();
            put_header(buf, LIST_OFFSET, payload_len);
            for item in items {
                encode_into(item, buf);
            }
        }
    }
}

fn put_header(buf: &mut BytesMut, offset: u8, len: usize) {
    if len <= SHORT_FORM_MAX {
        buf.put_u8(offset + len as u8);
    } else {
        let be = (len as u64).to_be_bytes();
        let first = be.iter().position(|&b| b != 0).unwrap_or(7);
        let len_bytes = &be[first..];
        buf.put_u8(offset + SHORT_FORM_MAX as u8 + len_bytes.len() as u8);
        buf.put_slice(len_bytes);
    }
}

fn encoded_len(item: &RlpItem) -> usize {
    match item {
        RlpItem::Bytes(data) => {
            if data.len() == 1 && data[0] < BYTES_OFFSET {
                1
            } else {
                header_len(data.len()) + data.len()
            }
        }
        RlpItem::List(items) => {
            let payload: usize = items.iter().map(encoded_len).sum();
            header_len(payload) + payload
        }
    }
}

fn header_len(payload_len: usize) -> usize {
    if payload_len <= SHORT_FORM_MAX {
        1
    } else {
        1 + (8 - (payload_len as u64).leading_zeros() as usize / 8)
    }
}
