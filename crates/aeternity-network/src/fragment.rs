//! Application-level fragmentation.
//!
//! The Noise layer preserves datagram boundaries but caps their size, so one
//! logical message larger than the cap is split into fragments:
//!
//! ```text
//! +----------+----------------+-----------------+---------+
//! |  0x0000  | fragment_index | total_fragments |  chunk  |
//! | 2 bytes  |    2 bytes     |     2 bytes     |         |
//! +----------+----------------+-----------------+---------+
//! ```
//!
//! `fragment_index` is 1-based and must arrive strictly in order; every chunk
//! except the last carries exactly [`FRAGMENT_SIZE`] bytes. The reassembled
//! concatenation re-enters the dispatch path as a normal message.

use crate::{NetworkError, NetworkResult, FRAGMENT_SIZE, MAX_MESSAGE_SIZE, MAX_PACKET_SIZE};
use bytes::{Buf, BufMut, BytesMut};

/// Wire code marking a fragment datagram.
const FRAGMENT_TYPE: u16 = 0;

/// Fragment header: type + index + total.
const FRAGMENT_HEADER_LEN: usize = 6;

/// Largest message sent without fragmentation.
const MAX_UNFRAGMENTED: usize = MAX_PACKET_SIZE - 2;

/// Split an encoded message into the datagrams to hand to the Noise session.
///
/// Messages at or below the unfragmented ceiling go out verbatim as a single
/// datagram; larger ones become `ceil(len / FRAGMENT_SIZE)` fragments.
pub fn fragment_message(msg: &[u8]) -> Vec<Vec<u8>> {
    if msg.len() <= MAX_UNFRAGMENTED {
        return vec![msg.to_vec()];
    }

    let total = msg.len().div_ceil(FRAGMENT_SIZE) as u16;
    let mut out = Vec::with_capacity(total as usize);
    for (i, chunk) in msg.chunks(FRAGMENT_SIZE).enumerate() {
        let mut datagram = BytesMut::with_capacity(FRAGMENT_HEADER_LEN + chunk.len());
        datagram.put_u16(FRAGMENT_TYPE);
        datagram.put_u16(i as u16 + 1);
        datagram.put_u16(total);
        datagram.put_slice(chunk);
        out.push(datagram.to_vec());
    }
    out
}

/// True when a decrypted datagram is a fragment rather than a whole message.
pub fn is_fragment(datagram: &[u8]) -> bool {
    datagram.len() >= 2 && datagram[0] == 0 && datagram[1] == 0
}

/// Reassembly buffer for one connection. At most one fragmented message is in
/// flight per session; a sequencing violation poisons the connection.
#[derive(Debug, Default)]
pub struct Reassembler {
    buffer: Vec<u8>,
    received: u16,
    announced_total: u16,
}

impl Reassembler {
    /// Fresh, empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a fragmented message is in flight.
    pub fn in_flight(&self) -> bool {
        self.received > 0
    }

    /// Feed one fragment datagram (header included). Returns the reassembled
    /// message once the final fragment lands.
    pub fn accept(&mut self, datagram: &[u8]) -> NetworkResult<Option<Vec<u8>>> {
        if datagram.len() < FRAGMENT_HEADER_LEN {
            return Err(NetworkError::MalformedFragment(format!(
                "{} byte datagram is shorter than the fragment header",
                datagram.len()
            )));
        }
        let mut header = &datagram[..FRAGMENT_HEADER_LEN];
        let _type = header.get_u16();
        let index = header.get_u16();
        let total = header.get_u16();
        let chunk = &datagram[FRAGMENT_HEADER_LEN..];

        if index == 0 || total == 0 || index > total {
            return Err(NetworkError::MalformedFragment(format!(
                "impossible sequence {index}/{total}"
            )));
        }
        if index != self.received + 1 {
            return Err(NetworkError::FragmentOutOfOrder {
                expected: self.received + 1,
                found: index,
            });
        }
        if index == 1 {
            let upper = total as usize * FRAGMENT_SIZE;
            if upper > MAX_MESSAGE_SIZE {
                return Err(NetworkError::MessageTooLarge {
                    size: upper,
                    max: MAX_MESSAGE_SIZE,
                });
            }
            self.announced_total = total;
        } else if total != self.announced_total {
            return Err(NetworkError::FragmentTotalChanged {
                announced: self.announced_total,
                found: total,
            });
        }

        self.buffer.extend_from_slice(chunk);
        self.received = index;

        if index == total {
            self.received = 0;
            self.announced_total = 0;
            Ok(Some(std::mem::take(&mut self.buffer)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_message_is_not_fragmented() {
        let msg = vec![0xAB; 100];
        let datagrams = fragment_message(&msg);
        assert_eq!(datagrams.len(), 1);
        assert_eq!(datagrams[0], msg);
        assert!(!is_fragment(&datagrams[0]));
    }

    #[test]
    fn boundary_message_stays_in_one_frame() {
        let msg = vec![0xCD; MAX_UNFRAGMENTED];
        let datagrams = fragment_message(&msg);
        assert_eq!(datagrams.len(), 1);
        assert_eq!(datagrams[0].len(), MAX_UNFRAGMENTED);
    }

    #[test]
    fn fifteen_hundred_bytes_make_three_fragments() {
        let msg: Vec<u8> = (0..1500u32).map(|i| i as u8).collect();
        let datagrams = fragment_message(&msg);
        assert_eq!(datagrams.len(), 3);
        assert_eq!(datagrams[0].len(), FRAGMENT_HEADER_LEN + 507);
        assert_eq!(datagrams[1].len(), FRAGMENT_HEADER_LEN + 507);
        assert_eq!(datagrams[2].len(), FRAGMENT_HEADER_LEN + 486);
        assert_eq!(&datagrams[0][..6], &[0, 0, 0, 1, 0, 3]);
        assert_eq!(&datagrams[2][..6], &[0, 0, 0, 3, 0, 3]);
        assert!(is_fragment(&datagrams[0]));
    }

    #[test]
    fn reassembly_restores_the_message() {
        let msg: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
        let datagrams = fragment_message(&msg);
        let mut reassembler = Reassembler::new();
        for datagram in &datagrams[..datagrams.len() - 1] {
            assert_eq!(reassembler.accept(datagram).unwrap(), None);
            assert!(reassembler.in_flight());
        }
        let restored = reassembler
            .accept(datagrams.last().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(restored, msg);
        assert!(!reassembler.in_flight());
    }

    #[test]
    fn reassembler_is_reusable_after_completion() {
        let msg = vec![0x11; 600];
        let mut reassembler = Reassembler::new();
        for _ in 0..2 {
            let mut result = None;
            for datagram in fragment_message(&msg) {
                result = reassembler.accept(&datagram).unwrap();
            }
            assert_eq!(result.unwrap(), msg);
        }
    }

    #[test]
    fn out_of_order_index_is_rejected() {
        let msg = vec![0x22; 1600];
        let datagrams = fragment_message(&msg);
        let mut reassembler = Reassembler::new();
        reassembler.accept(&datagrams[0]).unwrap();
        let err = reassembler.accept(&datagrams[2]).unwrap_err();
        assert!(matches!(
            err,
            NetworkError::FragmentOutOfOrder {
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn changed_total_is_rejected() {
        let msg = vec![0x33; 1600];
        let datagrams = fragment_message(&msg);
        let mut reassembler = Reassembler::new();
        reassembler.accept(&datagrams[0]).unwrap();
        let mut forged = datagrams[1].clone();
        forged[5] = 9;
        assert!(matches!(
            reassembler.accept(&forged),
            Err(NetworkError::FragmentTotalChanged {
                announced: 4,
                found: 9
            })
        ));
    }

    #[test]
    fn zero_index_is_rejected() {
        let mut datagram = vec![0, 0, 0, 0, 0, 3];
        datagram.extend_from_slice(&[0xAA; 10]);
        assert!(matches!(
            Reassembler::new().accept(&datagram),
            Err(NetworkError::MalformedFragment(_))
        ));
    }

    #[test]
    fn oversized_announcement_is_rejected() {
        let mut datagram = vec![0, 0, 0, 1, 0xFF, 0xFF];
        datagram.extend_from_slice(&[0xAA; FRAGMENT_SIZE]);
        assert!(matches!(
            Reassembler::new().accept(&datagram),
            Err(NetworkError::MessageTooLarge { .. })
        ));
    }
}
