//! RLP item tree.

use crate::{RlpError, RlpResult};

/// A decoded RLP item: a byte string or a list of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    /// Raw byte string.
    Bytes(Vec<u8>),
    /// Nested list.
    List(Vec<RlpItem>),
}

impl RlpItem {
    /// Byte string item from any byte source.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        RlpItem::Bytes(data.into())
    }

    /// List item.
    pub fn list(items: Vec<RlpItem>) -> Self {
        RlpItem::List(items)
    }

    /// Unsigned integer as a minimal big-endian byte string (0 encodes empty).
    pub fn from_u64(value: u64) -> Self {
        if value == 0 {
            return RlpItem::Bytes(Vec::new());
        }
        let be = value.to_be_bytes();
        let first = be.iter().position(|&b| b != 0).unwrap_or(7);
        RlpItem::Bytes(be[first..].to_vec())
    }

    /// Borrow the byte string payload.
    pub fn as_bytes(&self) -> RlpResult<&[u8]> {
        match self {
            RlpItem::Bytes(b) => Ok(b),
            RlpItem::List(_) => Err(RlpError::UnexpectedKind { expected: "bytes" }),
        }
    }

    /// Borrow the list payload.
    pub fn as_list(&self) -> RlpResult<&[RlpItem]> {
        match self {
            RlpItem::List(items) => Ok(items),
            RlpItem::Bytes(_) => Err(RlpError::UnexpectedKind { expected: "list" }),
        }
    }

    /// Decode a minimal big-endian unsigned integer.
    pub fn to_u64(&self) -> RlpResult<u64> {
        let bytes = self.as_bytes()?;
        if bytes.is_empty() {
            return Ok(0);
        }
        if bytes.len() > 8 {
            return Err(RlpError::IntegerOverflow(bytes.len()));
        }
        if bytes[0] == 0 {
            return Err(RlpError::NonCanonicalInteger);
        }
        let mut value = 0u64;
        for &b in bytes {
            value = (value << 8) | b as u64;
        }
        Ok(value)
    }

    /// Byte string payload as a fixed-size array.
    pub fn to_fixed<const N: usize>(&self) -> RlpResult<[u8; N]> {
        let bytes = self.as_bytes()?;
        bytes
            .try_into()
            .map_err(|_| RlpError::UnexpectedKind { expected: "fixed-size bytes" })
    }

    /// True for `Bytes`.
    pub fn is_bytes(&self) -> bool {
        matches!(self, RlpItem::Bytes(_))
    }
}

impl From<&[u8]> for RlpItem {
    fn from(data: &[u8]) -> Self {
        RlpItem::Bytes(data.to_vec())
    }
}

impl From<Vec<u8>> for RlpItem {
    fn from(data: Vec<u8>) -> Self {
        RlpItem::Bytes(data)
    }
}

impl From<u64> for RlpItem {
    fn from(value: u64) -> Self {
        RlpItem::from_u64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_items_are_minimal() {
        assert_eq!(RlpItem::from_u64(0), RlpItem::Bytes(vec![]));
        assert_eq!(RlpItem::from_u64(1), RlpItem::Bytes(vec![1]));
        assert_eq!(RlpItem::from_u64(256), RlpItem::Bytes(vec![1, 0]));
        assert_eq!(
            RlpItem::from_u64(u64::MAX),
            RlpItem::Bytes(vec![0xFF; 8])
        );
    }

    #[test]
    fn integer_roundtrip() {
        for value in [0u64, 1, 127, 128, 255, 256, 65535, 1 << 40, u64::MAX] {
            assert_eq!(RlpItem::from_u64(value).to_u64().unwrap(), value);
        }
    }

    #[test]
    fn leading_zero_integer_rejected() {
        let item = RlpItem::Bytes(vec![0, 1]);
        assert_eq!(item.to_u64(), Err(RlpError::NonCanonicalInteger));
    }

    #[test]
    fn oversized_integer_rejected() {
        let item = RlpItem::Bytes(vec![1; 9]);
        assert_eq!(item.to_u64(), Err(RlpError::IntegerOverflow(9)));
    }

    #[test]
    fn kind_mismatch() {
        let list = RlpItem::list(vec![]);
        assert!(list.as_bytes().is_err());
        let bytes = RlpItem::bytes(vec![1u8]);
        assert!(bytes.as_list().is_err());
    }
}
