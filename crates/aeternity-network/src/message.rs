//! Typed P2P messages and their RLP codecs.
//!
//! Every logical message travels as `[msg_type: u16 BE][payload]` inside one
//! Noise datagram (or reassembled from fragments). Payloads are RLP lists;
//! integers are unsigned big-endian throughout.

use crate::registry::{peers_from_item, peers_to_item};
use crate::{NetworkError, NetworkResult, Peer, PING_SHARE, PROTOCOL_VERSION};
use aeternity_rlp::{decode, encode, RlpItem};
use aeternity_serialization::{
    KeyBlockHeader, LightMicroBody, MicroBlockHeader, SignedTransaction,
};
use bytes::{Buf, BufMut, BytesMut};

/// Reserved wire code, silently dropped on receipt.
const RESERVED_TYPE: u16 = 9;

/// Wire code of the fragment envelope, handled below this layer.
const FRAGMENT_TYPE: u16 = 0;

/// Message type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    /// Handshake ping / peer exchange.
    Ping = 1,
    /// Request the transactions of a micro block.
    GetBlockTxs = 7,
    /// Key block announcement.
    KeyBlock = 10,
    /// Micro block announcement.
    MicroBlock = 11,
    /// Transactions of a previously announced micro block.
    BlockTxs = 13,
    /// Request/response envelope.
    Response = 100,
}

impl MessageType {
    /// Wire value.
    pub fn value(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for MessageType {
    type Error = NetworkError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::Ping),
            7 => Ok(MessageType::GetBlockTxs),
            10 => Ok(MessageType::KeyBlock),
            11 => Ok(MessageType::MicroBlock),
            13 => Ok(MessageType::BlockTxs),
            100 => Ok(MessageType::Response),
            other => Err(NetworkError::UnknownMessageType(other)),
        }
    }
}

/// Ping payload: protocol data plus a peer share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingPayload {
    pub version: u64,
    /// TCP port the sender listens on.
    pub port: u64,
    /// Advisory cap on peers to share back.
    pub share: u64,
    pub genesis_hash: [u8; 32],
    /// Claimed difficulty; zero from an observer.
    pub difficulty: u64,
    pub best_hash: [u8; 32],
    /// Whether the sender is willing to serve a full sync.
    pub sync_allowed: bool,
    pub peers: Vec<Peer>,
}

impl PingPayload {
    /// The ping this observer sends: zero difficulty, best hash pinned to
    /// genesis, and sync always declined so peers never start a full sync
    /// against us.
    pub fn local(port: u16, genesis_hash: [u8; 32], peers: Vec<Peer>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            port: port as u64,
            share: PING_SHARE,
            genesis_hash,
            difficulty: 0,
            best_hash: genesis_hash,
            sync_allowed: false,
            peers,
        }
    }

    fn to_item(&self) -> RlpItem {
        RlpItem::List(vec![
            RlpItem::from_u64(self.version),
            RlpItem::from_u64(self.port),
            RlpItem::from_u64(self.share),
            RlpItem::bytes(self.genesis_hash.to_vec()),
            RlpItem::from_u64(self.difficulty),
            RlpItem::bytes(self.best_hash.to_vec()),
            RlpItem::bytes(vec![self.sync_allowed as u8]),
            peers_to_item(&self.peers),
        ])
    }

    fn from_item(item: &RlpItem) -> NetworkResult<Self> {
        let fields = expect_fields(item, 8)?;
        Ok(Self {
            version: fields[0].to_u64()?,
            port: fields[1].to_u64()?,
            share: fields[2].to_u64()?,
            genesis_hash: fields[3].to_fixed()?,
            difficulty: fields[4].to_u64()?,
            best_hash: fields[5].to_fixed()?,
            sync_allowed: flag_byte(&fields[6])?,
            peers: peers_from_item(&fields[7])?,
        })
    }
}

/// Key block announcement: version tag plus the bit-packed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBlockAnnouncement {
    pub version: u64,
    pub header: KeyBlockHeader,
}

/// Micro block announcement in its light form: header, transaction hashes
/// and proof of fraud, without the transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicroBlockAnnouncement {
    pub version: u64,
    pub light: bool,
    pub header: MicroBlockHeader,
    pub tx_hashes: Vec<[u8; 32]>,
    pub pof: Vec<Vec<u8>>,
}

/// Request for the transactions of a micro block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetBlockTxs {
    pub block_hash: [u8; 32],
    pub tx_hashes: Vec<[u8; 32]>,
}

/// Transactions answering a [`GetBlockTxs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTxs {
    pub block_hash: [u8; 32],
    pub txs: Vec<SignedTransaction>,
}

/// Request/response envelope. The protocol has no request IDs; the carried
/// `inner_type` is the only correlation key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub result: bool,
    pub inner_type: MessageType,
    /// Failure reason, present when `result` is false.
    pub reason: Option<String>,
    /// Decoded payload of `inner_type`, present when `result` is true.
    pub object: Option<Box<Message>>,
}

/// A decoded P2P message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Ping(PingPayload),
    GetBlockTxs(GetBlockTxs),
    KeyBlock(KeyBlockAnnouncement),
    MicroBlock(MicroBlockAnnouncement),
    BlockTxs(BlockTxs),
    Response(Response),
    /// Reserved wire code 9; carries nothing and advances nothing.
    Ignored,
}

impl Message {
    /// Wire type, absent for the ignored variant.
    pub fn message_type(&self) -> Option<MessageType> {
        match self {
            Message::Ping(_) => Some(MessageType::Ping),
            Message::GetBlockTxs(_) => Some(MessageType::GetBlockTxs),
            Message::KeyBlock(_) => Some(MessageType::KeyBlock),
            Message::MicroBlock(_) => Some(MessageType::MicroBlock),
            Message::BlockTxs(_) => Some(MessageType::BlockTxs),
            Message::Response(_) => Some(MessageType::Response),
            Message::Ignored => None,
        }
    }

    /// Encode as a full wire envelope: `[msg_type: u16 BE][payload]`.
    pub fn encode_envelope(&self) -> NetworkResult<Vec<u8>> {
        let msg_type = self.message_type().ok_or_else(|| {
            NetworkError::InvalidMessage("the ignored variant has no wire form".into())
        })?;
        let payload = self.encode_payload()?;
        let mut buf = BytesMut::with_capacity(2 + payload.len());
        buf.put_u16(msg_type.value());
        buf.put_slice(&payload);
        Ok(buf.to_vec())
    }

    /// Decode a full wire envelope.
    pub fn decode_envelope(data: &[u8]) -> NetworkResult<Self> {
        if data.len() < 2 {
            return Err(NetworkError::InvalidMessage(format!(
                "{} byte envelope",
                data.len()
            )));
        }
        let mut buf = &data[..];
        let raw_type = buf.get_u16();
        if raw_type == RESERVED_TYPE {
            return Ok(Message::Ignored);
        }
        if raw_type == FRAGMENT_TYPE {
            return Err(NetworkError::InvalidMessage(
                "fragment envelope inside a logical message".into(),
            ));
        }
        let msg_type = MessageType::try_from(raw_type)?;
        Self::decode_payload(msg_type, buf)
    }

    /// Encode the payload without the type prefix.
    pub fn encode_payload(&self) -> NetworkResult<Vec<u8>> {
        let item = match self {
            Message::Ping(ping) => ping.to_item(),
            Message::GetBlockTxs(req) => RlpItem::List(vec![
                RlpItem::from_u64(PROTOCOL_VERSION),
                RlpItem::bytes(req.block_hash.to_vec()),
                RlpItem::List(
                    req.tx_hashes
                        .iter()
                        .map(|h| RlpItem::bytes(h.to_vec()))
                        .collect(),
                ),
            ]),
            Message::KeyBlock(announcement) => RlpItem::List(vec![
                RlpItem::from_u64(announcement.version),
                RlpItem::bytes(announcement.header.to_bytes()),
            ]),
            Message::MicroBlock(announcement) => {
                let body = LightMicroBody {
                    header: announcement.header.to_bytes(),
                    tx_hashes: announcement.tx_hashes.clone(),
                    pof: announcement.pof.clone(),
                };
                RlpItem::List(vec![
                    RlpItem::from_u64(announcement.version),
                    RlpItem::bytes(body.serialize()),
                    RlpItem::bytes(vec![announcement.light as u8]),
                ])
            }
            Message::BlockTxs(block_txs) => RlpItem::List(vec![
                RlpItem::from_u64(PROTOCOL_VERSION),
                RlpItem::bytes(block_txs.block_hash.to_vec()),
                RlpItem::List(
                    block_txs
                        .txs
                        .iter()
                        .map(|tx| RlpItem::bytes(tx.serialize()))
                        .collect(),
                ),
            ]),
            Message::Response(response) => {
                let object = match &response.object {
                    Some(inner) => inner.encode_payload()?,
                    None => Vec::new(),
                };
                RlpItem::List(vec![
                    RlpItem::from_u64(PROTOCOL_VERSION),
                    RlpItem::bytes(vec![response.result as u8]),
                    RlpItem::from_u64(response.inner_type.value() as u64),
                    RlpItem::bytes(
                        response
                            .reason
                            .as_deref()
                            .unwrap_or_default()
                            .as_bytes()
                            .to_vec(),
                    ),
                    RlpItem::bytes(object),
                ])
            }
            Message::Ignored => {
                return Err(NetworkError::InvalidMessage(
                    "the ignored variant has no wire form".into(),
                ))
            }
        };
        Ok(encode(&item))
    }

    /// Decode the payload of a known type.
    pub fn decode_payload(msg_type: MessageType, data: &[u8]) -> NetworkResult<Self> {
        let item = decode(data)?;
        match msg_type {
            MessageType::Ping => Ok(Message::Ping(PingPayload::from_item(&item)?)),
            MessageType::GetBlockTxs => {
                let fields = expect_fields(&item, 3)?;
                let _version = fields[0].to_u64()?;
                let block_hash = fields[1].to_fixed()?;
                let mut tx_hashes = Vec::new();
                for hash in fields[2].as_list()? {
                    tx_hashes.push(hash.to_fixed()?);
                }
                Ok(Message::GetBlockTxs(GetBlockTxs {
                    block_hash,
                    tx_hashes,
                }))
            }
            MessageType::KeyBlock => {
                let fields = expect_fields(&item, 2)?;
                let version = fields[0].to_u64()?;
                let header = KeyBlockHeader::parse(fields[1].as_bytes()?)?;
                Ok(Message::KeyBlock(KeyBlockAnnouncement { version, header }))
            }
            MessageType::MicroBlock => {
                let fields = expect_fields(&item, 3)?;
                let version = fields[0].to_u64()?;
                let body = LightMicroBody::deserialize(fields[1].as_bytes()?)?;
                let light = flag_byte(&fields[2])?;
                let header = MicroBlockHeader::parse(&body.header)?;
                Ok(Message::MicroBlock(MicroBlockAnnouncement {
                    version,
                    light,
                    header,
                    tx_hashes: body.tx_hashes,
                    pof: body.pof,
                }))
            }
            MessageType::BlockTxs => {
                let fields = expect_fields(&item, 3)?;
                let _version = fields[0].to_u64()?;
                let block_hash = fields[1].to_fixed()?;
                let mut txs = Vec::new();
                for tx in fields[2].as_list()? {
                    txs.push(SignedTransaction::deserialize(tx.as_bytes()?)?);
                }
                Ok(Message::BlockTxs(BlockTxs { block_hash, txs }))
            }
            MessageType::Response => {
                let fields = expect_fields(&item, 5)?;
                let _version = fields[0].to_u64()?;
                let result = flag_byte(&fields[1])?;
                let raw_inner = fields[2].to_u64()?;
                if raw_inner > u16::MAX as u64 {
                    return Err(NetworkError::InvalidMessage(format!(
                        "inner type {raw_inner} out of range"
                    )));
                }
                let inner_type = MessageType::try_from(raw_inner as u16)?;
                if inner_type == MessageType::Response {
                    return Err(NetworkError::InvalidMessage(
                        "response nested inside a response".into(),
                    ));
                }
                let reason_bytes = fields[3].as_bytes()?;
                let reason = if reason_bytes.is_empty() {
                    None
                } else {
                    Some(String::from_utf8(reason_bytes.to_vec()).map_err(|_| {
                        NetworkError::InvalidMessage("reason is not UTF-8".into())
                    })?)
                };
                let object_bytes = fields[4].as_bytes()?;
                let object = if object_bytes.is_empty() {
                    None
                } else {
                    Some(Box::new(Self::decode_payload(inner_type, object_bytes)?))
                };
                Ok(Message::Response(Response {
                    result,
                    inner_type,
                    reason,
                    object,
                }))
            }
        }
    }
}

fn expect_fields(item: &RlpItem, arity: usize) -> NetworkResult<&[RlpItem]> {
    let fields = item.as_list()?;
    if fields.len() != arity {
        return Err(NetworkError::InvalidMessage(format!(
            "expected {arity} fields, found {}",
            fields.len()
        )));
    }
    Ok(fields)
}

/// Decode a length-1 flag byte, `\x00` or `\x01`.
fn flag_byte(item: &RlpItem) -> NetworkResult<bool> {
    match item.as_bytes()? {
        [0] => Ok(false),
        [1] => Ok(true),
        other => Err(NetworkError::InvalidMessage(format!(
            "flag byte of {} bytes",
            other.len()
        ))),
    }
}
