//! Noise_XK session layer.
//!
//! Every P2P connection is encrypted with
//! `Noise_XK_25519_ChaChaPoly_BLAKE2b`. The initiator must already know the
//! responder's static key; the responder learns the initiator's static key
//! during the handshake. Both sides mix the same prologue into the
//! handshake hash: the 8-byte big-endian protocol version, the 32-byte
//! genesis hash of the selected network, and the literal `my_test`.
//!
//! Noise datagrams ride on TCP as `[len: u16 BE][ciphertext]` frames;
//! the framing below the Noise layer is what preserves datagram boundaries.

use crate::{NetworkError, NetworkResult, NetworkId, PROTOCOL_VERSION};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use snow::{Builder, HandshakeState, TransportState};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::debug;

/// Noise protocol string.
pub const NOISE_PARAMS: &str = "Noise_XK_25519_ChaChaPoly_BLAKE2b";

/// Trailing literal mixed into the prologue.
const PROLOGUE_TAIL: &[u8] = b"my_test";

/// Scratch space for handshake and transport messages. A Noise message is at
/// most 65535 bytes; our datagrams stay far below that.
const NOISE_BUF_LEN: usize = 1024;

/// Static Curve25519 keypair identifying this node.
#[derive(Clone)]
pub struct Keypair {
    pub public: [u8; 32],
    pub secret: [u8; 32],
}

impl Keypair {
    /// Generate a fresh keypair.
    pub fn generate() -> NetworkResult<Self> {
        let params = NOISE_PARAMS.parse().map_err(NetworkError::Noise)?;
        let keys = Builder::new(params).generate_keypair()?;
        Ok(Self {
            public: keys
                .public
                .as_slice()
                .try_into()
                .expect("curve25519 public key is 32 bytes"),
            secret: keys
                .private
                .as_slice()
                .try_into()
                .expect("curve25519 secret key is 32 bytes"),
        })
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The secret half never reaches logs.
        f.debug_struct("Keypair")
            .field("public", &hex::encode(self.public))
            .finish_non_exhaustive()
    }
}

/// Prologue for a network: version, genesis hash, literal tail.
pub fn prologue(network: NetworkId) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + 32 + PROLOGUE_TAIL.len());
    out.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    out.extend_from_slice(&network.genesis_hash());
    out.extend_from_slice(PROLOGUE_TAIL);
    out
}

/// Length-prefixed framing for Noise datagrams: `[len: u16 BE][payload]`.
pub struct NoiseFrameCodec;

impl Decoder for NoiseFrameCodec {
    type Item = BytesMut;
    type Error = NetworkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 2 {
            return Ok(None);
        }
        let len = u16::from_be_bytes([src[0], src[1]]) as usize;
        if src.len() < 2 + len {
            src.reserve(2 + len - src.len());
            return Ok(None);
        }
        src.advance(2);
        Ok(Some(src.split_to(len)))
    }
}

impl Encoder<Bytes> for NoiseFrameCodec {
    type Error = NetworkError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > u16::MAX as usize {
            return Err(NetworkError::MessageTooLarge {
                size: item.len(),
                max: u16::MAX as usize,
            });
        }
        dst.reserve(2 + item.len());
        dst.put_u16(item.len() as u16);
        dst.put_slice(&item);
        Ok(())
    }
}

/// The Noise frame stream over a TCP socket.
pub type NoiseFramed = Framed<TcpStream, NoiseFrameCodec>;

/// Wrap a socket in the Noise frame codec.
pub fn frame_stream(stream: TcpStream) -> NoiseFramed {
    Framed::new(stream, NoiseFrameCodec)
}

/// An established Noise transport session.
pub struct NoiseSession {
    transport: TransportState,
    remote_static: [u8; 32],
}

impl NoiseSession {
    /// Run the initiator side of the XK handshake. The responder's static
    /// key must be known up front.
    pub async fn initiate(
        framed: &mut NoiseFramed,
        keypair: &Keypair,
        remote_static: &[u8; 32],
        network: NetworkId,
    ) -> NetworkResult<Self> {
        let params = NOISE_PARAMS.parse().map_err(NetworkError::Noise)?;
        let mut handshake = Builder::new(params)
            .prologue(&prologue(network))
            .local_private_key(&keypair.secret)
            .remote_public_key(remote_static)
            .build_initiator()?;

        // -> e, es
        write_handshake_message(framed, &mut handshake).await?;
        // <- e, ee
        read_handshake_message(framed, &mut handshake).await?;
        // -> s, se
        write_handshake_message(framed, &mut handshake).await?;

        debug!("noise handshake complete as initiator");
        Ok(Self {
            transport: handshake.into_transport_mode()?,
            remote_static: *remote_static,
        })
    }

    /// Run the responder side of the XK handshake, learning the remote
    /// static key along the way.
    pub async fn respond(
        framed: &mut NoiseFramed,
        keypair: &Keypair,
        network: NetworkId,
    ) -> NetworkResult<Self> {
        let params = NOISE_PARAMS.parse().map_err(NetworkError::Noise)?;
        let mut handshake = Builder::new(params)
            .prologue(&prologue(network))
            .local_private_key(&keypair.secret)
            .build_responder()?;

        // <- e, es
        read_handshake_message(framed, &mut handshake).await?;
        // -> e, ee
        write_handshake_message(framed, &mut handshake).await?;
        // <- s, se
        read_handshake_message(framed, &mut handshake).await?;

        let remote_static: [u8; 32] = handshake
            .get_remote_static()
            .ok_or_else(|| {
                NetworkError::HandshakeFailed("responder saw no remote static key".into())
            })?
            .try_into()
            .map_err(|_| NetworkError::HandshakeFailed("remote static key width".into()))?;

        debug!(remote = %hex::encode(remote_static), "noise handshake complete as responder");
        Ok(Self {
            transport: handshake.into_transport_mode()?,
            remote_static,
        })
    }

    /// Static key the remote side authenticated with.
    pub fn remote_static(&self) -> [u8; 32] {
        self.remote_static
    }

    /// Encrypt one datagram.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> NetworkResult<Vec<u8>> {
        let mut buf = vec![0u8; plaintext.len() + 16];
        let n = self.transport.write_message(plaintext, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Decrypt one datagram.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> NetworkResult<Vec<u8>> {
        let mut buf = vec![0u8; ciphertext.len()];
        let n = self.transport.read_message(ciphertext, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}

async fn write_handshake_message(
    framed: &mut NoiseFramed,
    handshake: &mut HandshakeState,
) -> NetworkResult<()> {
    let mut buf = [0u8; NOISE_BUF_LEN];
    let n = handshake.write_message(&[], &mut buf)?;
    framed.send(Bytes::copy_from_slice(&buf[..n])).await?;
    Ok(())
}

async fn read_handshake_message(
    framed: &mut NoiseFramed,
    handshake: &mut HandshakeState,
) -> NetworkResult<()> {
    let frame = framed
        .next()
        .await
        .ok_or(NetworkError::ConnectionClosed)??;
    let mut buf = [0u8; NOISE_BUF_LEN];
    handshake.read_message(&frame, &mut buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prologue_layout() {
        let p = prologue(NetworkId::Testnet);
        assert_eq!(p.len(), 8 + 32 + 7);
        assert_eq!(&p[..8], &1u64.to_be_bytes());
        assert_eq!(&p[8..40], &NetworkId::Testnet.genesis_hash());
        assert_eq!(&p[40..], b"my_test");
    }

    #[test]
    fn prologues_differ_per_network() {
        assert_ne!(prologue(NetworkId::Mainnet), prologue(NetworkId::Testnet));
    }

    #[test]
    fn keypair_generation_yields_distinct_keys() {
        let a = Keypair::generate().unwrap();
        let b = Keypair::generate().unwrap();
        assert_ne!(a.public, b.public);
    }

    #[test]
    fn keypair_debug_hides_secret() {
        let keypair = Keypair::generate().unwrap();
        let rendered = format!("{:?}", keypair);
        assert!(!rendered.contains(&hex::encode(keypair.secret)));
    }

    #[test]
    fn frame_codec_roundtrip() {
        let mut codec = NoiseFrameCodec;
        let mut buf = BytesMut::new();
        codec
            .encode(Bytes::from_static(&[1, 2, 3]), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], &[0, 3, 1, 2, 3]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], &[1, 2, 3]);
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_codec_waits_for_full_frame() {
        let mut codec = NoiseFrameCodec;
        let mut buf = BytesMut::from(&[0u8, 5, 1, 2][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.put_slice(&[3, 4, 5]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], &[1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn handshake_and_transport_roundtrip() {
        let initiator_keys = Keypair::generate().unwrap();
        let responder_keys = Keypair::generate().unwrap();
        let responder_public = responder_keys.public;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = frame_stream(stream);
            let mut session = NoiseSession::respond(&mut framed, &responder_keys, NetworkId::Testnet)
                .await
                .unwrap();
            let frame = framed.next().await.unwrap().unwrap();
            let plain = session.decrypt(&frame).unwrap();
            assert_eq!(plain, b"ping over noise");
            let reply = session.encrypt(b"pong over noise").unwrap();
            framed.send(Bytes::from(reply)).await.unwrap();
            session.remote_static()
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut framed = frame_stream(stream);
        let mut session = NoiseSession::initiate(
            &mut framed,
            &initiator_keys,
            &responder_public,
            NetworkId::Testnet,
        )
        .await
        .unwrap();
        assert_eq!(session.remote_static(), responder_public);

        let msg = session.encrypt(b"ping over noise").unwrap();
        framed.send(Bytes::from(msg)).await.unwrap();
        let frame = framed.next().await.unwrap().unwrap();
        assert_eq!(session.decrypt(&frame).unwrap(), b"pong over noise");

        let seen_initiator = server.await.unwrap();
        assert_eq!(seen_initiator, initiator_keys.public);
    }

    #[tokio::test]
    async fn handshake_fails_across_networks() {
        let initiator_keys = Keypair::generate().unwrap();
        let responder_keys = Keypair::generate().unwrap();
        let responder_public = responder_keys.public;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = frame_stream(stream);
            let _ = NoiseSession::respond(&mut framed, &responder_keys, NetworkId::Mainnet).await;
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut framed = frame_stream(stream);
        let result = NoiseSession::initiate(
            &mut framed,
            &initiator_keys,
            &responder_public,
            NetworkId::Testnet,
        )
        .await;
        assert!(result.is_err());
    }
}
