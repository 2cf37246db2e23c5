//! Test harness for integration tests.
//!
//! Provides real network services bound to loopback ports and a scripted
//! remote peer that speaks the wire protocol directly, so tests can drive
//! both the polite and the impolite sides of a session.

use aeternity_network::{
    fragment_message, frame_stream, is_fragment, ChainEvent, Keypair, ListenerConfig, Message,
    NetworkId, NetworkService, NoiseFramed, NoiseSession, Peer, Reassembler,
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;

/// Default window for anything a test waits on.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// A network service under test, bound to an ephemeral loopback port.
pub struct TestNode {
    pub service: NetworkService,
    pub keypair: Keypair,
    pub network: NetworkId,
}

impl TestNode {
    /// Spawn a node with a generous first-ping window.
    pub async fn spawn(network: NetworkId) -> Self {
        Self::spawn_with(network, Duration::from_secs(10), Vec::new()).await
    }

    /// Spawn a node with an explicit first-ping window.
    pub async fn spawn_with_first_ping(network: NetworkId, first_ping: Duration) -> Self {
        Self::spawn_with(network, first_ping, Vec::new()).await
    }

    /// Spawn a node that dials the given peers at startup.
    pub async fn spawn_with(
        network: NetworkId,
        first_ping: Duration,
        initial_peers: Vec<Peer>,
    ) -> Self {
        let keypair = Keypair::generate().expect("keypair");
        let mut config = ListenerConfig::new(network, keypair.clone());
        config.listen_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        config.first_ping_timeout = first_ping;
        config.initial_peers = initial_peers;
        let service = NetworkService::start(config).await.expect("start service");
        Self {
            service,
            keypair,
            network,
        }
    }

    /// This node seen from the outside.
    pub fn as_peer(&self) -> Peer {
        Peer::new(
            self.keypair.public,
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            self.service.local_addr().port(),
        )
    }

    /// Event stream of decoded blocks and transactions.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.service.subscribe()
    }
}

/// A scripted remote peer: raw access to one Noise session with a node
/// under test.
pub struct RemotePeer {
    pub keypair: Keypair,
    framed: NoiseFramed,
    session: NoiseSession,
    reassembler: Reassembler,
}

impl RemotePeer {
    /// Open a session with a node as the Noise initiator.
    pub async fn connect(node: &TestNode) -> Self {
        let keypair = Keypair::generate().expect("keypair");
        Self::connect_with_keypair(node, keypair).await
    }

    /// Open a session with a fixed identity, for collision tests.
    pub async fn connect_with_keypair(node: &TestNode, keypair: Keypair) -> Self {
        let stream = TcpStream::connect(node.service.local_addr())
            .await
            .expect("connect");
        let mut framed = frame_stream(stream);
        let session = NoiseSession::initiate(
            &mut framed,
            &keypair,
            &node.keypair.public,
            node.network,
        )
        .await
        .expect("noise handshake");
        Self {
            keypair,
            framed,
            session,
            reassembler: Reassembler::new(),
        }
    }

    /// Encode, fragment, encrypt and send one message.
    pub async fn send(&mut self, message: &Message) {
        let encoded = message.encode_envelope().expect("encode");
        for datagram in fragment_message(&encoded) {
            let ciphertext = self.session.encrypt(&datagram).expect("encrypt");
            self.framed
                .send(Bytes::from(ciphertext))
                .await
                .expect("send");
        }
    }

    /// Encrypt and send one raw datagram, bypassing the message codec.
    pub async fn send_raw(&mut self, datagram: &[u8]) {
        let ciphertext = self.session.encrypt(datagram).expect("encrypt");
        self.framed
            .send(Bytes::from(ciphertext))
            .await
            .expect("send");
    }

    /// Receive the next logical message, reassembling fragments.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            let frame = tokio::time::timeout(WAIT_TIMEOUT, self.framed.next())
                .await
                .expect("timed out waiting for a message")?
                .ok()?;
            let plain = self.session.decrypt(&frame).ok()?;
            let logical = if is_fragment(&plain) {
                match self.reassembler.accept(&plain).ok()? {
                    Some(message) => message,
                    None => continue,
                }
            } else {
                plain
            };
            return Message::decode_envelope(&logical).ok();
        }
    }

    /// True once the node has hung up on us.
    pub async fn closed_within(&mut self, window: Duration) -> bool {
        match tokio::time::timeout(window, self.framed.next()).await {
            Ok(None) => true,
            Ok(Some(Err(_))) => true,
            Ok(Some(Ok(_))) => false,
            Err(_) => false,
        }
    }
}

/// Poll a condition until it holds or the wait window closes.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("condition not reached within {WAIT_TIMEOUT:?}");
}
