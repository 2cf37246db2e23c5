//! Per-connection state machine.
//!
//! One task owns each socket together with its Noise session, reassembly
//! buffer and pending-request bookkeeping. The task reads decrypted
//! datagrams, dispatches decoded messages, and drains its own outbound
//! queue; the Noise send path therefore stays serialized without any
//! cross-task locking.
//!
//! Lifecycle: `Dialing`/`Accepting` -> `Handshaking` -> `Connected` ->
//! `Closed`. Any transport, handshake or decode fault closes the
//! connection and deletes its registry entry in one pass; reconnection is
//! the registry's concern on a later dial.

use crate::fragment::{fragment_message, is_fragment, Reassembler};
use crate::message::{GetBlockTxs, Message, MessageType, PingPayload, Response};
use crate::noise::{frame_stream, Keypair, NoiseFramed, NoiseSession};
use crate::service::ChainEvent;
use crate::{NetworkError, NetworkId, NetworkResult, Peer, PeerRegistry};
use aeternity_encoding::{encode as encode_id, Prefix};
use aeternity_serialization::{KeyBlock, SignedTransaction};
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// TCP connect must finish within this window; the Noise handshake then gets
/// its own, shorter one.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Outbound TCP connect in progress.
    Dialing,
    /// Inbound socket accepted, Noise not yet started.
    Accepting,
    /// Noise handshake in progress.
    Handshaking,
    /// Noise session established, steady-state dispatch.
    Connected,
    /// Terminal.
    Closed,
}

/// Immutable per-node context injected into every connection task. Shared
/// state is confined to the registry handle inside.
#[derive(Clone)]
pub struct ConnectionContext {
    pub network: NetworkId,
    pub keypair: Arc<Keypair>,
    /// Port advertised in outbound pings.
    pub listen_port: u16,
    pub registry: PeerRegistry,
    pub events: broadcast::Sender<ChainEvent>,
    pub handshake_timeout: Duration,
    pub first_ping_timeout: Duration,
}

/// A live peer connection. Constructed by [`dial`](Self::dial) or
/// [`accept`](Self::accept), both of which drive the connection to its end
/// and only return once it is closed.
pub struct PeerConnection {
    ctx: ConnectionContext,
    remote_pubkey: [u8; 32],
    remote_addr: SocketAddr,
    inbound: bool,
    state: ConnectionState,
    session: NoiseSession,
    reassembler: Reassembler,
    /// Outstanding requests, keyed by the inner type their response must
    /// carry. The protocol has no request IDs; this is the whole
    /// correlation state.
    pending: HashMap<MessageType, usize>,
    outbound_tx: mpsc::UnboundedSender<Message>,
    /// Set once this session claimed the registry slot for its peer; only
    /// then does closing tear the entry down.
    registered: bool,
}

impl PeerConnection {
    /// Dial a known peer, handshake as initiator, ping, then serve the
    /// connection until it closes.
    pub async fn dial(peer: Peer, ctx: ConnectionContext) -> NetworkResult<()> {
        debug!(peer = %peer, state = ?ConnectionState::Dialing, "connecting");
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(peer.addr()))
            .await
            .map_err(|_| NetworkError::ConnectTimeout)??;
        let remote_addr = peer.addr();

        let mut framed = frame_stream(stream);
        let session = timeout(
            ctx.handshake_timeout,
            NoiseSession::initiate(&mut framed, &ctx.keypair, &peer.pubkey, ctx.network),
        )
        .await
        .map_err(|_| NetworkError::HandshakeTimeout)??;

        info!(peer = %peer, "outbound session established");
        let (connection, outbound_rx) = Self::new(ctx, session, remote_addr, false);
        connection.run(framed, outbound_rx).await
    }

    /// Handshake as responder on an accepted socket, then serve the
    /// connection until it closes. The remote identity is learned from the
    /// handshake itself.
    pub async fn accept(
        stream: TcpStream,
        remote_addr: SocketAddr,
        ctx: ConnectionContext,
    ) -> NetworkResult<()> {
        debug!(addr = %remote_addr, state = ?ConnectionState::Accepting, "inbound connection");
        let mut framed = frame_stream(stream);
        let session = timeout(
            ctx.handshake_timeout,
            NoiseSession::respond(&mut framed, &ctx.keypair, ctx.network),
        )
        .await
        .map_err(|_| NetworkError::HandshakeTimeout)??;

        info!(
            addr = %remote_addr,
            peer = %encode_id(Prefix::PeerPubkey, &session.remote_static()),
            "inbound session established"
        );
        let (connection, outbound_rx) = Self::new(ctx, session, remote_addr, true);
        connection.run(framed, outbound_rx).await
    }

    fn new(
        ctx: ConnectionContext,
        session: NoiseSession,
        remote_addr: SocketAddr,
        inbound: bool,
    ) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                remote_pubkey: session.remote_static(),
                ctx,
                remote_addr,
                inbound,
                state: ConnectionState::Handshaking,
                session,
                reassembler: Reassembler::new(),
                pending: HashMap::new(),
                outbound_tx,
                registered: false,
            },
            outbound_rx,
        )
    }

    /// Steady-state loop: wire order in, serialized sends out, first-ping
    /// gate on the accepting path.
    async fn run(
        mut self,
        framed: NoiseFramed,
        mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    ) -> NetworkResult<()> {
        self.state = ConnectionState::Connected;

        let (mut sink, mut stream) = framed.split();

        // The initiator announces itself right away; the gate below is for
        // the accepting side only.
        if !self.inbound {
            self.queue_request(Message::Ping(self.local_ping()), MessageType::Ping);
        }
        let first_ping = tokio::time::sleep(self.ctx.first_ping_timeout);
        tokio::pin!(first_ping);
        let mut gate_armed = self.inbound;

        let result = loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(frame)) => {
                        if let Err(err) = self.handle_datagram(&frame) {
                            break Err(err);
                        }
                    }
                    Some(Err(err)) => break Err(err),
                    None => break Err(NetworkError::ConnectionClosed),
                },
                Some(msg) = outbound_rx.recv() => {
                    if let Err(err) = self.send_message(&mut sink, &msg).await {
                        break Err(err);
                    }
                }
                _ = &mut first_ping, if gate_armed => {
                    gate_armed = false;
                    if !self.ctx.registry.has_peer(&self.remote_pubkey) {
                        break Err(NetworkError::FirstPingTimeout);
                    }
                }
            }
        };

        self.close(result)
    }

    /// Decrypt one Noise datagram, feed the reassembler when it is a
    /// fragment, and dispatch the logical message once complete.
    fn handle_datagram(&mut self, frame: &[u8]) -> NetworkResult<()> {
        let plain = self.session.decrypt(frame)?;
        let logical = if is_fragment(&plain) {
            match self.reassembler.accept(&plain)? {
                Some(message) => message,
                None => return Ok(()),
            }
        } else {
            plain
        };
        let message = Message::decode_envelope(&logical)?;
        self.dispatch(message)
    }

    /// Steady-state dispatch over the decoded message set.
    fn dispatch(&mut self, message: Message) -> NetworkResult<()> {
        match message {
            Message::Ignored => {
                debug!(peer = %self.peer_id(), "dropped reserved message");
                Ok(())
            }
            Message::Ping(ping) => self.handle_ping(ping, true),
            Message::Response(response) => self.handle_response(response),
            Message::KeyBlock(announcement) => {
                self.publish_key_block(announcement.header.to_key_block());
                Ok(())
            }
            Message::MicroBlock(announcement) => {
                self.handle_micro_block(announcement.header.hash(), announcement.tx_hashes)
            }
            Message::BlockTxs(block_txs) => {
                self.publish_block_txs(block_txs.block_hash, block_txs.txs);
                Ok(())
            }
            Message::GetBlockTxs(_) => {
                // A pure observer holds no blocks to serve.
                debug!(peer = %self.peer_id(), "ignoring block transactions request");
                Ok(())
            }
        }
    }

    /// Handle a ping, either a request from the remote (`respond` set) or
    /// the payload of a ping response.
    fn handle_ping(&mut self, ping: PingPayload, respond: bool) -> NetworkResult<()> {
        let local_genesis = self.ctx.network.genesis_hash();
        if ping.genesis_hash != local_genesis {
            // Different network: the ping body is ignored, the connection
            // stays up and the echo still goes out.
            warn!(
                peer = %self.peer_id(),
                network = %self.ctx.network,
                "ping from a different network"
            );
            if respond {
                self.queue_pong();
            }
            return Ok(());
        }

        if ping.port > u16::MAX as u64 {
            return Err(NetworkError::InvalidMessage(format!(
                "ping with listening port {}",
                ping.port
            )));
        }
        let sender = Peer::new(self.remote_pubkey, self.remote_addr.ip(), ping.port as u16);
        if !self.registered {
            if !self.ctx.registry.claim_connection(sender) {
                // An earlier session owns this peer; the newcomer yields.
                return Err(NetworkError::DuplicateConnection);
            }
            self.registered = true;
        }

        for peer in ping.peers {
            if !self.ctx.registry.has_peer(&peer.pubkey) {
                self.ctx.registry.try_connect(peer, self.ctx.clone());
            }
        }

        if respond {
            self.queue_pong();
        }
        Ok(())
    }

    /// Handle a response envelope, correlating it positionally with the
    /// oldest outstanding request of the matching inner type.
    fn handle_response(&mut self, response: Response) -> NetworkResult<()> {
        match self.pending.get_mut(&response.inner_type) {
            Some(count) if *count > 0 => {
                *count -= 1;
            }
            _ => {
                // Duplicate or mis-ordered response: tolerated, dropped.
                warn!(
                    peer = %self.peer_id(),
                    inner = ?response.inner_type,
                    "unsolicited response dropped"
                );
                return Ok(());
            }
        }

        if !response.result {
            warn!(
                peer = %self.peer_id(),
                inner = ?response.inner_type,
                reason = response.reason.as_deref().unwrap_or("unspecified"),
                "negative response"
            );
            return Ok(());
        }

        match (response.inner_type, response.object) {
            (MessageType::Ping, Some(object)) => match *object {
                Message::Ping(ping) => self.handle_ping(ping, false),
                other => Err(NetworkError::InvalidMessage(format!(
                    "ping response carrying {:?}",
                    other.message_type()
                ))),
            },
            (MessageType::BlockTxs, Some(object)) => match *object {
                Message::BlockTxs(block_txs) => {
                    self.publish_block_txs(block_txs.block_hash, block_txs.txs);
                    Ok(())
                }
                other => Err(NetworkError::InvalidMessage(format!(
                    "block transactions response carrying {:?}",
                    other.message_type()
                ))),
            },
            (inner, _) => {
                debug!(peer = %self.peer_id(), inner = ?inner, "response without usable object");
                Ok(())
            }
        }
    }

    /// A micro block announcement triggers one fetch for its transactions;
    /// the answer arrives later as a block_txs response.
    fn handle_micro_block(
        &mut self,
        header_hash: [u8; 32],
        tx_hashes: Vec<[u8; 32]>,
    ) -> NetworkResult<()> {
        debug!(
            peer = %self.peer_id(),
            block = %encode_id(Prefix::MicroBlockHash, &header_hash),
            txs = tx_hashes.len(),
            "micro block announced, fetching transactions"
        );
        self.queue_request(
            Message::GetBlockTxs(GetBlockTxs {
                block_hash: header_hash,
                tx_hashes,
            }),
            MessageType::BlockTxs,
        );
        Ok(())
    }

    fn publish_key_block(&self, block: KeyBlock) {
        info!(
            peer = %self.peer_id(),
            height = block.height,
            hash = %block.hash,
            "key block"
        );
        // Fire and forget; a lagging subscriber drops events, never
        // back-pressures dispatch.
        let _ = self.ctx.events.send(ChainEvent::KeyBlock(Box::new(block)));
    }

    fn publish_block_txs(&self, block_hash: [u8; 32], txs: Vec<SignedTransaction>) {
        let block_hash = encode_id(Prefix::MicroBlockHash, &block_hash);
        info!(
            peer = %self.peer_id(),
            block = %block_hash,
            txs = txs.len(),
            "micro block transactions"
        );
        let _ = self
            .ctx
            .events
            .send(ChainEvent::MicroBlockTxs { block_hash, txs });
    }

    /// Queue a request and note the inner type its response must carry.
    fn queue_request(&mut self, message: Message, expected_inner: MessageType) {
        *self.pending.entry(expected_inner).or_insert(0) += 1;
        self.queue(message);
    }

    /// Echo a ping request: positive response carrying our own ping.
    fn queue_pong(&mut self) {
        let ping = self.local_ping();
        self.queue(Message::Response(Response {
            result: true,
            inner_type: MessageType::Ping,
            reason: None,
            object: Some(Box::new(Message::Ping(ping))),
        }));
    }

    fn queue(&self, message: Message) {
        // The receiver lives in this task's run loop; failure means the
        // loop is already gone and the message no longer matters.
        let _ = self.outbound_tx.send(message);
    }

    fn local_ping(&self) -> PingPayload {
        PingPayload::local(
            self.ctx.listen_port,
            self.ctx.network.genesis_hash(),
            self.ctx.registry.share_sample(&self.remote_pubkey),
        )
    }

    /// Encode, fragment, encrypt and transmit one message.
    async fn send_message(
        &mut self,
        sink: &mut SplitSink<NoiseFramed, Bytes>,
        message: &Message,
    ) -> NetworkResult<()> {
        let encoded = message.encode_envelope()?;
        for datagram in fragment_message(&encoded) {
            let ciphertext = self.session.encrypt(&datagram)?;
            sink.send(Bytes::from(ciphertext)).await?;
        }
        debug!(
            peer = %self.peer_id(),
            msg = ?message.message_type(),
            bytes = encoded.len(),
            "sent message"
        );
        Ok(())
    }

    /// Single shutdown pass: mark closed, drop the registry entry this
    /// session owns, report why.
    fn close(mut self, result: NetworkResult<()>) -> NetworkResult<()> {
        self.state = ConnectionState::Closed;
        if self.registered {
            self.ctx.registry.remove_peer(&self.remote_pubkey);
        }
        match &result {
            Ok(()) => info!(peer = %self.peer_id(), "connection closed"),
            Err(err) => info!(peer = %self.peer_id(), error = %err, "connection closed"),
        }
        result
    }

    fn peer_id(&self) -> String {
        encode_id(Prefix::PeerPubkey, &self.remote_pubkey)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }
}
