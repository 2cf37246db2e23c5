//! Node wiring: the network service plus the event consumers.

use crate::config::NodeConfig;
use aeternity_network::{ChainEvent, NetworkService};
use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// The running observer node.
pub struct Node {
    service: NetworkService,
}

impl Node {
    /// Start the network service from a loaded configuration.
    pub async fn start(config: NodeConfig) -> Result<Self> {
        let listener_config = config.listener_config()?;
        let service = NetworkService::start(listener_config).await?;
        info!(
            pubkey = %hex::encode(service.pubkey()),
            peers = config.peers.len(),
            "observer node started"
        );
        Ok(Self { service })
    }

    /// Consume chain events until the service goes away.
    pub async fn run(&self) -> Result<()> {
        let mut events = self.service.subscribe();
        loop {
            match events.recv().await {
                Ok(ChainEvent::KeyBlock(block)) => {
                    info!(
                        height = block.height,
                        hash = %block.hash,
                        miner = %block.miner,
                        target = block.target,
                        "key block"
                    );
                }
                Ok(ChainEvent::MicroBlockTxs { block_hash, txs }) => {
                    info!(block = %block_hash, count = txs.len(), "transactions");
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "event consumer lagged");
                }
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }

    /// Stop accepting connections.
    pub fn shutdown(&self) {
        self.service.shutdown();
    }
}
