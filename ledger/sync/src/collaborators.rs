// Copyright (c) 2023-2025 The Meridian Foundation

//! Interfaces the sync service drives but does not implement: block
//! storage, the peer network monitor, wallet-state restoration, and the
//! transaction pool.

use async_trait::async_trait;
use mrd_blockchain_types::Block;
use mrd_ledger_state::StateResult;

#[cfg(test)]
use mockall::automock;

/// Result of a full peer health probe.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NetworkHealth {
    /// True when the majority of peers follow a chain that diverges
    /// from ours below our current height.
    pub forked: bool,
    /// Rewind depth that rejoins the majority chain, when the probe
    /// could compute one.
    pub blocks_to_rollback: Option<u64>,
}

/// Persistent block storage.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainStorage: Send + Sync {
    /// Check the stored chain for gaps and corrupt rows.
    async fn verify_integrity(&self) -> bool;

    /// The block at the top of the stored chain, if any.
    async fn last_block(&self) -> Option<Block>;

    /// Up to `limit` stored blocks starting at `start_height`, in chain
    /// order. State rebuilds page through the chain with this.
    async fn blocks_in_range(&self, start_height: u64, limit: u32) -> Vec<Block>;

    /// Append `block` to the stored chain.
    async fn save_block(&self, block: &Block);

    /// Drop the stored snapshot of `round` and every round above it.
    async fn delete_round(&self, round: u64);

    /// Remove the `count` highest blocks. Returns the new chain height.
    async fn remove_top_blocks(&self, count: u64) -> u64;
}

/// Peer-network side of synchronization.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Begin background peer discovery and gossip.
    async fn start(&self);

    /// Full health probe across known peers.
    async fn check_network_health(&self) -> NetworkHealth;

    /// Fetch up to `max_blocks` consecutive blocks starting at `height`
    /// from the best available peer.
    async fn download_blocks_from_height(&self, height: u64, max_blocks: u32) -> Vec<Block>;
}

/// Restores in-memory wallet state from persistent storage.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateBuilder: Send + Sync {
    /// Fast path: load a saved wallet snapshot. Returns false when no
    /// usable snapshot exists.
    async fn try_restore_saved_state(&self) -> bool;

    /// Slow path: clear the ledger context and replay every stored
    /// block through the application engine.
    async fn rebuild(&self) -> StateResult<()>;
}

/// Pending-transaction pool.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransactionPool: Send + Sync {
    /// Revalidate and re-queue pooled transactions after a restart.
    async fn readd_transactions(&self);
}
