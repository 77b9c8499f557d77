// Copyright (c) 2023-2025 The Meridian Foundation
//
//! In-memory collaborator fakes shared by the node integration tests.
//!
//! Storage is a plain vector behind a mutex, the network serves a
//! scripted canonical chain, and the pool just counts calls. Together
//! they let a whole node boot, sync, roll back, and recover from forks
//! without any real I/O.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use meridian::Config;
use mrd_blockchain_types::{
    compute_block_id, Block, BlockId, Milestone, NetworkDescription, PublicKey,
};
use mrd_ledger_sync::{ChainStorage, NetworkHealth, NetworkMonitor, TransactionPool};

/// Key every test block is forged with; also the genesis producer key.
pub const GENERATOR: PublicKey = PublicKey::new([10u8; 32]);

/// Seconds between test blocks.
pub const BLOCK_TIME: u64 = 8;

/// A block at `height` chained onto `previous`, with a real hash id.
pub fn make_block(height: u64, previous: Option<BlockId>) -> Block {
    let mut block = Block {
        height,
        id: BlockId::new([0u8; 32]),
        previous_id: previous,
        generator_public_key: GENERATOR,
        timestamp: (height - 1) * BLOCK_TIME,
        reward: 0,
        total_fee: 0,
        burned_fee: 0,
        donations: BTreeMap::new(),
        transactions: Vec::new(),
    };
    block.id = compute_block_id(&block);
    block
}

/// A valid chain of `length` blocks starting at genesis.
pub fn make_chain(length: u64) -> Vec<Block> {
    let mut chain = Vec::with_capacity(length as usize);
    let mut previous = None;
    for height in 1..=length {
        let block = make_block(height, previous);
        previous = Some(block.id);
        chain.push(block);
    }
    chain
}

/// A single-producer network whose genesis block is `make_block(1, None)`.
pub fn test_config() -> Config {
    Config {
        network: NetworkDescription {
            name: "testnet".into(),
            launch_time: 0,
            genesis_block: make_block(1, None),
            milestones: vec![Milestone {
                height: 1,
                active_producers: 1,
                block_time: BLOCK_TIME,
                reward: 0,
                donations: BTreeMap::new(),
            }],
        },
        node: Default::default(),
        sync: Default::default(),
    }
}

// ============================================================================
// Chain storage fake
// ============================================================================

/// Chain storage backed by a vector, with a switch that marks every
/// block above a height as corrupt.
#[derive(Default)]
pub struct InMemoryChain {
    blocks: Mutex<Vec<Block>>,
    corrupt_above: Mutex<Option<u64>>,
}

impl InMemoryChain {
    /// Storage holding no blocks.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Storage pre-seeded with `blocks`.
    pub fn seeded(blocks: Vec<Block>) -> Arc<Self> {
        Arc::new(Self {
            blocks: Mutex::new(blocks),
            corrupt_above: Mutex::new(None),
        })
    }

    /// Make integrity verification fail while the tip is above `height`.
    pub fn corrupt_above(&self, height: u64) {
        *self.corrupt_above.lock() = Some(height);
    }

    /// Height of the stored tip, zero when empty.
    pub fn height(&self) -> u64 {
        self.blocks.lock().last().map(|b| b.height).unwrap_or(0)
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }
}

#[async_trait]
impl ChainStorage for InMemoryChain {
    async fn verify_integrity(&self) -> bool {
        let blocks = self.blocks.lock();
        match (*self.corrupt_above.lock(), blocks.last()) {
            (Some(limit), Some(last)) => last.height <= limit,
            _ => true,
        }
    }

    async fn last_block(&self) -> Option<Block> {
        self.blocks.lock().last().cloned()
    }

    async fn blocks_in_range(&self, start_height: u64, limit: u32) -> Vec<Block> {
        self.blocks
            .lock()
            .iter()
            .filter(|b| b.height >= start_height)
            .take(limit as usize)
            .cloned()
            .collect()
    }

    async fn save_block(&self, block: &Block) {
        self.blocks.lock().push(block.clone());
    }

    async fn delete_round(&self, _round: u64) {}

    async fn remove_top_blocks(&self, count: u64) -> u64 {
        let mut blocks = self.blocks.lock();
        for _ in 0..count {
            blocks.pop();
        }
        blocks.last().map(|b| b.height).unwrap_or(0)
    }
}

// ============================================================================
// Network monitor fake
// ============================================================================

/// A network that serves a scripted canonical chain and never reports
/// a fork from its health probe.
#[derive(Default)]
pub struct ScriptedNetwork {
    chain: Mutex<Vec<Block>>,
    starts: AtomicU64,
    downloads: AtomicU64,
}

impl ScriptedNetwork {
    /// A network serving `chain` as the canonical history.
    pub fn serving(chain: Vec<Block>) -> Arc<Self> {
        Arc::new(Self {
            chain: Mutex::new(chain),
            ..Self::default()
        })
    }

    /// Append later blocks to the canonical chain.
    pub fn extend(&self, blocks: Vec<Block>) {
        self.chain.lock().extend(blocks);
    }

    /// How often monitoring was started.
    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    /// How many download requests were served.
    pub fn download_count(&self) -> u64 {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkMonitor for ScriptedNetwork {
    async fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    async fn check_network_health(&self) -> NetworkHealth {
        NetworkHealth::default()
    }

    async fn download_blocks_from_height(&self, height: u64, max_blocks: u32) -> Vec<Block> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.chain
            .lock()
            .iter()
            .filter(|b| b.height >= height)
            .take(max_blocks as usize)
            .cloned()
            .collect()
    }
}

// ============================================================================
// Transaction pool fake
// ============================================================================

/// A pool that only counts how often it is asked to re-queue.
#[derive(Default)]
pub struct CountingPool {
    readds: AtomicU64,
}

impl CountingPool {
    /// An idle pool.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// How often `readd_transactions` ran.
    pub fn readd_count(&self) -> u64 {
        self.readds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionPool for CountingPool {
    async fn readd_transactions(&self) {
        self.readds.fetch_add(1, Ordering::SeqCst);
    }
}
