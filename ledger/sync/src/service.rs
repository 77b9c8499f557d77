// Copyright (c) 2023-2025 The Meridian Foundation

//! The synchronization service: owns the state machine, the download
//! queue, and the collaborator handles, and runs each state's entry
//! action when the machine moves.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use mrd_blockchain_types::{Block, BlockId, MilestoneSchedule};
use mrd_consensus_dpos::round_info_from_height;
use mrd_ledger_state::LedgerContext;

use crate::{
    collaborators::{ChainStorage, NetworkMonitor, StateBuilder, TransactionPool},
    processor::BlockProcessor,
    state::{transition, SyncEvent, SyncState},
};

/// Consecutive empty downloads tolerated before the network is
/// considered halted.
const NO_BLOCK_LIMIT: u32 = 5;

/// Every n-th halted pass runs the expensive full peer health probe.
const HEALTH_CHECK_INTERVAL: u32 = 3;

/// Rewind depth used by fork recovery when the health probe could not
/// compute one.
const DEFAULT_FORK_DEPTH: u64 = 4;

/// A chain tip no older than this many block times counts as even with
/// the network.
const SYNCED_TIP_AGE_BLOCKS: u64 = 3;

/// Tunables for the synchronization service, mapped from the node's
/// network configuration.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Hard ceiling on blocks removed while repairing a corrupt chain.
    pub max_block_rewind: u64,
    /// Blocks removed per repair attempt.
    pub rollback_steps: u64,
    /// Epoch seconds before which the network is not live; polls only
    /// count down until then.
    pub launch_time: u64,
    /// Seconds between recurring poll ticks. The node drives the timer.
    pub poll_interval_secs: u64,
    /// Queue depth above which downloading pauses until the queue is
    /// drained.
    pub queue_high_water: usize,
    /// Blocks requested per download batch.
    pub download_batch: u32,
    /// This node starts the network; the local chain is canonical.
    pub network_start: bool,
    /// Skip network monitoring and treat the node as synced.
    pub test_mode: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_block_rewind: 10_000,
            rollback_steps: 1_000,
            launch_time: 0,
            poll_interval_secs: 10,
            queue_high_water: 100,
            download_batch: 400,
            network_start: false,
            test_mode: false,
        }
    }
}

/// Drives the node between syncing, idle, rollback, and fork-recovery
/// phases.
///
/// Single-threaded cooperative: callers serialize through `&mut self`,
/// so no two entry actions ever run concurrently. Background timers
/// call [`poll_tick`](Self::poll_tick), which excludes itself unless
/// the machine is idle.
pub struct SyncService {
    state: SyncState,
    config: SyncConfig,
    genesis: Block,
    schedule: MilestoneSchedule,
    context: Arc<RwLock<LedgerContext>>,
    processor: BlockProcessor,
    storage: Arc<dyn ChainStorage>,
    monitor: Arc<dyn NetworkMonitor>,
    state_builder: Arc<dyn StateBuilder>,
    pool: Arc<dyn TransactionPool>,
    queue: VecDeque<Block>,
    no_block_counter: u32,
    p2p_update_counter: u32,
    fork_depth: Option<u64>,
    clock: Arc<dyn Fn() -> u64 + Send + Sync>,
}

impl SyncService {
    /// Wire up a service over the shared ledger context and the
    /// network's genesis block.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: Arc<RwLock<LedgerContext>>,
        genesis: Block,
        schedule: MilestoneSchedule,
        config: SyncConfig,
        storage: Arc<dyn ChainStorage>,
        monitor: Arc<dyn NetworkMonitor>,
        state_builder: Arc<dyn StateBuilder>,
        pool: Arc<dyn TransactionPool>,
    ) -> Self {
        let processor = BlockProcessor::new(
            Arc::clone(&context),
            schedule.clone(),
            Arc::clone(&storage),
        );
        Self {
            state: SyncState::Uninitialized,
            config,
            genesis,
            schedule,
            context,
            processor,
            storage,
            monitor,
            state_builder,
            pool,
            queue: VecDeque::new(),
            no_block_counter: 0,
            p2p_update_counter: 0,
            fork_depth: None,
            clock: Arc::new(system_clock),
        }
    }

    /// Replace the wall clock. Tests pin time with this.
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// The state the machine currently sits in.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// True once the chain is even with the network.
    pub fn is_synced(&self) -> bool {
        matches!(self.state, SyncState::Idle | SyncState::TestMode)
    }

    /// Boot the node: storage verification, state restoration, and the
    /// first synchronization pass.
    pub async fn start(&mut self) {
        self.dispatch(SyncEvent::Start).await;
    }

    /// Record an externally detected fork. The next synchronization
    /// pass enters fork recovery with the given rewind depth.
    pub fn report_fork(&mut self, blocks_to_rollback: Option<u64>) {
        self.fork_depth = Some(blocks_to_rollback.unwrap_or(DEFAULT_FORK_DEPTH));
    }

    /// Feed `event` through the transition table, then run the entry
    /// action of the state the machine lands in. Entry actions may
    /// produce a follow-up event, which loops back in until the
    /// machine settles.
    pub async fn dispatch(&mut self, event: SyncEvent) {
        let mut pending = Some(event);
        while let Some(event) = pending.take() {
            let Some(next) = transition(self.state, event) else {
                debug!("Dropping {:?} in state {:?}", event, self.state);
                break;
            };
            debug!("{:?}: {:?} -> {:?}", event, self.state, next);
            self.state = next;
            pending = self.run_entry_action().await;
        }
    }

    /// Recurring lightweight poll. Before network launch this only
    /// counts down; afterwards it pulls one block range from a peer
    /// when the machine is idle and either applies a single block
    /// directly or queues a batch for processing.
    pub async fn poll_tick(&mut self) {
        let now = self.now();
        if now < self.config.launch_time {
            debug!("Network launches in {} seconds", self.config.launch_time - now);
            return;
        }
        if self.state != SyncState::Idle {
            debug!("Skipping poll in state {:?}", self.state);
            return;
        }

        let from = self.context.read().height() + 1;
        let blocks = self
            .monitor
            .download_blocks_from_height(from, self.config.download_batch)
            .await;
        match blocks.len() {
            0 => {}
            1 => {
                let block = &blocks[0];
                if let Err(err) = self.processor.process(block).await {
                    warn!("Rejected polled block at height {}: {}", block.height, err);
                }
            }
            _ => {
                debug!("Poll discovered {} blocks from height {}", blocks.len(), from);
                self.queue.extend(blocks);
                self.dispatch(SyncEvent::Downloaded).await;
            }
        }
    }

    /// A block arriving from a peer broadcast. Applied on the spot when
    /// it extends the chain and the machine is idle; a block further
    /// ahead flags the chain as behind so the next pass downloads the
    /// gap. Anything else is dropped.
    pub async fn block_received(&mut self, block: Block) {
        if self.state != SyncState::Idle {
            debug!(
                "Ignoring a broadcast block at height {} in state {:?}",
                block.height, self.state
            );
            return;
        }
        let next = self.context.read().height() + 1;
        if block.height == next {
            if let Err(err) = self.processor.process(&block).await {
                warn!("Rejected broadcast block at height {}: {}", block.height, err);
            }
        } else if block.height > next {
            debug!(
                "Broadcast block at height {} is {} blocks ahead, synchronizing",
                block.height,
                block.height - next
            );
            self.dispatch(SyncEvent::NotSynced).await;
        } else {
            debug!("Ignoring a stale broadcast block at height {}", block.height);
        }
    }

    async fn run_entry_action(&mut self) -> Option<SyncEvent> {
        match self.state {
            SyncState::Uninitialized => None,
            SyncState::Initializing => self.initialize().await,
            SyncState::Idle => self.idle(),
            SyncState::Syncing => self.check_last_downloaded_block_synced().await,
            SyncState::Downloading => self.download_blocks().await,
            SyncState::ProcessingQueue => self.process_queue().await,
            SyncState::RollingBack => self.rollback_database().await,
            SyncState::Forked => self.fork_recovery().await,
            SyncState::NetworkHalted => self.network_halted(),
            SyncState::TestMode => {
                info!("Test mode: treating the chain as synced");
                None
            }
            SyncState::Failed => {
                error!("Synchronization failed, the node cannot continue");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Entry actions
    // ------------------------------------------------------------------

    /// Verify storage, restore wallet state and the current round,
    /// re-queue pooled transactions, and start network monitoring.
    async fn initialize(&mut self) -> Option<SyncEvent> {
        let last = match self.storage.last_block().await {
            Some(block) => block,
            None => {
                info!("Empty chain, applying the configured genesis block");
                if let Err(err) = self.processor.process(&self.genesis).await {
                    error!("Genesis block was rejected: {}", err);
                    return Some(SyncEvent::Failure);
                }
                self.genesis.clone()
            }
        };

        if last.height == 1 && last.id != self.genesis.id {
            error!(
                "Stored genesis {} does not match the configured genesis {}",
                last.id, self.genesis.id
            );
            return Some(SyncEvent::Failure);
        }

        if !self.storage.verify_integrity().await {
            warn!(
                "Chain integrity verification failed at height {}, rolling back",
                last.height
            );
            return Some(SyncEvent::Rollback);
        }

        if self.state_builder.try_restore_saved_state().await {
            debug!("Wallet state restored from the saved snapshot");
        } else if let Err(err) = self.state_builder.rebuild().await {
            error!("Wallet state rebuild failed: {}", err);
            return Some(SyncEvent::Failure);
        }

        if let Err(err) = self.processor.restore_round() {
            error!("Could not restore the current round: {}", err);
            return Some(SyncEvent::Failure);
        }

        self.pool.readd_transactions().await;

        if self.config.test_mode {
            return Some(SyncEvent::Test);
        }
        self.monitor.start().await;
        Some(SyncEvent::Started)
    }

    /// Classify where the chain stands relative to the network.
    async fn check_last_downloaded_block_synced(&mut self) -> Option<SyncEvent> {
        if self.config.network_start {
            return Some(SyncEvent::Synced);
        }
        if self.fork_depth.is_some() {
            return Some(SyncEvent::Fork);
        }
        if self.queue.len() > self.config.queue_high_water {
            debug!(
                "Download queue holds {} blocks, draining before downloading more",
                self.queue.len()
            );
            return Some(SyncEvent::Paused);
        }
        if self.no_block_counter > NO_BLOCK_LIMIT && self.queue.is_empty() {
            self.p2p_update_counter += 1;
            if self.p2p_update_counter % HEALTH_CHECK_INTERVAL == 0 {
                let health = self.monitor.check_network_health().await;
                if health.forked {
                    warn!("Peer health probe reports a fork");
                    self.fork_depth =
                        Some(health.blocks_to_rollback.unwrap_or(DEFAULT_FORK_DEPTH));
                    return Some(SyncEvent::Fork);
                }
            }
            return Some(SyncEvent::NetworkHalted);
        }
        if self.is_even_with_network() {
            Some(SyncEvent::Synced)
        } else {
            Some(SyncEvent::NotSynced)
        }
    }

    /// Pull the next batch from a peer and queue it.
    async fn download_blocks(&mut self) -> Option<SyncEvent> {
        let (tail_height, tail_id) = self.download_tail();
        let from = tail_height + 1;
        let batch = self
            .monitor
            .download_blocks_from_height(from, self.config.download_batch)
            .await;

        if batch.is_empty() {
            self.no_block_counter += 1;
            debug!(
                "No blocks received from height {} (attempt {})",
                from, self.no_block_counter
            );
            return Some(SyncEvent::NoBlocks);
        }
        if !batch_is_chained(&batch, from, tail_id) {
            warn!(
                "Discarding an unchained batch of {} blocks claiming to start at height {}",
                batch.len(),
                from
            );
            return Some(SyncEvent::NoBlocks);
        }

        self.no_block_counter = 0;
        debug!("Queued {} downloaded blocks from height {}", batch.len(), from);
        self.queue.extend(batch);
        Some(SyncEvent::Downloaded)
    }

    /// Drain the download queue through the block processor.
    async fn process_queue(&mut self) -> Option<SyncEvent> {
        while let Some(block) = self.queue.pop_front() {
            if let Err(err) = self.processor.process(&block).await {
                if err.is_block_rejection() {
                    warn!("Rejected queued block at height {}: {}", block.height, err);
                    return Some(SyncEvent::Fork);
                }
                error!("Processing queued blocks failed: {}", err);
                return Some(SyncEvent::Failure);
            }
        }
        Some(SyncEvent::Processed)
    }

    /// Rewind stored blocks in steps until integrity verification
    /// passes or the rewind budget runs out.
    async fn rollback_database(&mut self) -> Option<SyncEvent> {
        let steps = self.config.rollback_steps.max(1);
        let attempts = self.config.max_block_rewind / steps;
        for attempt in 1..=attempts {
            let height = match self.storage.last_block().await {
                Some(block) => block.height,
                None => break,
            };
            // Shrink the last step rather than rewind past height 1.
            let step = steps.min(height.saturating_sub(1));
            if step == 0 {
                break;
            }
            let new_height = self.storage.remove_top_blocks(step).await;
            info!(
                "Rewound {} blocks to height {} (attempt {}/{})",
                step, new_height, attempt, attempts
            );
            if self.storage.verify_integrity().await {
                info!("Chain integrity restored at height {}", new_height);
                match round_info_from_height(&self.schedule, new_height.max(1)) {
                    Ok(round) => self.storage.delete_round(round.round + 1).await,
                    Err(err) => {
                        error!("No round resolves at height {}: {}", new_height, err);
                        return Some(SyncEvent::Failure);
                    }
                }
                return Some(SyncEvent::Success);
            }
        }
        error!(
            "Gave up rewinding after at most {} blocks without restoring integrity",
            self.config.max_block_rewind
        );
        Some(SyncEvent::Failure)
    }

    /// Rewind past a fork point, reverting each block out of wallet
    /// state before removing it from storage.
    async fn fork_recovery(&mut self) -> Option<SyncEvent> {
        let depth = self.fork_depth.take().unwrap_or(DEFAULT_FORK_DEPTH);
        warn!("Recovering from a fork, rewinding up to {} blocks", depth);
        for _ in 0..depth {
            let Some(block) = self.storage.last_block().await else {
                break;
            };
            if block.is_genesis() {
                break;
            }
            if let Err(err) = self.processor.revert(&block) {
                error!("Could not revert block at height {}: {}", block.height, err);
                return Some(SyncEvent::Failure);
            }
            self.storage.remove_top_blocks(1).await;
        }
        self.queue.clear();
        self.no_block_counter = 0;
        self.p2p_update_counter = 0;
        Some(SyncEvent::Success)
    }

    fn network_halted(&mut self) -> Option<SyncEvent> {
        warn!(
            "No peer delivered blocks in {} passes, waiting for the network",
            self.no_block_counter
        );
        self.no_block_counter = 0;
        None
    }

    fn idle(&mut self) -> Option<SyncEvent> {
        self.no_block_counter = 0;
        info!(
            "Chain is synced with the network at height {}",
            self.context.read().height()
        );
        None
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// The tip downloads continue from: the back of the queue, or the
    /// applied chain when the queue is empty.
    fn download_tail(&self) -> (u64, Option<BlockId>) {
        if let Some(tail) = self.queue.back() {
            return (tail.height, Some(tail.id));
        }
        match self.context.read().last_block() {
            Some(last) => (last.height, Some(last.id)),
            None => (0, None),
        }
    }

    /// Even with the network when the tip is no older than a few block
    /// times.
    fn is_even_with_network(&self) -> bool {
        let Some(last) = self.context.read().last_block() else {
            return false;
        };
        let block_time = self.schedule.at(last.height).block_time;
        self.now().saturating_sub(last.timestamp) < SYNCED_TIP_AGE_BLOCKS * block_time
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }
}

fn system_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Each block must continue the heights and ids of the one before it.
fn batch_is_chained(batch: &[Block], mut height: u64, mut previous: Option<BlockId>) -> bool {
    for block in batch {
        if block.height != height || block.previous_id != previous {
            return false;
        }
        height += 1;
        previous = Some(block.id);
    }
    true
}
