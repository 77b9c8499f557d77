// Copyright (c) 2023-2025 The Meridian Foundation

//! Node assembly: the shared ledger context, the sync service, and the
//! recurring poll timer, wired together from a loaded config.

use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context as _, Result};
use parking_lot::RwLock;
use tokio::time;
use tracing::info;

use mrd_blockchain_types::Block;
use mrd_ledger_state::LedgerContext;
use mrd_ledger_sync::{ChainStorage, NetworkMonitor, SyncService, SyncState, TransactionPool};

use crate::{config::Config, state_builder::LedgerStateBuilder};

/// Shared ledger context handle for read-side consumers.
pub type SharedContext = Arc<RwLock<LedgerContext>>;

/// The main Meridian node.
///
/// Storage, network transport, and the transaction pool are injected;
/// the node owns the ledger context and drives synchronization.
pub struct Node {
    context: SharedContext,
    service: SyncService,
    poll_interval: Duration,
}

impl Node {
    /// Assemble a node from its config and the storage, network, and
    /// pool collaborators.
    pub fn new(
        config: &Config,
        storage: Arc<dyn ChainStorage>,
        monitor: Arc<dyn NetworkMonitor>,
        pool: Arc<dyn TransactionPool>,
    ) -> Result<Self> {
        let schedule = config
            .network
            .schedule()
            .with_context(|| format!("Invalid milestone schedule for {}", config.network.name))?;

        let context: SharedContext = Arc::new(RwLock::new(LedgerContext::new()));
        let state_builder = Arc::new(LedgerStateBuilder::new(
            Arc::clone(&context),
            Arc::clone(&storage),
        ));
        let service = SyncService::new(
            Arc::clone(&context),
            config.network.genesis_block.clone(),
            schedule,
            config.sync_config(),
            storage,
            monitor,
            state_builder,
            pool,
        );

        Ok(Self {
            context,
            service,
            poll_interval: Duration::from_secs(config.sync.poll_interval_secs.max(1)),
        })
    }

    /// The shared ledger context.
    pub fn shared_context(&self) -> SharedContext {
        Arc::clone(&self.context)
    }

    /// The state the sync machine currently sits in.
    pub fn sync_state(&self) -> SyncState {
        self.service.state()
    }

    /// True once the chain is even with the network.
    pub fn is_synced(&self) -> bool {
        self.service.is_synced()
    }

    /// Report an externally detected fork; the next sync pass rewinds.
    pub fn report_fork(&mut self, blocks_to_rollback: Option<u64>) {
        self.service.report_fork(blocks_to_rollback);
    }

    /// Deliver a block received from a peer broadcast.
    pub async fn block_received(&mut self, block: Block) {
        self.service.block_received(block).await;
    }

    /// Direct access to the sync service, for callers that drive the
    /// machine themselves instead of using [`run`](Self::run).
    pub fn sync_service_mut(&mut self) -> &mut SyncService {
        &mut self.service
    }

    /// Boot the node: storage verification, state restoration, and the
    /// first synchronization pass.
    pub async fn start(&mut self) -> Result<()> {
        self.service.start().await;
        if self.service.state() == SyncState::Failed {
            bail!("Node initialization failed, see the log for the cause");
        }
        info!(
            "Node is up at height {} in state {:?}",
            self.context.read().height(),
            self.service.state()
        );
        Ok(())
    }

    /// Run the node: boot, then poll for new blocks on the configured
    /// interval until synchronization fails.
    pub async fn run(mut self) -> Result<()> {
        self.start().await?;

        let mut ticker = time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            self.service.poll_tick().await;
            if self.service.state() == SyncState::Failed {
                bail!("Synchronization failed, stopping the node");
            }
        }
    }
}
