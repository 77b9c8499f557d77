// Copyright (c) 2023-2025 The Meridian Foundation

//! Wallet-state restoration by replaying the stored chain.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use mrd_ledger_state::{BlockState, LedgerContext, StateResult};
use mrd_ledger_sync::{ChainStorage, StateBuilder};

/// Blocks read from storage per page while rebuilding.
const REBUILD_BATCH: u32 = 1_000;

/// Rebuilds the in-memory ledger context from the stored chain.
///
/// No state snapshots are kept, so the fast restore path always declines
/// and every restoration replays the full chain through the application
/// engine.
pub struct LedgerStateBuilder {
    context: Arc<RwLock<LedgerContext>>,
    engine: BlockState,
    storage: Arc<dyn ChainStorage>,
}

impl LedgerStateBuilder {
    /// Builder over the shared ledger context and the chain storage.
    pub fn new(context: Arc<RwLock<LedgerContext>>, storage: Arc<dyn ChainStorage>) -> Self {
        Self {
            context,
            engine: BlockState::new(),
            storage,
        }
    }
}

#[async_trait]
impl StateBuilder for LedgerStateBuilder {
    async fn try_restore_saved_state(&self) -> bool {
        false
    }

    async fn rebuild(&self) -> StateResult<()> {
        {
            let mut ctx = self.context.write();
            ctx.wallets.clear();
            ctx.reset_to(None);
        }

        let mut next_height = 1;
        loop {
            let page = self.storage.blocks_in_range(next_height, REBUILD_BATCH).await;
            if page.is_empty() {
                break;
            }
            next_height += page.len() as u64;

            let mut ctx = self.context.write();
            for block in &page {
                self.engine.apply_block(&mut ctx, block)?;
            }
            debug!("Replay reached height {}", ctx.height());
        }

        let ctx = self.context.read();
        info!(
            "Rebuilt {} wallets by replaying the chain to height {}",
            ctx.wallets.len(),
            ctx.height()
        );
        Ok(())
    }
}
