// Copyright (c) 2023-2025 The Meridian Foundation

//! Carries candidate blocks into the ledger: chain linkage and
//! forging-slot validation, engine application, persistence, and round
//! advancement.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use mrd_blockchain_types::{Block, MilestoneSchedule};
use mrd_consensus_dpos::{restore_current_round, RoundState};
use mrd_ledger_state::{BlockState, LedgerContext, WalletRepository};

use crate::{
    collaborators::ChainStorage,
    error::{SyncError, SyncResult},
};

/// Validates and applies one block at a time on top of the current
/// chain tip.
///
/// The processor keeps the producer set of the round the tip belongs
/// to. When a block opens a new round the ranking is rebuilt from
/// wallet state first, so the forging-slot check always runs against
/// the round-boundary snapshot.
pub struct BlockProcessor {
    context: Arc<RwLock<LedgerContext>>,
    engine: BlockState,
    schedule: MilestoneSchedule,
    storage: Arc<dyn ChainStorage>,
    round: Option<RoundState>,
}

impl BlockProcessor {
    /// Create a processor over `context`, persisting through `storage`.
    pub fn new(
        context: Arc<RwLock<LedgerContext>>,
        schedule: MilestoneSchedule,
        storage: Arc<dyn ChainStorage>,
    ) -> Self {
        Self {
            context,
            engine: BlockState::new(),
            schedule,
            storage,
            round: None,
        }
    }

    /// Validate `block` against the tip, apply it to wallet state, and
    /// persist it.
    pub async fn process(&mut self, block: &Block) -> SyncResult<()> {
        let context = Arc::clone(&self.context);
        {
            let mut ctx = context.write();
            Self::check_chained(&ctx, block)?;
            if !block.is_genesis() {
                self.ensure_round(&mut ctx.wallets, block.height)?;
                self.check_generator(block)?;
            }
            self.engine.apply_block(&mut ctx, block)?;
        }
        self.storage.save_block(block).await;
        debug!("Accepted block {} at height {}", block.id, block.height);
        Ok(())
    }

    /// Take `block` back out of wallet state. The caller removes it
    /// from storage; the cached round is dropped because the ranking
    /// snapshot is stale once the chain rewinds.
    pub fn revert(&mut self, block: &Block) -> SyncResult<()> {
        let context = Arc::clone(&self.context);
        let mut ctx = context.write();
        self.engine.revert_block(&mut ctx, block)?;
        self.round = None;
        Ok(())
    }

    /// Rebuild the producer set of the round containing the current
    /// tip. Called once after wallet state is restored.
    pub fn restore_round(&mut self) -> SyncResult<()> {
        let context = Arc::clone(&self.context);
        let mut ctx = context.write();
        let height = ctx.height();
        let round = restore_current_round(&mut ctx.wallets, &self.schedule, height)?;
        self.round = Some(round);
        Ok(())
    }

    /// The round the processor currently validates slots against.
    pub fn current_round(&self) -> Option<&RoundState> {
        self.round.as_ref()
    }

    fn check_chained(ctx: &LedgerContext, block: &Block) -> SyncResult<()> {
        match ctx.last_block() {
            None => {
                if !block.is_genesis() {
                    return Err(SyncError::UnchainedBlock {
                        height: block.height,
                        last_height: 0,
                    });
                }
            }
            Some(last) => {
                if block.height != last.height + 1 || block.previous_id != Some(last.id) {
                    return Err(SyncError::UnchainedBlock {
                        height: block.height,
                        last_height: last.height,
                    });
                }
            }
        }
        Ok(())
    }

    fn check_generator(&self, block: &Block) -> SyncResult<()> {
        if let Some(round) = &self.round {
            let expected = round.expected_producer(block.timestamp);
            if expected.public_key != block.generator_public_key {
                return Err(SyncError::InvalidGenerator {
                    height: block.height,
                    expected: expected.username.clone(),
                });
            }
        }
        Ok(())
    }

    /// Rebuild the cached round when `height` falls outside it.
    fn ensure_round(&mut self, wallets: &mut WalletRepository, height: u64) -> SyncResult<()> {
        if let Some(round) = &self.round {
            if round.info().height_range().contains(&height) {
                return Ok(());
            }
        }
        self.round = Some(restore_current_round(wallets, &self.schedule, height)?);
        Ok(())
    }
}
