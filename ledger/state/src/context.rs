// Copyright (c) 2023-2025 The Meridian Foundation

//! The mutable ledger context the application engine operates on.

use mrd_blockchain_types::BlockSummary;
use std::collections::VecDeque;

use crate::repository::WalletRepository;

/// How many recent block summaries the context keeps. Reverting further
/// back than this requires a rebuild from storage.
const TRAIL_LIMIT: usize = 1024;

/// Everything block application reads and writes: the wallet set plus a
/// short trail of recently applied block summaries.
///
/// The trail exists so that reverting a block can restore the previous
/// last-block pointer without asking storage.
#[derive(Debug, Default)]
pub struct LedgerContext {
    /// All wallets known to the ledger.
    pub wallets: WalletRepository,
    trail: VecDeque<BlockSummary>,
}

impl LedgerContext {
    /// An empty context at height zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The summary of the most recently applied block, if any.
    pub fn last_block(&self) -> Option<BlockSummary> {
        self.trail.back().copied()
    }

    /// The height of the most recently applied block, zero before genesis.
    pub fn height(&self) -> u64 {
        self.last_block().map(|b| b.height).unwrap_or(0)
    }

    /// Reseed the trail after a rebuild or rollback. The previous trail
    /// is discarded.
    pub fn reset_to(&mut self, last_block: Option<BlockSummary>) {
        self.trail.clear();
        if let Some(summary) = last_block {
            self.trail.push_back(summary);
        }
    }

    pub(crate) fn push_block(&mut self, summary: BlockSummary) {
        if self.trail.len() == TRAIL_LIMIT {
            self.trail.pop_front();
        }
        self.trail.push_back(summary);
    }

    pub(crate) fn pop_block(&mut self) {
        self.trail.pop_back();
    }
}
