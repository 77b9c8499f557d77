// Copyright (c) 2023-2025 The Meridian Foundation

//! Errors raised while accepting blocks and synchronizing the chain.

use mrd_consensus_dpos::DposError;
use mrd_ledger_state::StateError;
use thiserror::Error;

/// Result alias for synchronization work.
pub type SyncResult<T> = Result<T, SyncError>;

/// Reasons a candidate block is rejected or synchronization cannot
/// continue.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SyncError {
    /// The candidate does not extend the current chain tip.
    #[error("block {height} does not chain onto the tip at height {last_height}")]
    UnchainedBlock {
        /// Height claimed by the rejected block.
        height: u64,
        /// Height of the tip it failed to extend.
        last_height: u64,
    },

    /// The block was forged outside its producer's slot.
    #[error("block {height} was not forged by the scheduled producer {expected}")]
    InvalidGenerator {
        /// Height of the rejected block.
        height: u64,
        /// Username of the producer the slot belongs to.
        expected: String,
    },

    /// Applying the block to wallet state failed.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Round derivation or producer ranking failed.
    #[error("consensus error: {0}")]
    Dpos(#[from] DposError),
}

impl SyncError {
    /// True when the error condemns a single candidate block rather
    /// than the local chain. The sync service answers these with fork
    /// recovery; everything else is a hard failure.
    pub fn is_block_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnchainedBlock { .. } | Self::InvalidGenerator { .. } | Self::State(_)
        )
    }
}
