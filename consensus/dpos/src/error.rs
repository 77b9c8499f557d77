// Copyright (c) 2023-2025 The Meridian Foundation

//! Errors raised while ranking producers and resolving rounds.

use mrd_blockchain_types::{Address, MilestoneError, PublicKey};
use mrd_ledger_state::StateError;
use thiserror::Error;

/// Result alias for consensus bookkeeping.
pub type DposResult<T> = Result<T, DposError>;

/// Errors from ranking, round selection, and vote balance rebuilds.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DposError {
    /// A registered producer has no primary public key.
    #[error("producer {0} has no primary public key")]
    MissingPublicKey(Address),

    /// Two producers share a vote balance and a public key, which makes
    /// the ranking order undefined. Configuration-level, fatal.
    #[error("duplicate producer identity {0}")]
    DuplicateIdentity(PublicKey),

    /// Fewer ranked producers than the round requires.
    #[error("round requires {required} producers, only {available} are ranked")]
    NotEnoughProducers {
        /// The round's active-set size.
        required: u32,
        /// How many ranked producers exist.
        available: usize,
    },

    /// Heights are 1-based; there is no round at height zero.
    #[error("no round exists at height {0}")]
    HeightOutOfRange(u64),

    /// The milestone schedule is inconsistent with round arithmetic.
    #[error("milestone schedule invalid: {0}")]
    Milestone(#[from] MilestoneError),

    /// Wallet state broke while rebuilding aggregates or ranks.
    #[error("state error: {0}")]
    State(#[from] StateError),
}
