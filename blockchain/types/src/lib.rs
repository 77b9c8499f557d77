// Copyright (c) 2023-2025 The Meridian Foundation

//! Chain data structures for the Meridian ledger.

#![deny(missing_docs)]

mod amount;
mod block;
mod error;
mod keys;
mod milestones;
mod network;
mod transaction;

pub use crate::{
    amount::{Amount, VotePercent, PERCENT_DENOMINATOR},
    block::{compute_block_id, Block, BlockId, BlockSummary, BLOCK_ID_LEN},
    error::ConvertError,
    keys::{Address, KeyRole, PublicKey, PUBLIC_KEY_LEN},
    milestones::{Milestone, MilestoneError, MilestoneSchedule},
    network::NetworkDescription,
    transaction::{
        compute_transaction_id, ResignationKind, Transaction, TransactionAsset, TransactionId,
        TransactionType, VoteShare, TRANSACTION_ID_LEN,
    },
};
