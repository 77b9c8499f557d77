// Copyright (c) 2023-2025 The Meridian Foundation

//! Errors raised by wallet state transitions.

use mrd_blockchain_types::{Address, Amount, TransactionId, TransactionType};
use thiserror::Error;

/// Result alias for state-transition operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors from wallet mutation and block application.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum StateError {
    /// The referenced wallet does not exist.
    #[error("wallet {0} not found")]
    UnknownWallet(Address),

    /// A debit would take a balance below zero.
    #[error("balance of {address} would drop below zero (balance {balance}, debit {debit})")]
    NegativeBalance {
        /// Wallet being debited.
        address: Address,
        /// Balance before the debit.
        balance: Amount,
        /// Amount of the debit.
        debit: Amount,
    },

    /// A credit would overflow the balance.
    #[error("balance of {0} overflowed")]
    BalanceOverflow(Address),

    /// A transaction nonce does not follow the wallet nonce.
    #[error("nonce of {address} out of sequence: expected {expected}, got {actual}")]
    NonceOutOfSequence {
        /// Wallet whose nonce was checked.
        address: Address,
        /// The nonce the wallet expected next.
        expected: u64,
        /// The nonce the transaction carried.
        actual: u64,
    },

    /// A nonce rollback went below zero.
    #[error("nonce of {0} would underflow")]
    NonceUnderflow(Address),

    /// A producer bookkeeping counter overflowed.
    #[error("producer counter of {0} overflowed")]
    CounterOverflow(Address),

    /// A producer bookkeeping counter went below zero.
    #[error("producer counter of {0} would drop below zero")]
    CounterUnderflow(Address),

    /// Producer-only operation on a plain wallet.
    #[error("wallet {0} is not a registered producer")]
    NotAProducer(Address),

    /// Registration of a wallet that is already a producer.
    #[error("wallet {0} is already a registered producer")]
    AlreadyProducer(Address),

    /// Resignation of a producer that already resigned.
    #[error("producer {0} already resigned")]
    AlreadyResigned(Address),

    /// Registration of a username that is already indexed.
    #[error("username {0} is already registered")]
    UsernameTaken(String),

    /// Vote for a username with no registered producer.
    #[error("username {0} is not registered")]
    UnknownUsername(String),

    /// Vote for a producer that resigned.
    #[error("producer {0} has resigned and cannot receive votes")]
    VoteForResignedProducer(String),

    /// Two declarations for the same producer in one vote.
    #[error("duplicate vote for {0}")]
    DuplicateVote(String),

    /// Declared percentages total more than 100%.
    #[error("vote percentages total {0} hundredths, over 100%")]
    VotesExceedMax(u32),

    /// No recorded previous distribution to restore on vote revert.
    #[error("no recorded vote history for {0}")]
    MissingVoteHistory(Address),

    /// Aggregate producer vote balance went below zero.
    #[error("aggregate vote balance of producer {0} would drop below zero")]
    VoteBalanceUnderflow(String),

    /// A second lock with an id that is already escrowed.
    #[error("lock {0} already exists")]
    DuplicateLock(TransactionId),

    /// Claim of a lock that is not escrowed anywhere.
    #[error("lock {0} not found")]
    UnknownLock(TransactionId),

    /// No handler is registered for a transaction family.
    #[error("no handler registered for transaction type {0}")]
    UnknownTransactionType(TransactionType),

    /// The handler for a family is not yet active at this height.
    #[error("handler for type {tx_type} is not active at height {height}")]
    HandlerNotActive {
        /// The inactive family.
        tx_type: TransactionType,
        /// Height of the block carrying the transaction.
        height: u64,
    },

    /// A transaction that moves value has no recipient.
    #[error("transaction {0} is missing a recipient")]
    MissingRecipient(TransactionId),

    /// A transaction asset does not match its declared family.
    #[error("transaction {0} carries a malformed asset")]
    MalformedAsset(TransactionId),

    /// A block's own fields are inconsistent.
    #[error("block {height} malformed: {reason}")]
    MalformedBlock {
        /// Height of the offending block.
        height: u64,
        /// What is wrong with it.
        reason: String,
    },

    /// Revert of a block that is not the current last block.
    #[error("cannot revert block {height}: it is not the last applied block")]
    NotLastBlock {
        /// Height of the block the caller tried to revert.
        height: u64,
    },
}
