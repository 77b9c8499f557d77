// Copyright (c) 2023-2025 The Meridian Foundation

//! Ledger state transition: wallets, per-type transaction handlers, the
//! vote-weighted balance calculator, and the block application engine.
//!
//! The engine applies and reverts whole blocks atomically against a
//! [`LedgerContext`]; everything consensus later ranks producers by
//! (vote balances, producer attributes) is maintained here as blocks
//! flow through.

#![deny(missing_docs)]

mod block_state;
mod context;
mod error;
mod events;
pub mod handlers;
mod repository;
mod vote_balance;
mod wallet;

pub use block_state::{BlockState, GENESIS_PRODUCER_USERNAME};
pub use context::LedgerContext;
pub use error::{StateError, StateResult};
pub use events::{WalletChange, WalletEvent, WalletEventSink};
pub use repository::WalletRepository;
pub use vote_balance::{compute_vote_balances, update_vote_balances};
pub use wallet::{Lock, ProducerAttributes, Votes, Wallet};
