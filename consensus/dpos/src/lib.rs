// Copyright (c) 2023-2025 The Meridian Foundation

//! Delegated proof of stake: producer ranking, round arithmetic, and
//! active-set selection on top of ledger wallet state.

#![deny(missing_docs)]

mod error;
mod ranking;
mod round_state;
mod rounds;

pub use error::{DposError, DposResult};
pub use ranking::{build_producer_ranking, build_vote_balances, RankedProducer};
pub use round_state::{restore_current_round, set_producers_for_round, RoundState};
pub use rounds::{
    block_reward, donation_outputs, is_new_round, round_info_from_height, round_reward,
    validate_round_boundaries, RoundInfo,
};
