// Copyright (c) 2023-2025 The Meridian Foundation

//! The active producer set of one round.

use crate::{
    error::{DposError, DposResult},
    ranking::{build_producer_ranking, RankedProducer},
    rounds::{round_info_from_height, RoundInfo},
};
use mrd_blockchain_types::{MilestoneSchedule, PublicKey};
use mrd_ledger_state::WalletRepository;
use tracing::info;

/// The producers authoritative for one round, in rank order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RoundState {
    info: RoundInfo,
    block_time: u64,
    producers: Vec<RankedProducer>,
}

impl RoundState {
    /// The round this set is authoritative for.
    pub fn info(&self) -> RoundInfo {
        self.info
    }

    /// The active set, in rank order.
    pub fn producers(&self) -> &[RankedProducer] {
        &self.producers
    }

    /// Whether `key` belongs to the active set.
    pub fn contains(&self, key: &PublicKey) -> bool {
        self.producers.iter().any(|p| &p.public_key == key)
    }

    /// The producer whose forging slot covers `timestamp`.
    ///
    /// Slots tile time at the network block time; slot `n` belongs to
    /// the active producer at position `n % max_producers`.
    pub fn expected_producer(&self, timestamp: u64) -> &RankedProducer {
        let slot = timestamp / self.block_time;
        &self.producers[(slot % self.producers.len() as u64) as usize]
    }
}

/// Select the first `max_producers` ranked producers as the round's
/// active set.
///
/// Fails when fewer producers are ranked than the round requires; a
/// network that cannot fill a round cannot forge at all.
pub fn set_producers_for_round(
    ranking: Vec<RankedProducer>,
    info: RoundInfo,
    block_time: u64,
) -> DposResult<RoundState> {
    let required = info.max_producers as usize;
    if ranking.len() < required {
        return Err(DposError::NotEnoughProducers {
            required: info.max_producers,
            available: ranking.len(),
        });
    }
    let producers: Vec<RankedProducer> = ranking.into_iter().take(required).collect();
    info!(
        "Round {} starts at height {} with {} active producers",
        info.round,
        info.round_height,
        producers.len()
    );
    Ok(RoundState {
        info,
        block_time,
        producers,
    })
}

/// Rebuild the ranking from wallet state and select the active set of
/// the round containing `height`.
pub fn restore_current_round(
    wallets: &mut WalletRepository,
    schedule: &MilestoneSchedule,
    height: u64,
) -> DposResult<RoundState> {
    let height = height.max(1);
    let info = round_info_from_height(schedule, height)?;
    let ranking = build_producer_ranking(wallets)?;
    set_producers_for_round(ranking, info, schedule.at(height).block_time)
}
