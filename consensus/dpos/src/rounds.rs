// Copyright (c) 2023-2025 The Meridian Foundation

//! Round arithmetic and reward resolution.
//!
//! A round is `active_producers` consecutive heights forged by one
//! ranked producer set. Rounds tile each milestone span uniformly, so a
//! milestone may only change the producer count on a round boundary;
//! this module enforces that and derives round, round start, and reward
//! figures purely from height.

use crate::error::{DposError, DposResult};
use mrd_blockchain_types::{Address, Amount, MilestoneError, MilestoneSchedule};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// The round a height belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoundInfo {
    /// 1-based round number.
    pub round: u64,
    /// First height of the round.
    pub round_height: u64,
    /// Size of the round's active producer set.
    pub max_producers: u32,
}

impl RoundInfo {
    /// The heights the round spans.
    pub fn height_range(&self) -> RangeInclusive<u64> {
        self.round_height..=self.round_height + u64::from(self.max_producers) - 1
    }
}

/// Resolve the round containing `height`.
pub fn round_info_from_height(
    schedule: &MilestoneSchedule,
    height: u64,
) -> DposResult<RoundInfo> {
    if height == 0 {
        return Err(DposError::HeightOutOfRange(0));
    }
    let spans = schedule.spans();
    let mut round: u64 = 1;
    let mut span_start: u64 = 1;
    let mut producers = u64::from(spans[0].active_producers);
    for milestone in &spans[1..] {
        let changed = u64::from(milestone.active_producers);
        if changed == producers {
            continue;
        }
        if milestone.height > height {
            break;
        }
        let span_blocks = milestone.height - span_start;
        if span_blocks % producers != 0 {
            return Err(MilestoneError::ProducerChangeOffBoundary(milestone.height).into());
        }
        round += span_blocks / producers;
        span_start = milestone.height;
        producers = changed;
    }
    let completed = (height - span_start) / producers;
    Ok(RoundInfo {
        round: round + completed,
        round_height: span_start + completed * producers,
        max_producers: producers as u32,
    })
}

/// Check every producer-count change in `schedule` lands on a round
/// boundary. Run once at configuration load.
pub fn validate_round_boundaries(schedule: &MilestoneSchedule) -> DposResult<()> {
    let spans = schedule.spans();
    let mut span_start: u64 = 1;
    let mut producers = u64::from(spans[0].active_producers);
    for milestone in &spans[1..] {
        let changed = u64::from(milestone.active_producers);
        if changed == producers {
            continue;
        }
        let span_blocks = milestone.height - span_start;
        if span_blocks % producers != 0 {
            return Err(MilestoneError::ProducerChangeOffBoundary(milestone.height).into());
        }
        span_start = milestone.height;
        producers = changed;
    }
    Ok(())
}

/// True when `height` opens a fresh round.
pub fn is_new_round(schedule: &MilestoneSchedule, height: u64) -> DposResult<bool> {
    Ok(round_info_from_height(schedule, height)?.round_height == height)
}

/// The reward minted by the block at `height`.
pub fn block_reward(schedule: &MilestoneSchedule, height: u64) -> Amount {
    schedule.at(height).reward
}

/// Total reward minted across one round. Rewards may change mid-round,
/// so this sums per height.
pub fn round_reward(schedule: &MilestoneSchedule, info: &RoundInfo) -> Amount {
    info.height_range()
        .map(|height| block_reward(schedule, height))
        .sum()
}

/// The donation outputs owed by the block at `height`: each configured
/// recipient's floor share of the reward. Rounding loss stays with the
/// producer.
pub fn donation_outputs(schedule: &MilestoneSchedule, height: u64) -> BTreeMap<Address, Amount> {
    let milestone = schedule.at(height);
    milestone
        .donations
        .iter()
        .map(|(address, percent)| (address.clone(), percent.share_of(milestone.reward)))
        .collect()
}
