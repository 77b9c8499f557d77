// Copyright (c) 2023-2025 The Meridian Foundation

//! Per-network chain parameter schedules.

use crate::{
    amount::{Amount, VotePercent},
    keys::Address,
};
use displaydoc::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Chain parameters governing a span of heights.
///
/// A milestone takes effect at its starting height and stays in force
/// until the next milestone in the schedule.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Milestone {
    /// First height at which this milestone is in force.
    pub height: u64,

    /// Number of producers forging in each round.
    pub active_producers: u32,

    /// Target seconds between blocks.
    pub block_time: u64,

    /// Reward minted per block.
    pub reward: Amount,

    /// Share of each block reward donated, by recipient.
    #[serde(default)]
    pub donations: BTreeMap<Address, VotePercent>,
}

/// Validation errors for a milestone schedule.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum MilestoneError {
    /// Schedule contains no milestones
    Empty,
    /// First milestone must start at height 1, found {0}
    FirstSpanStart(u64),
    /// Milestone heights must be strictly increasing, violated at height {0}
    OutOfOrder(u64),
    /// Milestone at height {0} has no active producers
    NoProducers(u64),
    /// Milestone at height {0} has a zero block time
    ZeroBlockTime(u64),
    /// Milestone at height {0} changes the producer count off a round boundary
    ProducerChangeOffBoundary(u64),
}

impl std::error::Error for MilestoneError {}

/// An ordered, validated list of [`Milestone`]s covering the whole chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MilestoneSchedule {
    milestones: Vec<Milestone>,
}

impl MilestoneSchedule {
    /// Validate and wrap a list of milestones.
    ///
    /// The first milestone must start at height 1 and heights must be
    /// strictly increasing. Round-boundary alignment of producer-count
    /// changes is checked by the round calculator, which owns the round
    /// arithmetic.
    pub fn new(milestones: Vec<Milestone>) -> Result<Self, MilestoneError> {
        let first = milestones.first().ok_or(MilestoneError::Empty)?;
        if first.height != 1 {
            return Err(MilestoneError::FirstSpanStart(first.height));
        }
        let mut prev_height = 0;
        for milestone in &milestones {
            if milestone.height <= prev_height {
                return Err(MilestoneError::OutOfOrder(milestone.height));
            }
            if milestone.active_producers == 0 {
                return Err(MilestoneError::NoProducers(milestone.height));
            }
            if milestone.block_time == 0 {
                return Err(MilestoneError::ZeroBlockTime(milestone.height));
            }
            prev_height = milestone.height;
        }
        Ok(Self { milestones })
    }

    /// The milestone in force at `height`.
    pub fn at(&self, height: u64) -> &Milestone {
        self.milestones
            .iter()
            .rev()
            .find(|m| m.height <= height)
            .unwrap_or(&self.milestones[0])
    }

    /// All milestones, ordered by starting height.
    pub fn spans(&self) -> &[Milestone] {
        &self.milestones
    }
}
