// Copyright (c) 2023-2025 The Meridian Foundation

//! Per-network chain description.

use crate::{
    block::{Block, BlockId},
    milestones::{Milestone, MilestoneError, MilestoneSchedule},
};
use serde::{Deserialize, Serialize};

/// Everything that distinguishes one Meridian network from another: its
/// genesis block, its launch time, and its parameter schedule.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NetworkDescription {
    /// Human-readable network name.
    pub name: String,

    /// Unix timestamp (seconds) at which the network launches. Before this
    /// time nodes idle in a countdown rather than polling peers.
    pub launch_time: u64,

    /// The genesis block of the chain.
    pub genesis_block: Block,

    /// Chain parameters, ordered by starting height.
    pub milestones: Vec<Milestone>,
}

impl NetworkDescription {
    /// The identifier of this network's genesis block.
    pub fn genesis_id(&self) -> BlockId {
        self.genesis_block.id
    }

    /// Build the validated milestone schedule of this network.
    pub fn schedule(&self) -> Result<MilestoneSchedule, MilestoneError> {
        MilestoneSchedule::new(self.milestones.clone())
    }
}
