// Copyright (c) 2023-2025 The Meridian Foundation

//! Node configuration, loaded from a TOML file.

use anyhow::{Context, Result};
use mrd_blockchain_types::NetworkDescription;
use mrd_ledger_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Main configuration for a Meridian node.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// The network this node joins: genesis block, launch time, and the
    /// milestone schedule.
    pub network: NetworkDescription,

    /// Node-local toggles.
    #[serde(default)]
    pub node: NodeConfig,

    /// Synchronization tunables.
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Toggles that shape how this particular node behaves on the network.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NodeConfig {
    /// This node starts the network; its local chain is canonical and
    /// syncing never waits for peers.
    #[serde(default)]
    pub network_start: bool,

    /// Skip network monitoring entirely and treat the node as synced.
    #[serde(default)]
    pub test_mode: bool,

    /// Enable debug-level logging.
    #[serde(default)]
    pub verbose: bool,
}

/// Synchronization tunables, all with conservative defaults.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SyncSettings {
    /// Hard ceiling on blocks removed while repairing a corrupt chain.
    #[serde(default = "default_max_block_rewind")]
    pub max_block_rewind: u64,

    /// Blocks removed per repair attempt.
    #[serde(default = "default_rollback_steps")]
    pub rollback_steps: u64,

    /// Seconds between recurring sync poll ticks.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Download queue depth above which downloading pauses.
    #[serde(default = "default_queue_high_water")]
    pub queue_high_water: usize,

    /// Blocks requested per download batch.
    #[serde(default = "default_download_batch")]
    pub download_batch: u32,
}

fn default_max_block_rewind() -> u64 {
    10_000
}

fn default_rollback_steps() -> u64 {
    1_000
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_queue_high_water() -> usize {
    100
}

fn default_download_batch() -> u32 {
    400
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_block_rewind: default_max_block_rewind(),
            rollback_steps: default_rollback_steps(),
            poll_interval_secs: default_poll_interval_secs(),
            queue_high_water: default_queue_high_water(),
            download_batch: default_download_batch(),
        }
    }
}

impl Config {
    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Check if config file exists
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    /// The sync-service configuration this node config describes.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            max_block_rewind: self.sync.max_block_rewind,
            rollback_steps: self.sync.rollback_steps,
            launch_time: self.network.launch_time,
            poll_interval_secs: self.sync.poll_interval_secs,
            queue_high_water: self.sync.queue_high_water,
            download_batch: self.sync.download_batch,
            network_start: self.node.network_start,
            test_mode: self.node.test_mode,
        }
    }
}
