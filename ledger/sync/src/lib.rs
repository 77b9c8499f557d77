// Copyright (c) 2023-2025 The Meridian Foundation

//! Keeps the local chain in step with the network: a typed sync state
//! machine, the entry actions that drive it (download, queue draining,
//! database rollback, fork recovery), and the block processor every
//! accepted block passes through.

mod collaborators;
mod error;
mod processor;
mod service;
mod state;

pub use collaborators::{ChainStorage, NetworkHealth, NetworkMonitor, StateBuilder, TransactionPool};
pub use error::{SyncError, SyncResult};
pub use processor::BlockProcessor;
pub use service::{SyncConfig, SyncService};
pub use state::{transition, SyncEvent, SyncState};
