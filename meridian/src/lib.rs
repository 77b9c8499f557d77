// Copyright (c) 2023-2025 The Meridian Foundation

//! Meridian node library.
//!
//! Ties the chain crates together: loads the node and network
//! configuration, owns the shared ledger context, and wires the
//! synchronization service to the injected storage, network, and
//! transaction-pool collaborators.

#![deny(clippy::print_stdout)]

pub mod config;
pub mod node;
pub mod state_builder;
pub mod telemetry;

pub use config::{Config, NodeConfig, SyncSettings};
pub use node::{Node, SharedContext};
pub use state_builder::LedgerStateBuilder;
