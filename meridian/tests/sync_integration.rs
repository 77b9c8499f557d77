// Copyright (c) 2023-2025 The Meridian Foundation
//
//! End-to-end node synchronization tests.
//!
//! Each test assembles a full node over in-memory collaborators and
//! drives it through a complete flow:
//! 1. Boot an empty node and catch up with a peer chain through polls
//! 2. Restart over seeded storage and rebuild all wallet state
//! 3. Repair a corrupt chain by rolling back, then re-initialize
//! 4. Rewind a reported fork and resume syncing
//! 5. Refuse to boot over a foreign genesis block
//! 6. Run in test mode without touching the network
//! 7. Apply a broadcast block delivered while idle

mod common;

use common::{make_block, make_chain, test_config, CountingPool, InMemoryChain, ScriptedNetwork, GENERATOR};
use meridian::Node;
use mrd_blockchain_types::{compute_block_id, Address};
use mrd_ledger_state::GENESIS_PRODUCER_USERNAME;
use mrd_ledger_sync::SyncState;

#[tokio::test]
async fn test_bootstrap_and_catch_up_through_polls() {
    let mut config = test_config();
    config.node.network_start = true;
    let storage = InMemoryChain::empty();
    let network = ScriptedNetwork::serving(make_chain(5));
    let pool = CountingPool::new();
    let mut node = Node::new(&config, storage.clone(), network.clone(), pool.clone()).unwrap();

    node.start().await.unwrap();
    assert_eq!(node.sync_state(), SyncState::Idle);
    assert_eq!(storage.height(), 1);

    // First poll discovers blocks 2..=5, second finds nothing new.
    node.sync_service_mut().poll_tick().await;
    node.sync_service_mut().poll_tick().await;

    assert_eq!(node.sync_state(), SyncState::Idle);
    assert!(node.is_synced());
    assert_eq!(storage.len(), 5);
    assert_eq!(node.shared_context().read().height(), 5);
    assert_eq!(pool.readd_count(), 1);
    assert_eq!(network.start_count(), 1);
}

#[tokio::test]
async fn test_restart_rebuilds_wallets_from_storage() {
    let mut config = test_config();
    config.node.network_start = true;
    let storage = InMemoryChain::seeded(make_chain(5));
    let network = ScriptedNetwork::serving(Vec::new());
    let mut node = Node::new(&config, storage.clone(), network, CountingPool::new()).unwrap();

    node.start().await.unwrap();

    assert_eq!(node.sync_state(), SyncState::Idle);
    let context = node.shared_context();
    let ctx = context.read();
    assert_eq!(ctx.height(), 5);
    assert_eq!(ctx.wallets.len(), 1);

    let producer = ctx.wallets.find_by_username(GENESIS_PRODUCER_USERNAME).unwrap();
    assert_eq!(producer.address(), &Address::from_public_key(&GENERATOR));
    assert_eq!(producer.producer().unwrap().produced_blocks, 5);
}

#[tokio::test]
async fn test_corruption_rolls_back_then_reinitializes() {
    let mut config = test_config();
    config.node.network_start = true;
    config.sync.rollback_steps = 1;
    config.sync.max_block_rewind = 10;
    let storage = InMemoryChain::seeded(make_chain(10));
    storage.corrupt_above(7);
    let network = ScriptedNetwork::serving(Vec::new());
    let mut node = Node::new(&config, storage.clone(), network, CountingPool::new()).unwrap();

    node.start().await.unwrap();

    // Three single-block rewinds reach height 7, where integrity holds.
    assert_eq!(node.sync_state(), SyncState::Idle);
    assert_eq!(storage.len(), 7);
    assert_eq!(node.shared_context().read().height(), 7);
}

#[tokio::test]
async fn test_reported_fork_rewinds_and_resyncs() {
    let mut config = test_config();
    config.node.network_start = true;
    let storage = InMemoryChain::empty();
    let network = ScriptedNetwork::serving(make_chain(3));
    let mut node = Node::new(&config, storage.clone(), network.clone(), CountingPool::new()).unwrap();

    node.start().await.unwrap();
    node.sync_service_mut().poll_tick().await;
    assert_eq!(node.shared_context().read().height(), 3);

    // Two more blocks arrive while a fork report asks for a 2-deep rewind.
    network.extend(make_chain(5)[3..].to_vec());
    node.report_fork(Some(2));
    node.sync_service_mut().poll_tick().await;

    assert_eq!(node.sync_state(), SyncState::Idle);
    assert_eq!(storage.len(), 3);
    let context = node.shared_context();
    let ctx = context.read();
    assert_eq!(ctx.height(), 3);
    let producer = ctx.wallets.find_by_username(GENESIS_PRODUCER_USERNAME).unwrap();
    assert_eq!(producer.producer().unwrap().produced_blocks, 3);
}

#[tokio::test]
async fn test_unknown_genesis_refuses_to_boot() {
    let config = test_config();
    let mut foreign = make_block(1, None);
    foreign.timestamp = 999;
    foreign.id = compute_block_id(&foreign);
    let storage = InMemoryChain::seeded(vec![foreign]);
    let network = ScriptedNetwork::serving(Vec::new());
    let mut node = Node::new(&config, storage, network, CountingPool::new()).unwrap();

    assert!(node.start().await.is_err());
    assert_eq!(node.sync_state(), SyncState::Failed);
}

#[tokio::test]
async fn test_broadcast_block_extends_the_chain() {
    let mut config = test_config();
    config.node.network_start = true;
    let storage = InMemoryChain::empty();
    let network = ScriptedNetwork::serving(Vec::new());
    let mut node = Node::new(&config, storage.clone(), network, CountingPool::new()).unwrap();

    node.start().await.unwrap();
    assert_eq!(storage.height(), 1);

    let chain = make_chain(2);
    node.block_received(chain[1].clone()).await;

    assert_eq!(node.sync_state(), SyncState::Idle);
    assert_eq!(storage.len(), 2);
    assert_eq!(node.shared_context().read().height(), 2);
}

#[tokio::test]
async fn test_test_mode_marks_synced_without_network() {
    let mut config = test_config();
    config.node.test_mode = true;
    let storage = InMemoryChain::empty();
    let network = ScriptedNetwork::serving(make_chain(5));
    let pool = CountingPool::new();
    let mut node = Node::new(&config, storage.clone(), network.clone(), pool.clone()).unwrap();

    node.start().await.unwrap();

    assert_eq!(node.sync_state(), SyncState::TestMode);
    assert!(node.is_synced());
    assert_eq!(storage.len(), 1);
    assert_eq!(pool.readd_count(), 1);
    assert_eq!(network.start_count(), 0);
    assert_eq!(network.download_count(), 0);
}
