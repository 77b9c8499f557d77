// Copyright (c) 2023-2025 The Meridian Foundation

//! Producer ranking.
//!
//! Ranking is a pure function of wallet state: vote balance descending,
//! primary public key ascending on ties. An exact tie on both is a
//! duplicate identity and aborts ranking, so the order never depends on
//! map iteration.

use crate::error::{DposError, DposResult};
use mrd_blockchain_types::{Address, Amount, KeyRole, PublicKey};
use mrd_ledger_state::{update_vote_balances, StateError, WalletRepository};
use tracing::debug;

/// One producer's position in the current ranking.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RankedProducer {
    /// The producer's wallet.
    pub address: Address,
    /// The producer's primary public key, the ranking tie-breaker.
    pub public_key: PublicKey,
    /// The registered username.
    pub username: String,
    /// 1-based rank.
    pub rank: u32,
    /// Aggregate vote-weighted balance backing the producer.
    pub vote_balance: Amount,
}

/// Re-derive every voter's vote-weighted balances and the producer
/// aggregates from scratch.
///
/// Incremental updates happen inside block application; this full pass
/// runs only during integrity rebuilds, where the aggregates cannot be
/// trusted.
pub fn build_vote_balances(wallets: &mut WalletRepository) -> DposResult<()> {
    wallets.reset_vote_aggregates()?;
    let voters: Vec<Address> = wallets
        .iter()
        .filter(|wallet| wallet.has_voted())
        .map(|wallet| wallet.address().clone())
        .collect();
    debug!("Rebuilding vote balances for {} voters", voters.len());
    for address in &voters {
        update_vote_balances(wallets, address)?;
    }
    Ok(())
}

/// Rank every non-resigned producer and write the ranks back to the
/// wallets. Resigned producers keep their attributes but lose their
/// rank.
///
/// Returns the ranking in rank order.
pub fn build_producer_ranking(
    wallets: &mut WalletRepository,
) -> DposResult<Vec<RankedProducer>> {
    let mut ranking: Vec<RankedProducer> = Vec::new();
    let mut resigned: Vec<Address> = Vec::new();
    for wallet in wallets.producers() {
        let Some(attributes) = wallet.producer() else {
            continue;
        };
        if attributes.is_resigned() {
            resigned.push(wallet.address().clone());
            continue;
        }
        let public_key = *wallet
            .public_key(KeyRole::Primary)
            .ok_or_else(|| DposError::MissingPublicKey(wallet.address().clone()))?;
        ranking.push(RankedProducer {
            address: wallet.address().clone(),
            public_key,
            username: attributes.username.clone(),
            rank: 0,
            vote_balance: attributes.vote_balance,
        });
    }

    ranking.sort_by(|a, b| {
        b.vote_balance
            .cmp(&a.vote_balance)
            .then_with(|| a.public_key.cmp(&b.public_key))
    });
    for pair in ranking.windows(2) {
        if pair[0].vote_balance == pair[1].vote_balance
            && pair[0].public_key == pair[1].public_key
        {
            return Err(DposError::DuplicateIdentity(pair[0].public_key));
        }
    }

    for (position, producer) in ranking.iter_mut().enumerate() {
        producer.rank = position as u32 + 1;
        set_rank(wallets, &producer.address, Some(producer.rank))?;
    }
    for address in &resigned {
        set_rank(wallets, address, None)?;
    }
    Ok(ranking)
}

fn set_rank(wallets: &mut WalletRepository, address: &Address, rank: Option<u32>) -> DposResult<()> {
    let wallet = wallets
        .get_mut(address)
        .ok_or_else(|| StateError::UnknownWallet(address.clone()))?;
    wallet.update_producer(|attributes| {
        attributes.rank = rank;
        Ok(())
    })?;
    Ok(())
}
