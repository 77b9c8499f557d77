// Copyright (c) 2023-2025 The Meridian Foundation

//! Vote-weighted balance calculator.
//!
//! Splits a wallet's wealth across the producers it votes for. The split
//! must conserve every unit: the allocations always sum to exactly
//! `balance + locked_balance`, with rounding loss handed back out in
//! vote declaration order. The remainder order is consensus-relevant,
//! so it is fixed here and covered by tests.

use crate::{
    error::{StateError, StateResult},
    repository::WalletRepository,
    wallet::Votes,
};
use mrd_blockchain_types::{Address, Amount};
use std::collections::BTreeMap;

/// Split `balance` and `locked_balance` across the voted producers.
///
/// Balance and locked balance are two independent pools. Each pool is
/// first divided by flooring `pool * hundredths / 10_000` per share;
/// the pool's rounding remainder is then spread evenly across the
/// shares, with the earliest declarations taking the units left over
/// by that division. Shares totalling 100% leave a remainder below the
/// share count, so only the even spread's leftover units move; a
/// partial vote hands its whole shortfall back out the same way,
/// keeping the conservation guarantee intact.
///
/// The result maps every voted username, even to a zero allocation.
/// Callers guarantee `balance + locked_balance` fits the amount type;
/// checked credits keep that true ledger-wide.
pub fn compute_vote_balances(
    balance: Amount,
    locked_balance: Amount,
    votes: &Votes,
) -> BTreeMap<String, Amount> {
    let shares = votes.shares();
    if shares.is_empty() {
        return BTreeMap::new();
    }

    let mut totals = vec![0 as Amount; shares.len()];
    for pool in [balance, locked_balance] {
        let mut allotted: Amount = 0;
        for (total, share) in totals.iter_mut().zip(shares) {
            let cut = share.percent.share_of(pool);
            *total += cut;
            allotted += cut;
        }
        let remainder = pool - allotted;
        if remainder > 0 {
            let count = totals.len() as Amount;
            let spread = remainder / count;
            let extra = remainder % count;
            for (index, total) in totals.iter_mut().enumerate() {
                *total += spread;
                if (index as Amount) < extra {
                    *total += 1;
                }
            }
        }
    }

    shares
        .iter()
        .zip(totals)
        .map(|(share, total)| (share.username.clone(), total))
        .collect()
}

/// Re-derive the vote balances of the wallet at `address` and fold the
/// change into each named producer's aggregate.
///
/// A no-op when the wallet does not exist or its split is unchanged.
/// Producer aggregates move by the per-username delta, so repeated calls
/// converge instead of double counting.
pub fn update_vote_balances(
    wallets: &mut WalletRepository,
    address: &Address,
) -> StateResult<()> {
    let Some(wallet) = wallets.get(address) else {
        return Ok(());
    };
    let old = wallet.vote_balances().clone();
    let new = match wallet.votes() {
        Some(votes) if !votes.is_empty() => {
            compute_vote_balances(wallet.balance(), wallet.locked_balance(), votes)
        }
        _ => BTreeMap::new(),
    };
    if new == old {
        return Ok(());
    }

    let mut usernames: Vec<String> = old.keys().cloned().collect();
    for username in new.keys() {
        if !old.contains_key(username) {
            usernames.push(username.clone());
        }
    }
    for username in &usernames {
        adjust_producer_aggregate(
            wallets,
            username,
            old.get(username).copied(),
            new.get(username).copied(),
        )?;
    }

    if let Some(wallet) = wallets.get_mut(address) {
        wallet.set_vote_balances(new);
    }
    Ok(())
}

/// Move one producer's `vote_balance` and `voters` aggregates from the
/// voter's old allocation to its new one.
fn adjust_producer_aggregate(
    wallets: &mut WalletRepository,
    username: &str,
    old: Option<Amount>,
    new: Option<Amount>,
) -> StateResult<()> {
    let owner = wallets
        .address_by_username(username)
        .cloned()
        .ok_or_else(|| StateError::UnknownUsername(username.to_owned()))?;
    let producer = wallets
        .get_mut(&owner)
        .ok_or_else(|| StateError::UnknownWallet(owner.clone()))?;
    producer.update_producer(|attributes| {
        attributes.vote_balance = attributes
            .vote_balance
            .checked_sub(old.unwrap_or(0))
            .ok_or_else(|| StateError::VoteBalanceUnderflow(username.to_owned()))?
            .checked_add(new.unwrap_or(0))
            .ok_or_else(|| StateError::BalanceOverflow(owner.clone()))?;
        match (old, new) {
            (None, Some(_)) => {
                attributes.voters = attributes
                    .voters
                    .checked_add(1)
                    .ok_or_else(|| StateError::CounterOverflow(owner.clone()))?;
            }
            (Some(_), None) => {
                attributes.voters = attributes
                    .voters
                    .checked_sub(1)
                    .ok_or_else(|| StateError::CounterUnderflow(owner.clone()))?;
            }
            _ => {}
        }
        Ok(())
    })
}
