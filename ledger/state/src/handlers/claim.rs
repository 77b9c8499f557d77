// Copyright (c) 2023-2025 The Meridian Foundation

//! Lock claiming: releases escrowed funds to the lock's beneficiary.

use super::{apply_sender, ensure_sender_nonce, revert_sender, total_cost, TransactionHandler};
use crate::{
    error::{StateError, StateResult},
    repository::WalletRepository,
};
use mrd_blockchain_types::{Address, Transaction, TransactionAsset, TransactionId, TransactionType};

/// Releases an open lock: the escrowed amount moves from the lock
/// owner's locked balance to the beneficiary's spendable balance.
///
/// The released lock is stashed away so a revert can restore it
/// verbatim, expiration included. Whether a claim is timely is checked
/// by transaction validation upstream; the ledger only moves funds.
pub struct ClaimHandler;

fn lock_id(tx: &Transaction) -> StateResult<TransactionId> {
    match &tx.asset {
        TransactionAsset::Claim { lock_id } => Ok(*lock_id),
        _ => Err(StateError::MalformedAsset(tx.id)),
    }
}

impl TransactionHandler for ClaimHandler {
    fn tx_type(&self) -> TransactionType {
        TransactionType::CLAIM
    }

    fn apply(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()> {
        let lock_id = lock_id(tx)?;
        let owner = wallets
            .lock_owner(&lock_id)
            .cloned()
            .ok_or(StateError::UnknownLock(lock_id))?;
        let lock = wallets
            .get(&owner)
            .and_then(|w| w.locks().get(&lock_id).cloned())
            .ok_or(StateError::UnknownLock(lock_id))?;
        // Headroom check up front, as for transfers: nothing after the
        // sender commit may fail.
        if wallets
            .find_or_create(&lock.recipient)
            .balance()
            .checked_add(lock.amount)
            .is_none()
        {
            return Err(StateError::BalanceOverflow(lock.recipient.clone()));
        }
        apply_sender(tx, wallets, total_cost(tx)?)?;

        let lock = wallets
            .get_mut(&owner)
            .ok_or_else(|| StateError::UnknownWallet(owner.clone()))?
            .remove_lock(&lock_id)?;
        wallets.forget_lock(&lock_id);
        wallets.find_or_create(&lock.recipient).credit(lock.amount)?;
        wallets.stash_claimed_lock(lock_id, owner, lock);
        Ok(())
    }

    fn revert(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()> {
        let lock_id = lock_id(tx)?;
        ensure_sender_nonce(tx, wallets)?;
        let (_, lock) = wallets
            .claimed_lock(&lock_id)
            .cloned()
            .ok_or(StateError::UnknownLock(lock_id))?;
        wallets
            .get_mut(&lock.recipient)
            .ok_or_else(|| StateError::UnknownWallet(lock.recipient.clone()))?
            .debit(lock.amount)?;
        let (owner, lock) = wallets.unstash_claimed_lock(&lock_id)?;
        wallets.find_or_create(&owner).add_lock(lock_id, lock)?;
        wallets.index_lock(lock_id, &owner)?;
        revert_sender(tx, wallets, total_cost(tx)?)
    }

    fn vote_balance_targets(
        &self,
        tx: &Transaction,
        wallets: &WalletRepository,
    ) -> Vec<Address> {
        let Ok(lock_id) = lock_id(tx) else {
            return Vec::new();
        };
        if let Some(owner) = wallets.lock_owner(&lock_id) {
            let mut targets = vec![owner.clone()];
            if let Some(lock) = wallets.get(owner).and_then(|w| w.locks().get(&lock_id)) {
                targets.push(lock.recipient.clone());
            }
            return targets;
        }
        if let Some((owner, lock)) = wallets.claimed_lock(&lock_id) {
            return vec![owner.clone(), lock.recipient.clone()];
        }
        Vec::new()
    }
}
