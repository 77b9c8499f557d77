// Copyright (c) 2023-2025 The Meridian Foundation

//! Fund locking: escrow under the lock transaction's id.

use super::{apply_sender, ensure_sender_nonce, revert_sender, total_cost, TransactionHandler};
use crate::{
    error::{StateError, StateResult},
    repository::WalletRepository,
    wallet::Lock,
};
use mrd_blockchain_types::{Address, Transaction, TransactionAsset, TransactionType};

/// Escrows `amount` on the sender's wallet until a claim releases it to
/// the designated recipient.
///
/// Locked funds leave the spendable balance but keep counting toward
/// the sender's vote weight through `locked_balance`.
pub struct LockHandler;

fn expiration(tx: &Transaction) -> StateResult<u64> {
    match &tx.asset {
        TransactionAsset::Lock { expiration } => Ok(*expiration),
        _ => Err(StateError::MalformedAsset(tx.id)),
    }
}

fn recipient(tx: &Transaction) -> StateResult<Address> {
    tx.recipient
        .clone()
        .ok_or(StateError::MissingRecipient(tx.id))
}

impl TransactionHandler for LockHandler {
    fn tx_type(&self) -> TransactionType {
        TransactionType::LOCK
    }

    fn apply(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()> {
        let expiration = expiration(tx)?;
        let recipient = recipient(tx)?;
        if wallets.lock_owner(&tx.id).is_some() {
            return Err(StateError::DuplicateLock(tx.id));
        }
        apply_sender(tx, wallets, total_cost(tx)?)?;

        let address = tx.sender_address();
        let lock = Lock {
            amount: tx.amount,
            recipient,
            expiration,
        };
        wallets.find_or_create(&address).add_lock(tx.id, lock)?;
        wallets.index_lock(tx.id, &address)
    }

    fn revert(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()> {
        expiration(tx)?;
        ensure_sender_nonce(tx, wallets)?;
        let address = tx.sender_address();
        wallets
            .get_mut(&address)
            .ok_or(StateError::UnknownWallet(address))?
            .remove_lock(&tx.id)?;
        wallets.forget_lock(&tx.id);
        revert_sender(tx, wallets, total_cost(tx)?)
    }
}
