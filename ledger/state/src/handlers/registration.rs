// Copyright (c) 2023-2025 The Meridian Foundation

//! Producer username registration.

use super::{apply_sender, ensure_sender_nonce, revert_sender, total_cost, TransactionHandler};
use crate::{
    error::{StateError, StateResult},
    repository::WalletRepository,
    wallet::ProducerAttributes,
};
use mrd_blockchain_types::{Transaction, TransactionAsset, TransactionType};

/// Registers the sender as a block producer under a unique username.
pub struct RegistrationHandler;

fn username(tx: &Transaction) -> StateResult<&str> {
    match &tx.asset {
        TransactionAsset::Registration { username } => Ok(username),
        _ => Err(StateError::MalformedAsset(tx.id)),
    }
}

impl TransactionHandler for RegistrationHandler {
    fn tx_type(&self) -> TransactionType {
        TransactionType::PRODUCER_REGISTRATION
    }

    fn apply(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()> {
        let username = username(tx)?.to_owned();
        let address = tx.sender_address();
        if let Some(owner) = wallets.address_by_username(&username) {
            if owner != &address {
                return Err(StateError::UsernameTaken(username));
            }
        }
        if wallets.get(&address).is_some_and(|w| w.is_producer()) {
            return Err(StateError::AlreadyProducer(address));
        }
        apply_sender(tx, wallets, total_cost(tx)?)?;
        let wallet = wallets.find_or_create(&address);
        wallet.set_producer(ProducerAttributes::new(username.clone()));
        wallets.index_username(&username, &address)
    }

    fn revert(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()> {
        let username = username(tx)?.to_owned();
        ensure_sender_nonce(tx, wallets)?;
        let address = tx.sender_address();
        wallets.forget_username(&username);
        if let Some(wallet) = wallets.get_mut(&address) {
            wallet.forget_producer();
        }
        revert_sender(tx, wallets, total_cost(tx)?)
    }
}
