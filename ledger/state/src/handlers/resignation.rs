// Copyright (c) 2023-2025 The Meridian Foundation

//! Producer resignation.

use super::{apply_sender, ensure_sender_nonce, revert_sender, total_cost, TransactionHandler};
use crate::{
    error::{StateError, StateResult},
    repository::WalletRepository,
};
use mrd_blockchain_types::{ResignationKind, Transaction, TransactionAsset, TransactionType};

/// Marks the sender's producer as resigned. A resigned producer keeps
/// its username and attributes but is excluded from ranking and can no
/// longer be voted for.
pub struct ResignationHandler;

fn kind(tx: &Transaction) -> StateResult<ResignationKind> {
    match &tx.asset {
        TransactionAsset::Resignation { kind } => Ok(*kind),
        _ => Err(StateError::MalformedAsset(tx.id)),
    }
}

impl TransactionHandler for ResignationHandler {
    fn tx_type(&self) -> TransactionType {
        TransactionType::PRODUCER_RESIGNATION
    }

    fn apply(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()> {
        let kind = kind(tx)?;
        let address = tx.sender_address();
        let wallet = wallets
            .get(&address)
            .ok_or_else(|| StateError::UnknownWallet(address.clone()))?;
        let producer = wallet
            .producer()
            .ok_or_else(|| StateError::NotAProducer(address.clone()))?;
        if producer.is_resigned() {
            return Err(StateError::AlreadyResigned(address.clone()));
        }
        apply_sender(tx, wallets, total_cost(tx)?)?;
        wallets
            .get_mut(&address)
            .ok_or(StateError::UnknownWallet(address))?
            .update_producer(|attributes| {
                attributes.resignation = Some(kind);
                Ok(())
            })
    }

    fn revert(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()> {
        kind(tx)?;
        ensure_sender_nonce(tx, wallets)?;
        let address = tx.sender_address();
        wallets
            .get_mut(&address)
            .ok_or(StateError::UnknownWallet(address))?
            .update_producer(|attributes| {
                attributes.resignation = None;
                Ok(())
            })?;
        revert_sender(tx, wallets, total_cost(tx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::ProducerAttributes;
    use mrd_blockchain_types::{PublicKey, TransactionId};

    fn resignation(nonce: u64, kind: ResignationKind) -> Transaction {
        Transaction {
            id: TransactionId::new([4u8; 32]),
            tx_type: TransactionType::PRODUCER_RESIGNATION,
            sender_public_key: PublicKey::new([1u8; 32]),
            recipient: None,
            amount: 0,
            fee: 1,
            burned_fee: 0,
            nonce,
            asset: TransactionAsset::Resignation { kind },
        }
    }

    fn registered_sender(wallets: &mut WalletRepository, tx: &Transaction) {
        let wallet = wallets.find_or_create_by_public_key(&tx.sender_public_key);
        wallet.credit(100).unwrap();
        wallet.set_producer(ProducerAttributes::new("alpha"));
        let address = tx.sender_address();
        wallets.index_username("alpha", &address).unwrap();
    }

    #[test]
    fn test_resignation_round_trip() {
        let mut wallets = WalletRepository::new();
        let tx = resignation(1, ResignationKind::Permanent);
        registered_sender(&mut wallets, &tx);

        ResignationHandler.apply(&tx, &mut wallets).unwrap();
        let wallet = wallets.get(&tx.sender_address()).unwrap();
        assert!(wallet.is_resigned());
        assert_eq!(
            wallet.producer().unwrap().resignation,
            Some(ResignationKind::Permanent)
        );

        ResignationHandler.revert(&tx, &mut wallets).unwrap();
        let wallet = wallets.get(&tx.sender_address()).unwrap();
        assert!(!wallet.is_resigned());
        assert_eq!(wallet.balance(), 100);
    }

    #[test]
    fn test_resignation_requires_a_producer() {
        let mut wallets = WalletRepository::new();
        let tx = resignation(1, ResignationKind::Temporary);
        wallets
            .find_or_create_by_public_key(&tx.sender_public_key)
            .credit(100)
            .unwrap();
        assert_eq!(
            ResignationHandler.apply(&tx, &mut wallets),
            Err(StateError::NotAProducer(tx.sender_address()))
        );
    }

    #[test]
    fn test_double_resignation_is_rejected() {
        let mut wallets = WalletRepository::new();
        let first = resignation(1, ResignationKind::Temporary);
        let second = resignation(2, ResignationKind::Permanent);
        registered_sender(&mut wallets, &first);

        ResignationHandler.apply(&first, &mut wallets).unwrap();
        assert_eq!(
            ResignationHandler.apply(&second, &mut wallets),
            Err(StateError::AlreadyResigned(first.sender_address()))
        );
        // Still resigned with the original kind, and not charged twice.
        let wallet = wallets.get(&first.sender_address()).unwrap();
        assert_eq!(
            wallet.producer().unwrap().resignation,
            Some(ResignationKind::Temporary)
        );
        assert_eq!(wallet.balance(), 99);
    }
}
