// Copyright (c) 2023-2025 The Meridian Foundation

//! Plain value transfer.

use super::{apply_sender, ensure_sender_nonce, revert_sender, total_cost, TransactionHandler};
use crate::{
    error::{StateError, StateResult},
    repository::WalletRepository,
};
use mrd_blockchain_types::{Transaction, TransactionType};

/// Moves `amount` from the sender to the recipient; the fee stays with
/// the block producer at block level.
pub struct TransferHandler;

impl TransactionHandler for TransferHandler {
    fn tx_type(&self) -> TransactionType {
        TransactionType::TRANSFER
    }

    fn apply(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()> {
        let recipient = tx
            .recipient
            .clone()
            .ok_or(StateError::MissingRecipient(tx.id))?;
        let cost = total_cost(tx)?;
        // Headroom check up front: the recipient credit below must not be
        // able to fail once the sender has been debited.
        if wallets
            .find_or_create(&recipient)
            .balance()
            .checked_add(tx.amount)
            .is_none()
        {
            return Err(StateError::BalanceOverflow(recipient));
        }
        apply_sender(tx, wallets, cost)?;
        wallets.find_or_create(&recipient).credit(tx.amount)
    }

    fn revert(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()> {
        let recipient = tx
            .recipient
            .clone()
            .ok_or(StateError::MissingRecipient(tx.id))?;
        ensure_sender_nonce(tx, wallets)?;
        wallets
            .get_mut(&recipient)
            .ok_or(StateError::UnknownWallet(recipient))?
            .debit(tx.amount)?;
        revert_sender(tx, wallets, total_cost(tx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrd_blockchain_types::{Address, PublicKey, TransactionAsset, TransactionId};

    fn transfer(nonce: u64, amount: u64, fee: u64, recipient: &Address) -> Transaction {
        Transaction {
            id: TransactionId::new([8u8; 32]),
            tx_type: TransactionType::TRANSFER,
            sender_public_key: PublicKey::new([1u8; 32]),
            recipient: Some(recipient.clone()),
            amount,
            fee,
            burned_fee: 0,
            nonce,
            asset: TransactionAsset::None,
        }
    }

    #[test]
    fn test_transfer_moves_amount_and_burns_nothing_walletside() {
        let mut wallets = WalletRepository::new();
        let recipient = Address::new("Mrecipient");
        let tx = transfer(1, 30, 2, &recipient);
        wallets
            .find_or_create_by_public_key(&tx.sender_public_key)
            .credit(100)
            .unwrap();

        TransferHandler.apply(&tx, &mut wallets).unwrap();
        assert_eq!(wallets.get(&tx.sender_address()).unwrap().balance(), 68);
        assert_eq!(wallets.get(&recipient).unwrap().balance(), 30);

        TransferHandler.revert(&tx, &mut wallets).unwrap();
        assert_eq!(wallets.get(&tx.sender_address()).unwrap().balance(), 100);
        assert_eq!(wallets.get(&recipient).unwrap().balance(), 0);
        assert_eq!(wallets.get(&tx.sender_address()).unwrap().nonce(), 0);
    }

    #[test]
    fn test_transfer_requires_recipient() {
        let mut wallets = WalletRepository::new();
        let mut tx = transfer(1, 1, 1, &Address::new("Mx"));
        tx.recipient = None;
        assert_eq!(
            TransferHandler.apply(&tx, &mut wallets),
            Err(StateError::MissingRecipient(tx.id))
        );
    }

    #[test]
    fn test_self_transfer_round_trips() {
        let mut wallets = WalletRepository::new();
        let tx = {
            let sender_key = PublicKey::new([1u8; 32]);
            let self_address = Address::from_public_key(&sender_key);
            transfer(1, 10, 3, &self_address)
        };
        wallets
            .find_or_create_by_public_key(&tx.sender_public_key)
            .credit(50)
            .unwrap();

        TransferHandler.apply(&tx, &mut wallets).unwrap();
        // Only the fee leaves the wallet on a self-transfer.
        assert_eq!(wallets.get(&tx.sender_address()).unwrap().balance(), 47);

        TransferHandler.revert(&tx, &mut wallets).unwrap();
        assert_eq!(wallets.get(&tx.sender_address()).unwrap().balance(), 50);
    }
}
