// Copyright (c) 2023-2025 The Meridian Foundation

//! Vote declaration and cancellation.

use super::{apply_sender, ensure_sender_nonce, revert_sender, total_cost, TransactionHandler};
use crate::{
    error::{StateError, StateResult},
    repository::WalletRepository,
    wallet::Votes,
};
use mrd_blockchain_types::{Transaction, TransactionAsset, TransactionType};

/// Replaces the sender's vote distribution. An empty distribution
/// cancels all votes.
///
/// The distribution a wallet held before each vote is recorded so that
/// reverting restores it exactly, however many votes deep the history
/// goes.
pub struct VoteHandler;

fn declared_votes(tx: &Transaction) -> StateResult<Votes> {
    match &tx.asset {
        TransactionAsset::Votes(shares) => Votes::new(shares.clone()),
        _ => Err(StateError::MalformedAsset(tx.id)),
    }
}

impl TransactionHandler for VoteHandler {
    fn tx_type(&self) -> TransactionType {
        TransactionType::VOTE
    }

    fn apply(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()> {
        let votes = declared_votes(tx)?;
        for share in votes.iter() {
            let producer = wallets
                .find_by_username(&share.username)
                .ok_or_else(|| StateError::UnknownUsername(share.username.clone()))?;
            if producer.is_resigned() {
                return Err(StateError::VoteForResignedProducer(share.username.clone()));
            }
        }
        apply_sender(tx, wallets, total_cost(tx)?)?;

        let address = tx.sender_address();
        let previous = wallets
            .get(&address)
            .and_then(|w| w.votes().cloned());
        wallets.push_vote_history(&address, previous);
        let wallet = wallets.find_or_create(&address);
        if votes.is_empty() {
            wallet.forget_votes();
        } else {
            wallet.set_votes(votes);
        }
        Ok(())
    }

    fn revert(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()> {
        declared_votes(tx)?;
        ensure_sender_nonce(tx, wallets)?;
        let address = tx.sender_address();
        let previous = wallets.pop_vote_history(&address)?;
        let wallet = wallets
            .get_mut(&address)
            .ok_or(StateError::UnknownWallet(address))?;
        match previous {
            Some(votes) => {
                wallet.set_votes(votes);
            }
            None => {
                wallet.forget_votes();
            }
        }
        revert_sender(tx, wallets, total_cost(tx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::ProducerAttributes;
    use mrd_blockchain_types::{
        Address, PublicKey, ResignationKind, TransactionId, VotePercent, VoteShare,
    };

    fn vote(nonce: u64, shares: &[(&str, u16)]) -> Transaction {
        Transaction {
            id: TransactionId::new([nonce as u8; 32]),
            tx_type: TransactionType::VOTE,
            sender_public_key: PublicKey::new([1u8; 32]),
            recipient: None,
            amount: 0,
            fee: 1,
            burned_fee: 0,
            nonce,
            asset: TransactionAsset::Votes(
                shares
                    .iter()
                    .map(|(username, hundredths)| VoteShare {
                        username: (*username).into(),
                        percent: VotePercent::from_hundredths(*hundredths).unwrap(),
                    })
                    .collect(),
            ),
        }
    }

    fn register(wallets: &mut WalletRepository, username: &str) {
        let address = Address::new(format!("M{username}"));
        wallets
            .find_or_create(&address)
            .set_producer(ProducerAttributes::new(username));
        wallets.index_username(username, &address).unwrap();
    }

    fn funded_sender(wallets: &mut WalletRepository, tx: &Transaction) {
        wallets
            .find_or_create_by_public_key(&tx.sender_public_key)
            .credit(100)
            .unwrap();
    }

    #[test]
    fn test_vote_requires_registered_producer() {
        let mut wallets = WalletRepository::new();
        let tx = vote(1, &[("nobody", 10000)]);
        funded_sender(&mut wallets, &tx);
        assert_eq!(
            VoteHandler.apply(&tx, &mut wallets),
            Err(StateError::UnknownUsername("nobody".into()))
        );
    }

    #[test]
    fn test_vote_rejects_resigned_producer() {
        let mut wallets = WalletRepository::new();
        register(&mut wallets, "alpha");
        wallets
            .get_mut(&Address::new("Malpha"))
            .unwrap()
            .update_producer(|p| {
                p.resignation = Some(ResignationKind::Temporary);
                Ok(())
            })
            .unwrap();
        let tx = vote(1, &[("alpha", 10000)]);
        funded_sender(&mut wallets, &tx);
        assert_eq!(
            VoteHandler.apply(&tx, &mut wallets),
            Err(StateError::VoteForResignedProducer("alpha".into()))
        );
    }

    #[test]
    fn test_revert_restores_previous_distribution() {
        let mut wallets = WalletRepository::new();
        register(&mut wallets, "alpha");
        register(&mut wallets, "bravo");
        let first = vote(1, &[("alpha", 10000)]);
        let second = vote(2, &[("bravo", 6000), ("alpha", 4000)]);
        funded_sender(&mut wallets, &first);

        VoteHandler.apply(&first, &mut wallets).unwrap();
        VoteHandler.apply(&second, &mut wallets).unwrap();

        let address = first.sender_address();
        let current = wallets.get(&address).unwrap().votes().unwrap();
        assert_eq!(current.len(), 2);

        VoteHandler.revert(&second, &mut wallets).unwrap();
        let restored = wallets.get(&address).unwrap().votes().unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.shares()[0].username, "alpha");

        VoteHandler.revert(&first, &mut wallets).unwrap();
        assert!(wallets.get(&address).unwrap().votes().is_none());
        assert_eq!(wallets.get(&address).unwrap().balance(), 100);
    }

    #[test]
    fn test_empty_distribution_cancels_votes() {
        let mut wallets = WalletRepository::new();
        register(&mut wallets, "alpha");
        let declare = vote(1, &[("alpha", 10000)]);
        let cancel = vote(2, &[]);
        funded_sender(&mut wallets, &declare);

        VoteHandler.apply(&declare, &mut wallets).unwrap();
        VoteHandler.apply(&cancel, &mut wallets).unwrap();
        let address = declare.sender_address();
        assert!(!wallets.get(&address).unwrap().has_voted());

        VoteHandler.revert(&cancel, &mut wallets).unwrap();
        assert!(wallets.get(&address).unwrap().has_voted());
    }

    #[test]
    fn test_revert_without_history_fails_untouched() {
        let mut wallets = WalletRepository::new();
        register(&mut wallets, "alpha");
        let tx = vote(1, &[("alpha", 10000)]);
        funded_sender(&mut wallets, &tx);
        // Put the sender at the post-apply nonce without going through
        // apply, so the history stack is empty.
        let address = tx.sender_address();
        wallets.get_mut(&address).unwrap().increment_nonce().unwrap();

        assert_eq!(
            VoteHandler.revert(&tx, &mut wallets),
            Err(StateError::MissingVoteHistory(address.clone()))
        );
        assert_eq!(wallets.get(&address).unwrap().nonce(), 1);
    }
}
