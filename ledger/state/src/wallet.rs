// Copyright (c) 2023-2025 The Meridian Foundation

//! The wallet: one account's balance, keys, and typed attributes.

use crate::{
    error::{StateError, StateResult},
    events::{WalletChange, WalletEventSink},
};
use mrd_blockchain_types::{
    Address, Amount, BlockSummary, KeyRole, PublicKey, ResignationKind, TransactionId, VotePercent,
    VoteShare,
};
use std::collections::BTreeMap;

/// Consensus attributes of a registered block producer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProducerAttributes {
    /// Username the producer forges under.
    pub username: String,
    /// Number of blocks this producer has forged.
    pub produced_blocks: u64,
    /// Total fees earned across all forged blocks.
    pub forged_fees: Amount,
    /// Total fees burned out of forged blocks.
    pub burned_fees: Amount,
    /// Total rewards minted across all forged blocks.
    pub forged_rewards: Amount,
    /// Total reward share donated out of forged blocks.
    pub donations: Amount,
    /// Aggregate vote-weighted balance pledged by voters.
    pub vote_balance: Amount,
    /// Number of distinct wallets currently voting for this producer.
    pub voters: u64,
    /// 1-based position in the current ranking; `None` when unranked.
    pub rank: Option<u32>,
    /// Set when the producer stepped away from forging.
    pub resignation: Option<ResignationKind>,
    /// The most recent block this producer forged.
    pub last_produced_block: Option<BlockSummary>,
}

impl ProducerAttributes {
    /// Fresh attributes for a newly registered username.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            produced_blocks: 0,
            forged_fees: 0,
            burned_fees: 0,
            forged_rewards: 0,
            donations: 0,
            vote_balance: 0,
            voters: 0,
            rank: None,
            resignation: None,
            last_produced_block: None,
        }
    }

    /// True when the producer resigned, temporarily or permanently.
    pub fn is_resigned(&self) -> bool {
        self.resignation.is_some()
    }
}

/// A validated vote distribution: producer usernames with pledged shares,
/// in declaration order.
///
/// Declaration order is load-bearing: the vote-weighted balance calculator
/// hands out rounding remainders in exactly this order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Votes {
    shares: Vec<VoteShare>,
}

impl Votes {
    /// Validate and wrap vote declarations.
    ///
    /// Rejects distributions totalling over 100% and duplicate usernames.
    /// The total goes through [`VotePercent::checked_total`], which stops
    /// at the first share past the cap, so the length of the declaration
    /// list never feeds an unchecked sum.
    pub fn new(shares: Vec<VoteShare>) -> StateResult<Self> {
        VotePercent::checked_total(shares.iter().map(|share| share.percent)).ok_or_else(|| {
            let total = shares.iter().fold(0u32, |total, share| {
                total.saturating_add(u32::from(share.percent.hundredths()))
            });
            StateError::VotesExceedMax(total)
        })?;
        for (i, share) in shares.iter().enumerate() {
            if shares[..i].iter().any(|s| s.username == share.username) {
                return Err(StateError::DuplicateVote(share.username.clone()));
            }
        }
        Ok(Self { shares })
    }

    /// The declarations, in declaration order.
    pub fn shares(&self) -> &[VoteShare] {
        &self.shares
    }

    /// Iterate the declarations in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &VoteShare> {
        self.shares.iter()
    }

    /// Number of producers voted for.
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    /// True when no producer is voted for.
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}

/// Funds escrowed by a lock transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Lock {
    /// Escrowed amount.
    pub amount: Amount,
    /// Address the funds go to when the lock is claimed.
    pub recipient: Address,
    /// Unix timestamp (seconds) after which the lock expires.
    pub expiration: u64,
}

/// One account of the ledger: address, keys, balance, nonce, and the
/// typed attribute set (producer, votes, locks).
///
/// Mutations go through the methods below so that change notifications
/// fire exactly once per observable change. `clone()` produces a fully
/// independent speculative copy that is detached from the event sink.
#[derive(Debug)]
pub struct Wallet {
    address: Address,
    public_keys: BTreeMap<KeyRole, PublicKey>,
    balance: Amount,
    nonce: u64,
    producer: Option<ProducerAttributes>,
    votes: Option<Votes>,
    locks: BTreeMap<TransactionId, Lock>,
    vote_balances: BTreeMap<String, Amount>,
    events: WalletEventSink,
}

impl Wallet {
    /// A fresh wallet with zero balance and no attributes.
    pub fn new(address: Address, events: WalletEventSink) -> Self {
        Self {
            address,
            public_keys: BTreeMap::new(),
            balance: 0,
            nonce: 0,
            producer: None,
            votes: None,
            locks: BTreeMap::new(),
            vote_balances: BTreeMap::new(),
            events,
        }
    }

    /// The wallet's address. Immutable for the wallet's lifetime.
    pub fn address(&self) -> &Address {
        &self.address
    }

    // ----------------------------------------------------------------------
    // Keys
    // ----------------------------------------------------------------------

    /// The key registered for `role`, if any.
    pub fn public_key(&self, role: KeyRole) -> Option<&PublicKey> {
        self.public_keys.get(&role)
    }

    /// Register `key` for `role` unless one is already registered.
    ///
    /// Returns whether the wallet changed.
    pub fn ensure_public_key(&mut self, role: KeyRole, key: PublicKey) -> bool {
        if self.public_keys.contains_key(&role) {
            return false;
        }
        self.public_keys.insert(role, key);
        self.events
            .emit(&self.address, WalletChange::PublicKeyAssigned { role, key });
        true
    }

    // ----------------------------------------------------------------------
    // Balance and nonce
    // ----------------------------------------------------------------------

    /// The spendable balance.
    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Overwrite the balance. Returns whether the wallet changed.
    pub fn set_balance(&mut self, balance: Amount) -> bool {
        let old = self.balance;
        if old == balance {
            return false;
        }
        self.balance = balance;
        self.events
            .emit(&self.address, WalletChange::Balance { old, new: balance });
        true
    }

    /// Add `amount` to the balance.
    pub fn credit(&mut self, amount: Amount) -> StateResult<()> {
        let old = self.balance;
        self.balance = old
            .checked_add(amount)
            .ok_or_else(|| StateError::BalanceOverflow(self.address.clone()))?;
        if amount > 0 {
            self.events.emit(
                &self.address,
                WalletChange::Balance {
                    old,
                    new: self.balance,
                },
            );
        }
        Ok(())
    }

    /// Remove `amount` from the balance. Balances never go negative.
    pub fn debit(&mut self, amount: Amount) -> StateResult<()> {
        let old = self.balance;
        self.balance = old
            .checked_sub(amount)
            .ok_or_else(|| StateError::NegativeBalance {
                address: self.address.clone(),
                balance: old,
                debit: amount,
            })?;
        if amount > 0 {
            self.events.emit(
                &self.address,
                WalletChange::Balance {
                    old,
                    new: self.balance,
                },
            );
        }
        Ok(())
    }

    /// The number of transactions this wallet has sent.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Overwrite the nonce. Returns whether the wallet changed.
    pub fn set_nonce(&mut self, nonce: u64) -> bool {
        let old = self.nonce;
        if old == nonce {
            return false;
        }
        self.nonce = nonce;
        self.events
            .emit(&self.address, WalletChange::Nonce { old, new: nonce });
        true
    }

    /// Step the nonce forward after a sent transaction.
    pub fn increment_nonce(&mut self) -> StateResult<()> {
        let old = self.nonce;
        self.nonce = old
            .checked_add(1)
            .ok_or_else(|| StateError::CounterOverflow(self.address.clone()))?;
        self.events.emit(
            &self.address,
            WalletChange::Nonce {
                old,
                new: self.nonce,
            },
        );
        Ok(())
    }

    /// Step the nonce back when a sent transaction is reverted.
    pub fn decrement_nonce(&mut self) -> StateResult<()> {
        let old = self.nonce;
        self.nonce = old
            .checked_sub(1)
            .ok_or_else(|| StateError::NonceUnderflow(self.address.clone()))?;
        self.events.emit(
            &self.address,
            WalletChange::Nonce {
                old,
                new: self.nonce,
            },
        );
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Producer attribute
    // ----------------------------------------------------------------------

    /// The producer attributes, if this wallet registered a username.
    pub fn producer(&self) -> Option<&ProducerAttributes> {
        self.producer.as_ref()
    }

    /// True when this wallet registered as a producer.
    pub fn is_producer(&self) -> bool {
        self.producer.is_some()
    }

    /// The registered username, if any.
    pub fn username(&self) -> Option<&str> {
        self.producer.as_ref().map(|p| p.username.as_str())
    }

    /// True when this wallet is a producer that resigned.
    pub fn is_resigned(&self) -> bool {
        self.producer.as_ref().is_some_and(|p| p.is_resigned())
    }

    /// Install producer attributes. Returns whether the wallet changed.
    pub fn set_producer(&mut self, attributes: ProducerAttributes) -> bool {
        if self.producer.as_ref() == Some(&attributes) {
            return false;
        }
        let old = self.producer.replace(attributes.clone());
        self.events.emit(
            &self.address,
            WalletChange::Producer {
                old,
                new: Some(attributes),
            },
        );
        true
    }

    /// Mutate the producer attributes atomically.
    ///
    /// The closure runs against a working copy; the wallet only changes,
    /// and an event only fires, when the closure succeeds and actually
    /// changed something.
    pub fn update_producer<F>(&mut self, update: F) -> StateResult<()>
    where
        F: FnOnce(&mut ProducerAttributes) -> StateResult<()>,
    {
        let old = self
            .producer
            .clone()
            .ok_or_else(|| StateError::NotAProducer(self.address.clone()))?;
        let mut new = old.clone();
        update(&mut new)?;
        if new != old {
            self.producer = Some(new.clone());
            self.events.emit(
                &self.address,
                WalletChange::Producer {
                    old: Some(old),
                    new: Some(new),
                },
            );
        }
        Ok(())
    }

    /// Drop the producer attributes. Returns whether the wallet changed.
    pub fn forget_producer(&mut self) -> bool {
        match self.producer.take() {
            Some(old) => {
                self.events.emit(
                    &self.address,
                    WalletChange::Producer {
                        old: Some(old),
                        new: None,
                    },
                );
                true
            }
            None => false,
        }
    }

    // ----------------------------------------------------------------------
    // Votes attribute
    // ----------------------------------------------------------------------

    /// The current vote distribution, if any.
    pub fn votes(&self) -> Option<&Votes> {
        self.votes.as_ref()
    }

    /// True when this wallet votes for at least one producer.
    pub fn has_voted(&self) -> bool {
        self.votes.as_ref().is_some_and(|v| !v.is_empty())
    }

    /// Replace the vote distribution. Returns whether the wallet changed.
    pub fn set_votes(&mut self, votes: Votes) -> bool {
        if self.votes.as_ref() == Some(&votes) {
            return false;
        }
        let old = self.votes.replace(votes.clone());
        self.events.emit(
            &self.address,
            WalletChange::Votes {
                old,
                new: Some(votes),
            },
        );
        true
    }

    /// Drop the vote distribution. Returns whether the wallet changed.
    pub fn forget_votes(&mut self) -> bool {
        match self.votes.take() {
            Some(old) => {
                self.events.emit(
                    &self.address,
                    WalletChange::Votes {
                        old: Some(old),
                        new: None,
                    },
                );
                true
            }
            None => false,
        }
    }

    // ----------------------------------------------------------------------
    // Locks attribute
    // ----------------------------------------------------------------------

    /// All open locks escrowed by this wallet.
    pub fn locks(&self) -> &BTreeMap<TransactionId, Lock> {
        &self.locks
    }

    /// Escrow a lock under the id of its lock transaction.
    pub fn add_lock(&mut self, id: TransactionId, lock: Lock) -> StateResult<()> {
        if self.locks.contains_key(&id) {
            return Err(StateError::DuplicateLock(id));
        }
        let amount = lock.amount;
        self.locks.insert(id, lock);
        self.events
            .emit(&self.address, WalletChange::LockAdded { id, amount });
        Ok(())
    }

    /// Release the lock with `id`, returning it.
    pub fn remove_lock(&mut self, id: &TransactionId) -> StateResult<Lock> {
        let lock = self
            .locks
            .remove(id)
            .ok_or(StateError::UnknownLock(*id))?;
        self.events.emit(
            &self.address,
            WalletChange::LockRemoved {
                id: *id,
                amount: lock.amount,
            },
        );
        Ok(lock)
    }

    /// Total amount currently escrowed in open locks.
    pub fn locked_balance(&self) -> Amount {
        self.locks.values().map(|l| l.amount).sum()
    }

    // ----------------------------------------------------------------------
    // Derived vote-weighted balances
    // ----------------------------------------------------------------------

    /// The wallet's vote-weighted balance split, by producer username.
    ///
    /// Derived data, maintained by the vote balance calculator; always
    /// sums to `balance + locked_balance` while votes are declared.
    pub fn vote_balances(&self) -> &BTreeMap<String, Amount> {
        &self.vote_balances
    }

    pub(crate) fn set_vote_balances(&mut self, balances: BTreeMap<String, Amount>) {
        self.vote_balances = balances;
    }
}

impl Clone for Wallet {
    /// A speculative working copy: full state, detached event sink.
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            public_keys: self.public_keys.clone(),
            balance: self.balance,
            nonce: self.nonce,
            producer: self.producer.clone(),
            votes: self.votes.clone(),
            locks: self.locks.clone(),
            vote_balances: self.vote_balances.clone(),
            events: WalletEventSink::detached(),
        }
    }
}

impl PartialEq for Wallet {
    /// State equality; the event sink does not participate.
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.public_keys == other.public_keys
            && self.balance == other.balance
            && self.nonce == other.nonce
            && self.producer == other.producer
            && self.votes == other.votes
            && self.locks == other.locks
            && self.vote_balances == other.vote_balances
    }
}

impl Eq for Wallet {}
