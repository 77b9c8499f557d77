// Copyright (c) 2023-2025 The Meridian Foundation

//! In-memory wallet set with the secondary indexes the transaction
//! handlers need: username to address, open lock to owner, and the
//! per-wallet vote history that makes vote reverts exact.

use crate::{
    error::{StateError, StateResult},
    events::{WalletEvent, WalletEventSink},
    wallet::{Lock, Votes, Wallet},
};
use crossbeam_channel::Receiver;
use mrd_blockchain_types::{Address, KeyRole, PublicKey, TransactionId};
use std::collections::HashMap;

/// All wallets known to the ledger, with lookup indexes.
///
/// The indexes are maintained by the transaction handlers, not derived
/// lazily: a username points at its owner from the moment the
/// registration applies until the moment it reverts.
#[derive(Debug, Default)]
pub struct WalletRepository {
    wallets: HashMap<Address, Wallet>,
    usernames: HashMap<String, Address>,
    locks: HashMap<TransactionId, Address>,
    vote_history: HashMap<Address, Vec<Option<Votes>>>,
    claimed_locks: HashMap<TransactionId, (Address, Lock)>,
    events: WalletEventSink,
}

impl WalletRepository {
    /// An empty repository that emits no change notifications.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty repository wired to a change notification channel.
    pub fn with_events() -> (Self, Receiver<WalletEvent>) {
        let (events, receiver) = WalletEventSink::channel();
        let repository = Self {
            events,
            ..Self::default()
        };
        (repository, receiver)
    }

    /// Number of wallets the repository holds.
    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    /// True when no wallet has been created yet.
    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Drop every wallet and index ahead of a full rebuild. The change
    /// notification channel stays attached.
    pub fn clear(&mut self) {
        self.wallets.clear();
        self.usernames.clear();
        self.locks.clear();
        self.vote_history.clear();
        self.claimed_locks.clear();
    }

    // ----------------------------------------------------------------------
    // Wallet lookup
    // ----------------------------------------------------------------------

    /// The wallet at `address`, creating an empty one on first touch.
    pub fn find_or_create(&mut self, address: &Address) -> &mut Wallet {
        self.wallets
            .entry(address.clone())
            .or_insert_with(|| Wallet::new(address.clone(), self.events.clone()))
    }

    /// The wallet owning `key`, creating it (and registering the key as
    /// the primary) on first touch.
    pub fn find_or_create_by_public_key(&mut self, key: &PublicKey) -> &mut Wallet {
        let address = Address::from_public_key(key);
        let wallet = self.find_or_create(&address);
        wallet.ensure_public_key(KeyRole::Primary, *key);
        wallet
    }

    /// True when a wallet exists at `address`.
    pub fn contains(&self, address: &Address) -> bool {
        self.wallets.contains_key(address)
    }

    /// The wallet owning `key`, if it has been created.
    pub fn find_by_public_key(&self, key: &PublicKey) -> Option<&Wallet> {
        self.wallets.get(&Address::from_public_key(key))
    }

    /// The wallet at `address`, if it exists.
    pub fn get(&self, address: &Address) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    /// Mutable access to the wallet at `address`, if it exists.
    pub fn get_mut(&mut self, address: &Address) -> Option<&mut Wallet> {
        self.wallets.get_mut(address)
    }

    /// Take the wallet at `address` back out of the set.
    ///
    /// The block engine uses this to discard a wallet it created inside
    /// an application that then failed. Indexes pointing at the wallet
    /// are the caller's to unwind first.
    pub(crate) fn remove(&mut self, address: &Address) -> Option<Wallet> {
        self.wallets.remove(address)
    }

    /// Iterate all wallets in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values()
    }

    /// Iterate every wallet with producer attributes.
    pub fn producers(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values().filter(|w| w.is_producer())
    }

    /// Addresses of every registered producer, resigned ones included.
    pub fn producer_addresses(&self) -> Vec<Address> {
        self.producers().map(|w| w.address().clone()).collect()
    }

    /// Zero every producer's vote aggregates and drop every wallet's
    /// cached split, ahead of a full rebuild.
    pub fn reset_vote_aggregates(&mut self) -> StateResult<()> {
        for wallet in self.wallets.values_mut() {
            wallet.set_vote_balances(Default::default());
            if wallet.is_producer() {
                wallet.update_producer(|attributes| {
                    attributes.vote_balance = 0;
                    attributes.voters = 0;
                    Ok(())
                })?;
            }
        }
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Username index
    // ----------------------------------------------------------------------

    /// The address registered under `username`, if any.
    pub fn address_by_username(&self, username: &str) -> Option<&Address> {
        self.usernames.get(username)
    }

    /// The wallet registered under `username`, if any.
    pub fn find_by_username(&self, username: &str) -> Option<&Wallet> {
        self.usernames
            .get(username)
            .and_then(|address| self.wallets.get(address))
    }

    /// Point `username` at `address`. Fails when the name is taken.
    pub fn index_username(&mut self, username: &str, address: &Address) -> StateResult<()> {
        if let Some(owner) = self.usernames.get(username) {
            if owner != address {
                return Err(StateError::UsernameTaken(username.to_owned()));
            }
            return Ok(());
        }
        self.usernames.insert(username.to_owned(), address.clone());
        Ok(())
    }

    /// Drop `username` from the index.
    pub fn forget_username(&mut self, username: &str) {
        self.usernames.remove(username);
    }

    // ----------------------------------------------------------------------
    // Lock index
    // ----------------------------------------------------------------------

    /// The address that escrowed the lock `id`, if the lock is open.
    pub fn lock_owner(&self, id: &TransactionId) -> Option<&Address> {
        self.locks.get(id)
    }

    /// Point the open lock `id` at its owner.
    pub fn index_lock(&mut self, id: TransactionId, owner: &Address) -> StateResult<()> {
        if self.locks.contains_key(&id) {
            return Err(StateError::DuplicateLock(id));
        }
        self.locks.insert(id, owner.clone());
        Ok(())
    }

    /// Drop the open lock `id` from the index.
    pub fn forget_lock(&mut self, id: &TransactionId) {
        self.locks.remove(id);
    }

    /// Stash a claimed lock so a later revert can restore it verbatim.
    pub(crate) fn stash_claimed_lock(&mut self, id: TransactionId, owner: Address, lock: Lock) {
        self.claimed_locks.insert(id, (owner, lock));
    }

    /// Take a claimed lock back out of the stash.
    pub(crate) fn unstash_claimed_lock(
        &mut self,
        id: &TransactionId,
    ) -> StateResult<(Address, Lock)> {
        self.claimed_locks
            .remove(id)
            .ok_or(StateError::UnknownLock(*id))
    }

    /// The stashed claim for `id`, if the lock was claimed.
    pub(crate) fn claimed_lock(&self, id: &TransactionId) -> Option<&(Address, Lock)> {
        self.claimed_locks.get(id)
    }

    // ----------------------------------------------------------------------
    // Vote history
    // ----------------------------------------------------------------------

    /// Record the votes `address` held before a vote transaction applied.
    pub(crate) fn push_vote_history(&mut self, address: &Address, previous: Option<Votes>) {
        self.vote_history
            .entry(address.clone())
            .or_default()
            .push(previous);
    }

    /// Restore the most recently recorded votes for `address`.
    pub(crate) fn pop_vote_history(&mut self, address: &Address) -> StateResult<Option<Votes>> {
        let history = self
            .vote_history
            .get_mut(address)
            .ok_or_else(|| StateError::MissingVoteHistory(address.clone()))?;
        let previous = history
            .pop()
            .ok_or_else(|| StateError::MissingVoteHistory(address.clone()))?;
        if history.is_empty() {
            self.vote_history.remove(address);
        }
        Ok(previous)
    }
}
