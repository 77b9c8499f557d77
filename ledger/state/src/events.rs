// Copyright (c) 2023-2025 The Meridian Foundation

//! Wallet change notifications.
//!
//! Every observable wallet mutation emits exactly one event, synchronously
//! and in mutation order, onto the channel the repository was built with.
//! External indexers drain the receiving side; consensus never reads it.

use crate::wallet::{ProducerAttributes, Votes};
use crossbeam_channel::{unbounded, Receiver, Sender};
use mrd_blockchain_types::{Address, Amount, KeyRole, PublicKey, TransactionId};
use std::fmt;

/// A single observable wallet mutation.
#[derive(Clone, Debug, PartialEq)]
pub struct WalletEvent {
    /// The wallet that changed.
    pub address: Address,
    /// What changed, with old and new values.
    pub change: WalletChange,
}

/// The property that changed on a wallet.
#[derive(Clone, Debug, PartialEq)]
pub enum WalletChange {
    /// Balance moved.
    Balance {
        /// Balance before the mutation.
        old: Amount,
        /// Balance after the mutation.
        new: Amount,
    },
    /// Nonce moved.
    Nonce {
        /// Nonce before the mutation.
        old: u64,
        /// Nonce after the mutation.
        new: u64,
    },
    /// A public key was assigned to a role.
    PublicKeyAssigned {
        /// The role the key fills.
        role: KeyRole,
        /// The assigned key.
        key: PublicKey,
    },
    /// Producer attributes were set, updated, or forgotten.
    Producer {
        /// Attributes before the mutation, `None` when not a producer.
        old: Option<ProducerAttributes>,
        /// Attributes after the mutation, `None` when forgotten.
        new: Option<ProducerAttributes>,
    },
    /// The vote distribution was set, replaced, or forgotten.
    Votes {
        /// Distribution before the mutation.
        old: Option<Votes>,
        /// Distribution after the mutation.
        new: Option<Votes>,
    },
    /// A lock was escrowed on the wallet.
    LockAdded {
        /// Id of the lock transaction.
        id: TransactionId,
        /// Escrowed amount.
        amount: Amount,
    },
    /// A lock left the wallet (claimed or reverted).
    LockRemoved {
        /// Id of the lock transaction.
        id: TransactionId,
        /// Amount released from escrow.
        amount: Amount,
    },
}

/// Sending side of the wallet event stream.
///
/// Cheap to clone; a detached sink swallows events, which is what
/// speculative wallet clones carry.
#[derive(Clone, Default)]
pub struct WalletEventSink {
    sender: Option<Sender<WalletEvent>>,
}

impl WalletEventSink {
    /// A connected sink and the receiver that drains it.
    pub fn channel() -> (Self, Receiver<WalletEvent>) {
        let (sender, receiver) = unbounded();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A sink that drops every event.
    pub fn detached() -> Self {
        Self { sender: None }
    }

    /// True when events reach a receiver.
    pub fn is_connected(&self) -> bool {
        self.sender.is_some()
    }

    pub(crate) fn emit(&self, address: &Address, change: WalletChange) {
        if let Some(sender) = &self.sender {
            // A dropped receiver must never fail the ledger.
            let _ = sender.send(WalletEvent {
                address: address.clone(),
                change,
            });
        }
    }
}

impl fmt::Debug for WalletEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_connected() {
            "WalletEventSink(connected)"
        } else {
            "WalletEventSink(detached)"
        })
    }
}
