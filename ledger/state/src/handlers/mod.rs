// Copyright (c) 2023-2025 The Meridian Foundation

//! Per-type transaction handlers.
//!
//! Each handler validates a transaction against current wallet state and
//! then commits it, in that order, so a returned error means the ledger
//! was not touched. `revert` is the exact mathematical inverse of
//! `apply` given the same wallet states; the application engine calls it
//! in reverse transaction order only.

mod claim;
mod lock;
mod registration;
mod resignation;
mod transfer;
mod vote;

pub use claim::ClaimHandler;
pub use lock::LockHandler;
pub use registration::RegistrationHandler;
pub use resignation::ResignationHandler;
pub use transfer::TransferHandler;
pub use vote::VoteHandler;

use crate::{
    error::{StateError, StateResult},
    repository::WalletRepository,
};
use mrd_blockchain_types::{Address, Amount, Transaction, TransactionType};
use std::collections::HashMap;

/// Inputs for pricing a transaction under dynamic fees. The serialized
/// size comes from the caller; this crate defines no wire format.
#[derive(Clone, Copy, Debug)]
pub struct DynamicFeeContext {
    /// Chain height the fee is evaluated at.
    pub height: u64,
    /// Flat per-type byte surcharge from the governing milestone.
    pub addon_bytes: u64,
    /// Price of one byte, in the smallest currency unit.
    pub price_per_byte: Amount,
    /// Serialized transaction size in bytes.
    pub transaction_bytes: u64,
}

/// One transaction type's application logic.
pub trait TransactionHandler: Send + Sync {
    /// The transaction type this handler owns.
    fn tx_type(&self) -> TransactionType;

    /// Whether the type may appear in a block at `height`.
    fn is_activated(&self, _height: u64) -> bool {
        true
    }

    /// The fee this type charges under dynamic fees, priced by
    /// serialized size. Handlers with a different cost model override
    /// this.
    fn dynamic_fee(&self, fee: &DynamicFeeContext) -> Amount {
        let bytes = u128::from(fee.addon_bytes) + u128::from(fee.transaction_bytes);
        Amount::try_from(bytes * u128::from(fee.price_per_byte)).unwrap_or(Amount::MAX)
    }

    /// Validate `tx` against current state, then commit it.
    fn apply(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()>;

    /// Undo a previously applied `tx`.
    fn revert(&self, tx: &Transaction, wallets: &mut WalletRepository) -> StateResult<()>;

    /// Wallets beyond sender and recipient whose vote balances the
    /// operation moves. Called against pre-operation state.
    fn vote_balance_targets(
        &self,
        _tx: &Transaction,
        _wallets: &WalletRepository,
    ) -> Vec<Address> {
        Vec::new()
    }
}

/// The handlers known to the application engine, keyed by type.
pub struct HandlerRegistry {
    handlers: HashMap<TransactionType, Box<dyn TransactionHandler>>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The registry with every standard handler installed.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(TransferHandler);
        registry.register(RegistrationHandler);
        registry.register(VoteHandler);
        registry.register(ResignationHandler);
        registry.register(LockHandler);
        registry.register(ClaimHandler);
        registry
    }

    /// Install `handler` for its type, replacing any previous one.
    pub fn register<H: TransactionHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.tx_type(), Box::new(handler));
    }

    /// The handler for `tx_type`, if one is registered.
    pub fn get(&self, tx_type: TransactionType) -> Option<&dyn TransactionHandler> {
        self.handlers.get(&tx_type).map(Box::as_ref)
    }

    /// The dynamic fee `tx_type` charges at the given pricing inputs.
    pub fn dynamic_fee(
        &self,
        tx_type: TransactionType,
        fee: &DynamicFeeContext,
    ) -> StateResult<Amount> {
        self.get(tx_type)
            .map(|handler| handler.dynamic_fee(fee))
            .ok_or(StateError::UnknownTransactionType(tx_type))
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// `amount + fee`, the full cost the sender pays up front.
pub(crate) fn total_cost(tx: &Transaction) -> StateResult<Amount> {
    tx.amount
        .checked_add(tx.fee)
        .ok_or_else(|| StateError::BalanceOverflow(tx.sender_address()))
}

/// Check, without mutating, that the sender's nonce matches `tx.nonce`.
///
/// Reverts call this before undoing any third-party effect, so that a
/// mismatched transaction is rejected while state is still untouched.
pub(crate) fn ensure_sender_nonce(
    tx: &Transaction,
    wallets: &WalletRepository,
) -> StateResult<()> {
    let address = tx.sender_address();
    let sender = wallets
        .get(&address)
        .ok_or_else(|| StateError::UnknownWallet(address.clone()))?;
    if sender.nonce() != tx.nonce {
        return Err(StateError::NonceOutOfSequence {
            address,
            expected: tx.nonce,
            actual: sender.nonce(),
        });
    }
    Ok(())
}

/// The sender-side half of every apply: nonce check, funds check, then
/// nonce bump and debit. Nothing is committed unless both checks pass.
pub(crate) fn apply_sender(
    tx: &Transaction,
    wallets: &mut WalletRepository,
    debit: Amount,
) -> StateResult<()> {
    let sender = wallets.find_or_create_by_public_key(&tx.sender_public_key);
    let expected = sender
        .nonce()
        .checked_add(1)
        .ok_or_else(|| StateError::CounterOverflow(sender.address().clone()))?;
    if tx.nonce != expected {
        return Err(StateError::NonceOutOfSequence {
            address: sender.address().clone(),
            expected,
            actual: tx.nonce,
        });
    }
    if sender.balance() < debit {
        return Err(StateError::NegativeBalance {
            address: sender.address().clone(),
            balance: sender.balance(),
            debit,
        });
    }
    sender.increment_nonce()?;
    sender.debit(debit)?;
    Ok(())
}

/// The sender-side half of every revert: nonce check, then refund and
/// nonce step-back.
pub(crate) fn revert_sender(
    tx: &Transaction,
    wallets: &mut WalletRepository,
    credit: Amount,
) -> StateResult<()> {
    ensure_sender_nonce(tx, wallets)?;
    let address = tx.sender_address();
    let sender = wallets
        .get_mut(&address)
        .ok_or(StateError::UnknownWallet(address))?;
    sender.credit(credit)?;
    sender.decrement_nonce()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrd_blockchain_types::{PublicKey, TransactionAsset};

    fn transaction(nonce: u64, amount: Amount, fee: Amount) -> Transaction {
        Transaction {
            id: mrd_blockchain_types::TransactionId::new([9u8; 32]),
            tx_type: TransactionType::TRANSFER,
            sender_public_key: PublicKey::new([1u8; 32]),
            recipient: None,
            amount,
            fee,
            burned_fee: 0,
            nonce,
            asset: TransactionAsset::None,
        }
    }

    #[test]
    fn test_apply_sender_rejects_out_of_sequence_nonce() {
        let mut wallets = WalletRepository::new();
        let tx = transaction(2, 0, 1);
        assert!(matches!(
            apply_sender(&tx, &mut wallets, 1),
            Err(StateError::NonceOutOfSequence {
                expected: 1,
                actual: 2,
                ..
            })
        ));
        // The rejected transaction must not have created sender state
        // beyond the empty wallet.
        let sender = wallets.get(&tx.sender_address()).unwrap();
        assert_eq!(sender.nonce(), 0);
        assert_eq!(sender.balance(), 0);
    }

    #[test]
    fn test_apply_sender_rejects_insufficient_funds_before_commit() {
        let mut wallets = WalletRepository::new();
        let tx = transaction(1, 5, 1);
        wallets
            .find_or_create_by_public_key(&tx.sender_public_key)
            .credit(5)
            .unwrap();
        assert!(matches!(
            apply_sender(&tx, &mut wallets, 6),
            Err(StateError::NegativeBalance { balance: 5, debit: 6, .. })
        ));
        let sender = wallets.get(&tx.sender_address()).unwrap();
        assert_eq!(sender.nonce(), 0);
        assert_eq!(sender.balance(), 5);
    }

    #[test]
    fn test_sender_apply_then_revert_is_identity() {
        let mut wallets = WalletRepository::new();
        let tx = transaction(1, 5, 1);
        wallets
            .find_or_create_by_public_key(&tx.sender_public_key)
            .credit(10)
            .unwrap();

        apply_sender(&tx, &mut wallets, 6).unwrap();
        let sender = wallets.get(&tx.sender_address()).unwrap();
        assert_eq!(sender.balance(), 4);
        assert_eq!(sender.nonce(), 1);

        revert_sender(&tx, &mut wallets, 6).unwrap();
        let sender = wallets.get(&tx.sender_address()).unwrap();
        assert_eq!(sender.balance(), 10);
        assert_eq!(sender.nonce(), 0);
    }

    #[test]
    fn test_registry_routes_by_type() {
        let registry = HandlerRegistry::standard();
        assert!(registry.get(TransactionType::TRANSFER).is_some());
        assert!(registry.get(TransactionType::VOTE).is_some());
        assert!(registry.get(TransactionType::CLAIM).is_some());
        assert!(registry.get(TransactionType(255)).is_none());
    }

    #[test]
    fn test_dynamic_fee_prices_by_size() {
        let registry = HandlerRegistry::standard();
        let fee = DynamicFeeContext {
            height: 10,
            addon_bytes: 100,
            price_per_byte: 3,
            transaction_bytes: 150,
        };
        assert_eq!(
            registry
                .dynamic_fee(TransactionType::TRANSFER, &fee)
                .unwrap(),
            750
        );
        assert!(matches!(
            registry.dynamic_fee(TransactionType(255), &fee),
            Err(StateError::UnknownTransactionType(TransactionType(255)))
        ));
    }
}
