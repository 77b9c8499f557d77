// Copyright (c) 2023-2025 The Meridian Foundation

//! Block application engine.
//!
//! Applies or reverts one block against a [`LedgerContext`] as a single
//! logical unit. A failed apply leaves the context exactly as it was
//! before the call. A failed revert triggers a best-effort compensating
//! re-apply of the steps already undone; that path is logged loudly
//! because it cannot guarantee full restoration.

use crate::{
    context::LedgerContext,
    error::{StateError, StateResult},
    handlers::{HandlerRegistry, TransactionHandler},
    repository::WalletRepository,
    vote_balance::update_vote_balances,
    wallet::ProducerAttributes,
};
use mrd_blockchain_types::{Address, Amount, Block, Transaction};
use std::collections::BTreeMap;
use tracing::{error, warn};

/// Username materialized for the genesis block's generator, which has no
/// registration transaction of its own.
pub const GENESIS_PRODUCER_USERNAME: &str = "genesis";

/// What materializing the genesis producer changed, and so what a failed
/// genesis application has to take back out.
#[derive(Clone, Copy)]
enum GenesisFootprint {
    /// The generator was already a producer; nothing to undo.
    None,
    /// An existing wallet was marked and the username indexed.
    Marked,
    /// The generator wallet itself was created.
    Created,
}

/// The ledger application engine.
pub struct BlockState {
    handlers: HandlerRegistry,
}

impl Default for BlockState {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockState {
    /// An engine with the standard transaction handlers.
    pub fn new() -> Self {
        Self {
            handlers: HandlerRegistry::standard(),
        }
    }

    /// An engine with a custom handler set.
    pub fn with_handlers(handlers: HandlerRegistry) -> Self {
        Self { handlers }
    }

    /// Apply `block` to `ctx`.
    ///
    /// Transactions apply in array order, then the producer bookkeeping.
    /// On any failure every transaction applied so far is reverted in
    /// reverse order, a genesis materialization is taken back out, and
    /// the context is left untouched.
    pub fn apply_block(&self, ctx: &mut LedgerContext, block: &Block) -> StateResult<()> {
        let footprint = if block.is_genesis() {
            self.materialize_genesis_producer(ctx, block)?
        } else {
            GenesisFootprint::None
        };

        let mut applied: Vec<&Transaction> = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            match self.apply_transaction(ctx, block.height, tx) {
                Ok(()) => applied.push(tx),
                Err(cause) => {
                    warn!(
                        "Failed to apply transaction {} in block {}: {}",
                        tx.id, block.height, cause
                    );
                    self.unwind(ctx, block.height, &applied);
                    self.unwind_genesis_producer(ctx, block, footprint);
                    return Err(cause);
                }
            }
        }

        if let Err(cause) = self.apply_block_to_producer(ctx, block) {
            warn!(
                "Failed to apply producer bookkeeping for block {}: {}",
                block.height, cause
            );
            self.unwind(ctx, block.height, &applied);
            self.unwind_genesis_producer(ctx, block, footprint);
            return Err(cause);
        }

        ctx.push_block(block.summary());
        Ok(())
    }

    /// Revert `block`, which must be the last applied block.
    ///
    /// Producer bookkeeping is undone first, then transactions in
    /// reverse array order. If a transaction revert fails midway the
    /// engine re-applies what it already undid and propagates the
    /// original error.
    pub fn revert_block(&self, ctx: &mut LedgerContext, block: &Block) -> StateResult<()> {
        match ctx.last_block() {
            Some(last) if last.id == block.id => {}
            _ => {
                return Err(StateError::NotLastBlock {
                    height: block.height,
                })
            }
        }

        self.revert_block_from_producer(ctx, block)?;

        let mut reverted: Vec<&Transaction> = Vec::with_capacity(block.transactions.len());
        for tx in block.transactions.iter().rev() {
            match self.revert_transaction(ctx, block.height, tx) {
                Ok(()) => reverted.push(tx),
                Err(cause) => {
                    error!(
                        "Failed to revert transaction {} in block {}: {}; \
                         re-applying already reverted state",
                        tx.id, block.height, cause
                    );
                    self.compensate(ctx, block, &reverted);
                    return Err(cause);
                }
            }
        }

        ctx.pop_block();
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Transactions
    // ----------------------------------------------------------------------

    fn handler_for(&self, tx: &Transaction, height: u64) -> StateResult<&dyn TransactionHandler> {
        let handler = self
            .handlers
            .get(tx.tx_type)
            .ok_or(StateError::UnknownTransactionType(tx.tx_type))?;
        if !handler.is_activated(height) {
            return Err(StateError::HandlerNotActive {
                tx_type: tx.tx_type,
                height,
            });
        }
        Ok(handler)
    }

    fn apply_transaction(
        &self,
        ctx: &mut LedgerContext,
        height: u64,
        tx: &Transaction,
    ) -> StateResult<()> {
        let handler = self.handler_for(tx, height)?;
        let targets = transaction_targets(handler, tx, &ctx.wallets);
        handler.apply(tx, &mut ctx.wallets)?;
        if let Err(cause) = self.refresh_vote_balances(ctx, &targets) {
            if let Err(undo) = handler.revert(tx, &mut ctx.wallets) {
                error!(
                    "Failed to take transaction {} back out after a vote \
                     balance failure: {}",
                    tx.id, undo
                );
            }
            return Err(cause);
        }
        Ok(())
    }

    fn revert_transaction(
        &self,
        ctx: &mut LedgerContext,
        height: u64,
        tx: &Transaction,
    ) -> StateResult<()> {
        let handler = self.handler_for(tx, height)?;
        let targets = transaction_targets(handler, tx, &ctx.wallets);
        handler.revert(tx, &mut ctx.wallets)?;
        if let Err(cause) = self.refresh_vote_balances(ctx, &targets) {
            if let Err(redo) = handler.apply(tx, &mut ctx.wallets) {
                error!(
                    "Failed to re-apply transaction {} after a vote balance \
                     failure: {}",
                    tx.id, redo
                );
            }
            return Err(cause);
        }
        Ok(())
    }

    /// Revert `applied` (in application order) back to front. Failures
    /// are logged and skipped so as much state as possible is restored.
    fn unwind(&self, ctx: &mut LedgerContext, height: u64, applied: &[&Transaction]) {
        for tx in applied.iter().rev() {
            if let Err(cause) = self.revert_transaction(ctx, height, tx) {
                error!(
                    "Failed to unwind transaction {} in block {}: {}",
                    tx.id, height, cause
                );
            }
        }
    }

    /// Re-apply `reverted` (most recently reverted first) in forward
    /// order, then the producer bookkeeping, restoring the pre-revert
    /// state as far as possible.
    fn compensate(&self, ctx: &mut LedgerContext, block: &Block, reverted: &[&Transaction]) {
        for tx in reverted.iter().rev() {
            if let Err(cause) = self.apply_transaction(ctx, block.height, tx) {
                error!(
                    "Failed to re-apply transaction {} in block {}: {}",
                    tx.id, block.height, cause
                );
            }
        }
        if let Err(cause) = self.apply_block_to_producer(ctx, block) {
            error!(
                "Failed to re-apply producer bookkeeping for block {}: {}",
                block.height, cause
            );
        }
    }

    // ----------------------------------------------------------------------
    // Producer bookkeeping
    // ----------------------------------------------------------------------

    /// What the producer keeps of `block`: the reward net of donations
    /// plus the unburned fees.
    fn producer_credit(block: &Block) -> StateResult<Amount> {
        let fee_share = block
            .total_fee
            .checked_sub(block.burned_fee)
            .ok_or_else(|| StateError::MalformedBlock {
                height: block.height,
                reason: "burned fee exceeds total fee".into(),
            })?;
        let reward_share = block
            .reward
            .checked_sub(block.total_donations())
            .ok_or_else(|| StateError::MalformedBlock {
                height: block.height,
                reason: "donations exceed reward".into(),
            })?;
        reward_share
            .checked_add(fee_share)
            .ok_or_else(|| StateError::BalanceOverflow(block.generator_address()))
    }

    /// Per-address credits the block settles: the producer's share plus
    /// every donation.
    fn block_credits(block: &Block) -> StateResult<BTreeMap<Address, Amount>> {
        let mut credits = BTreeMap::new();
        credits.insert(block.generator_address(), Self::producer_credit(block)?);
        for (address, amount) in &block.donations {
            let slot = credits.entry(address.clone()).or_insert(0);
            *slot = slot
                .checked_add(*amount)
                .ok_or_else(|| StateError::BalanceOverflow(address.clone()))?;
        }
        Ok(credits)
    }

    fn apply_block_to_producer(&self, ctx: &mut LedgerContext, block: &Block) -> StateResult<()> {
        let producer_address = block.generator_address();
        let credits = Self::block_credits(block)?;

        let wallet = ctx
            .wallets
            .find_or_create_by_public_key(&block.generator_public_key);
        if !wallet.is_producer() {
            return Err(StateError::NotAProducer(producer_address));
        }
        for (address, amount) in &credits {
            let balance = ctx.wallets.find_or_create(address).balance();
            if balance.checked_add(*amount).is_none() {
                return Err(StateError::BalanceOverflow(address.clone()));
            }
        }

        let overflow = || StateError::CounterOverflow(producer_address.clone());
        ctx.wallets
            .get_mut(&producer_address)
            .ok_or_else(|| StateError::UnknownWallet(producer_address.clone()))?
            .update_producer(|attributes| {
                attributes.produced_blocks =
                    attributes.produced_blocks.checked_add(1).ok_or_else(overflow)?;
                attributes.forged_fees = attributes
                    .forged_fees
                    .checked_add(block.total_fee)
                    .ok_or_else(overflow)?;
                attributes.burned_fees = attributes
                    .burned_fees
                    .checked_add(block.burned_fee)
                    .ok_or_else(overflow)?;
                attributes.forged_rewards = attributes
                    .forged_rewards
                    .checked_add(block.reward)
                    .ok_or_else(overflow)?;
                attributes.donations = attributes
                    .donations
                    .checked_add(block.total_donations())
                    .ok_or_else(overflow)?;
                attributes.last_produced_block = Some(block.summary());
                Ok(())
            })?;

        let targets: Vec<Address> = credits.keys().cloned().collect();
        for (address, amount) in credits {
            ctx.wallets.find_or_create(&address).credit(amount)?;
        }
        self.refresh_vote_balances(ctx, &targets)
    }

    fn revert_block_from_producer(&self, ctx: &mut LedgerContext, block: &Block) -> StateResult<()> {
        let producer_address = block.generator_address();
        let credits = Self::block_credits(block)?;

        // Validate every debit and counter before committing anything.
        for (address, amount) in &credits {
            let wallet = ctx
                .wallets
                .get(address)
                .ok_or_else(|| StateError::UnknownWallet(address.clone()))?;
            if wallet.balance() < *amount {
                return Err(StateError::NegativeBalance {
                    address: address.clone(),
                    balance: wallet.balance(),
                    debit: *amount,
                });
            }
        }
        {
            let attributes = ctx
                .wallets
                .get(&producer_address)
                .ok_or_else(|| StateError::UnknownWallet(producer_address.clone()))?
                .producer()
                .ok_or_else(|| StateError::NotAProducer(producer_address.clone()))?;
            let covered = attributes.produced_blocks >= 1
                && attributes.forged_fees >= block.total_fee
                && attributes.burned_fees >= block.burned_fee
                && attributes.forged_rewards >= block.reward
                && attributes.donations >= block.total_donations();
            if !covered {
                return Err(StateError::CounterUnderflow(producer_address));
            }
        }

        let targets: Vec<Address> = credits.keys().cloned().collect();
        for (address, amount) in credits {
            ctx.wallets
                .get_mut(&address)
                .ok_or_else(|| StateError::UnknownWallet(address.clone()))?
                .debit(amount)?;
        }
        ctx.wallets
            .get_mut(&producer_address)
            .ok_or_else(|| StateError::UnknownWallet(producer_address.clone()))?
            .update_producer(|attributes| {
                attributes.produced_blocks -= 1;
                attributes.forged_fees -= block.total_fee;
                attributes.burned_fees -= block.burned_fee;
                attributes.forged_rewards -= block.reward;
                attributes.donations -= block.total_donations();
                // The predecessor's summary is not known here; a rebuild
                // repopulates this when it matters.
                attributes.last_produced_block = None;
                Ok(())
            })?;
        self.refresh_vote_balances(ctx, &targets)
    }

    /// Create and mark the genesis block's generator as a producer.
    ///
    /// The fallible username indexing runs before any mutation, so an
    /// error here leaves no trace either. The returned footprint tells
    /// [`Self::unwind_genesis_producer`] what a failed application must
    /// take back out.
    fn materialize_genesis_producer(
        &self,
        ctx: &mut LedgerContext,
        block: &Block,
    ) -> StateResult<GenesisFootprint> {
        let address = block.generator_address();
        let existing = ctx.wallets.get(&address);
        if existing.is_some_and(|wallet| wallet.is_producer()) {
            return Ok(GenesisFootprint::None);
        }
        let existed = existing.is_some();

        ctx.wallets
            .index_username(GENESIS_PRODUCER_USERNAME, &address)?;
        ctx.wallets
            .find_or_create_by_public_key(&block.generator_public_key)
            .set_producer(ProducerAttributes::new(GENESIS_PRODUCER_USERNAME));
        Ok(if existed {
            GenesisFootprint::Marked
        } else {
            GenesisFootprint::Created
        })
    }

    /// Take a materialized genesis producer back out of `ctx` after the
    /// rest of the genesis block failed to apply.
    fn unwind_genesis_producer(
        &self,
        ctx: &mut LedgerContext,
        block: &Block,
        footprint: GenesisFootprint,
    ) {
        let address = block.generator_address();
        match footprint {
            GenesisFootprint::None => {}
            GenesisFootprint::Marked => {
                ctx.wallets.forget_username(GENESIS_PRODUCER_USERNAME);
                if let Some(wallet) = ctx.wallets.get_mut(&address) {
                    wallet.forget_producer();
                }
            }
            GenesisFootprint::Created => {
                ctx.wallets.forget_username(GENESIS_PRODUCER_USERNAME);
                ctx.wallets.remove(&address);
            }
        }
    }

    fn refresh_vote_balances(
        &self,
        ctx: &mut LedgerContext,
        targets: &[Address],
    ) -> StateResult<()> {
        for address in targets {
            update_vote_balances(&mut ctx.wallets, address)?;
        }
        Ok(())
    }
}

/// Sender, recipient, and whatever else the handler names, deduplicated,
/// read against pre-operation state.
fn transaction_targets(
    handler: &dyn TransactionHandler,
    tx: &Transaction,
    wallets: &WalletRepository,
) -> Vec<Address> {
    let mut targets = vec![tx.sender_address()];
    if let Some(recipient) = &tx.recipient {
        if !targets.contains(recipient) {
            targets.push(recipient.clone());
        }
    }
    for address in handler.vote_balance_targets(tx, wallets) {
        if !targets.contains(&address) {
            targets.push(address);
        }
    }
    targets
}
