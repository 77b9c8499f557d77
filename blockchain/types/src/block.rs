// Copyright (c) 2023-2025 The Meridian Foundation

//! Blocks and block identifiers.

use crate::{
    amount::Amount,
    error::ConvertError,
    keys::{Address, PublicKey},
    transaction::Transaction,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Length in bytes of a block identifier.
pub const BLOCK_ID_LEN: usize = 32;

/// Identifies a block by the hash of its header fields.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BlockId([u8; BLOCK_ID_LEN]);

impl BlockId {
    /// Wrap raw identifier bytes.
    pub const fn new(bytes: [u8; BLOCK_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; BLOCK_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({self})")
    }
}

impl FromStr for BlockId {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| ConvertError::InvalidHex)?;
        let bytes: [u8; BLOCK_ID_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ConvertError::LengthMismatch(BLOCK_ID_LEN, bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for BlockId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for BlockId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A block of the chain.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Block {
    /// Position of the block in the chain; genesis is height 1.
    pub height: u64,

    /// Hash identifier of this block.
    pub id: BlockId,

    /// Identifier of the parent block. `None` only for genesis.
    pub previous_id: Option<BlockId>,

    /// Public key of the producer that forged this block.
    pub generator_public_key: PublicKey,

    /// Unix timestamp (seconds) at which the block was forged.
    pub timestamp: u64,

    /// Producer reward minted by this block.
    pub reward: Amount,

    /// Sum of the fees of all transactions in the block.
    pub total_fee: Amount,

    /// Portion of `total_fee` that is burned rather than credited.
    pub burned_fee: Amount,

    /// Protocol-level donations paid out of the reward, by recipient.
    #[serde(default)]
    pub donations: BTreeMap<Address, Amount>,

    /// Transactions applied by this block, in application order.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Sum of all donation outputs of this block.
    pub fn total_donations(&self) -> Amount {
        self.donations.values().sum()
    }

    /// True when this is the first block of the chain.
    pub fn is_genesis(&self) -> bool {
        self.height == 1
    }

    /// The wallet address of the producer that forged this block.
    pub fn generator_address(&self) -> Address {
        Address::from_public_key(&self.generator_public_key)
    }

    /// The id, height, and timestamp of this block, for bookkeeping.
    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            id: self.id,
            height: self.height,
            timestamp: self.timestamp,
        }
    }
}

/// Compute the hash identifier of a block from its header fields.
///
/// The stored `id` field does not participate in its own hash; transactions
/// contribute through their ids.
pub fn compute_block_id(block: &Block) -> BlockId {
    let mut hasher = Sha256::new();
    hasher.update(block.height.to_le_bytes());
    match &block.previous_id {
        Some(id) => hasher.update(id.as_bytes()),
        None => hasher.update([0u8; BLOCK_ID_LEN]),
    }
    hasher.update(block.generator_public_key.as_bytes());
    hasher.update(block.timestamp.to_le_bytes());
    hasher.update(block.reward.to_le_bytes());
    hasher.update(block.total_fee.to_le_bytes());
    hasher.update(block.burned_fee.to_le_bytes());
    for (address, amount) in &block.donations {
        hasher.update(address.as_str().as_bytes());
        hasher.update(amount.to_le_bytes());
    }
    for tx in &block.transactions {
        hasher.update(tx.id.as_bytes());
    }
    BlockId(hasher.finalize().into())
}

/// The id, height, and timestamp of a block, kept where the full block is
/// not needed.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BlockSummary {
    /// Hash identifier of the block.
    pub id: BlockId,
    /// Height of the block.
    pub height: u64,
    /// Unix timestamp (seconds) of the block.
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::PUBLIC_KEY_LEN;

    fn test_block(height: u64) -> Block {
        Block {
            height,
            id: BlockId::new([0u8; BLOCK_ID_LEN]),
            previous_id: (height > 1).then(|| BlockId::new([3u8; BLOCK_ID_LEN])),
            generator_public_key: PublicKey::new([5u8; PUBLIC_KEY_LEN]),
            timestamp: 1_700_000_000,
            reward: 200,
            total_fee: 30,
            burned_fee: 12,
            donations: BTreeMap::new(),
            transactions: Vec::new(),
        }
    }

    #[test]
    fn test_block_id_is_deterministic() {
        let block = test_block(10);
        assert_eq!(compute_block_id(&block), compute_block_id(&block));
    }

    #[test]
    fn test_block_id_covers_header_fields() {
        let block = test_block(10);
        let base = compute_block_id(&block);

        let mut changed = block.clone();
        changed.height = 11;
        assert_ne!(compute_block_id(&changed), base);

        let mut changed = block.clone();
        changed.previous_id = Some(BlockId::new([9u8; BLOCK_ID_LEN]));
        assert_ne!(compute_block_id(&changed), base);

        let mut changed = block.clone();
        changed.donations.insert(Address::new("Mfund"), 7);
        assert_ne!(compute_block_id(&changed), base);
    }

    #[test]
    fn test_stored_id_does_not_feed_its_own_hash() {
        let mut block = test_block(10);
        let base = compute_block_id(&block);
        block.id = BlockId::new([8u8; BLOCK_ID_LEN]);
        assert_eq!(compute_block_id(&block), base);
    }

    #[test]
    fn test_total_donations() {
        let mut block = test_block(4);
        block.donations.insert(Address::new("Ma"), 10);
        block.donations.insert(Address::new("Mb"), 15);
        assert_eq!(block.total_donations(), 25);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut block = test_block(2);
        block.donations.insert(Address::new("Mfund"), 20);
        let encoded = serde_json::to_string(&block).unwrap();
        let decoded: Block = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_genesis_has_no_parent() {
        let genesis = test_block(1);
        assert!(genesis.is_genesis());
        assert!(genesis.previous_id.is_none());
    }
}
