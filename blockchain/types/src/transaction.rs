// Copyright (c) 2023-2025 The Meridian Foundation

//! Transactions, their identifiers, and their typed payloads.

use crate::{
    amount::{Amount, VotePercent},
    error::ConvertError,
    keys::{Address, PublicKey},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};

/// Length in bytes of a transaction identifier.
pub const TRANSACTION_ID_LEN: usize = 32;

/// Identifies a transaction by the hash of its fields.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TransactionId([u8; TRANSACTION_ID_LEN]);

impl TransactionId {
    /// Wrap raw identifier bytes.
    pub const fn new(bytes: [u8; TRANSACTION_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; TRANSACTION_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({self})")
    }
}

impl FromStr for TransactionId {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| ConvertError::InvalidHex)?;
        let bytes: [u8; TRANSACTION_ID_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ConvertError::LengthMismatch(TRANSACTION_ID_LEN, bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for TransactionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The wire discriminant of a transaction family.
///
/// The ledger dispatches on this value through the handler registry and
/// attaches no meaning to it beyond the registered handler.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct TransactionType(pub u16);

impl TransactionType {
    /// Plain balance transfer.
    pub const TRANSFER: Self = Self(0);
    /// Producer registration claiming a username.
    pub const PRODUCER_REGISTRATION: Self = Self(2);
    /// Vote declaration replacing the sender's vote distribution.
    pub const VOTE: Self = Self(3);
    /// Producer resignation, temporary or permanent.
    pub const PRODUCER_RESIGNATION: Self = Self(7);
    /// Timelocked transfer escrowing part of the sender's balance.
    pub const LOCK: Self = Self(8);
    /// Claim of a previously created lock.
    pub const CLAIM: Self = Self(9);
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single vote declaration: a producer username and the share of the
/// sender's balance pledged to it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct VoteShare {
    /// Registered username of the producer receiving the vote.
    pub username: String,
    /// Share of the sender's balance pledged.
    pub percent: VotePercent,
}

/// How a producer steps away from forging.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResignationKind {
    /// The producer intends to return; the registration stays reserved.
    Temporary,
    /// The producer is done; the username can never forge again.
    Permanent,
}

/// Typed payload carried by a transaction.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionAsset {
    /// No payload.
    #[default]
    None,
    /// Username claimed by a producer registration.
    Registration {
        /// The username under which the producer will forge.
        username: String,
    },
    /// Vote declarations, in the order the sender declared them.
    Votes(Vec<VoteShare>),
    /// How the sender resigns its producer registration.
    Resignation {
        /// Temporary or permanent resignation.
        kind: ResignationKind,
    },
    /// Escrow parameters of a lock transaction.
    Lock {
        /// Unix timestamp (seconds) after which the lock expires.
        expiration: u64,
    },
    /// Reference to the lock being claimed.
    Claim {
        /// Id of the lock transaction being claimed.
        lock_id: TransactionId,
    },
}

/// A transaction of the chain.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Transaction {
    /// Hash identifier of this transaction.
    pub id: TransactionId,

    /// Discriminant selecting the handler that applies this transaction.
    pub tx_type: TransactionType,

    /// Public key of the sending wallet.
    pub sender_public_key: PublicKey,

    /// Recipient address, for families that transfer value.
    pub recipient: Option<Address>,

    /// Value transferred to the recipient.
    pub amount: Amount,

    /// Fee paid by the sender.
    pub fee: Amount,

    /// Portion of `fee` that is burned rather than credited to the producer.
    pub burned_fee: Amount,

    /// Sender nonce; must be exactly one above the sender's current nonce.
    pub nonce: u64,

    /// Typed payload of the transaction.
    #[serde(default)]
    pub asset: TransactionAsset,
}

impl Transaction {
    /// The sender's wallet address, derived from the sender key.
    pub fn sender_address(&self) -> Address {
        Address::from_public_key(&self.sender_public_key)
    }
}

/// Compute the hash identifier of a transaction from its fields.
///
/// The stored `id` field does not participate in its own hash.
pub fn compute_transaction_id(tx: &Transaction) -> TransactionId {
    let mut hasher = Sha256::new();
    hasher.update(tx.tx_type.0.to_le_bytes());
    hasher.update(tx.sender_public_key.as_bytes());
    if let Some(recipient) = &tx.recipient {
        hasher.update(recipient.as_str().as_bytes());
    }
    hasher.update(tx.amount.to_le_bytes());
    hasher.update(tx.fee.to_le_bytes());
    hasher.update(tx.burned_fee.to_le_bytes());
    hasher.update(tx.nonce.to_le_bytes());
    match &tx.asset {
        TransactionAsset::None => {}
        TransactionAsset::Registration { username } => hasher.update(username.as_bytes()),
        TransactionAsset::Votes(votes) => {
            for share in votes {
                hasher.update(share.username.as_bytes());
                hasher.update(share.percent.hundredths().to_le_bytes());
            }
        }
        TransactionAsset::Resignation { kind } => {
            hasher.update([matches!(kind, ResignationKind::Permanent) as u8])
        }
        TransactionAsset::Lock { expiration } => hasher.update(expiration.to_le_bytes()),
        TransactionAsset::Claim { lock_id } => hasher.update(lock_id.as_bytes()),
    }
    TransactionId(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::PUBLIC_KEY_LEN;

    fn test_transaction() -> Transaction {
        Transaction {
            id: TransactionId::new([0u8; TRANSACTION_ID_LEN]),
            tx_type: TransactionType::TRANSFER,
            sender_public_key: PublicKey::new([1u8; PUBLIC_KEY_LEN]),
            recipient: Some(Address::new("Mrecipient")),
            amount: 500,
            fee: 10,
            burned_fee: 4,
            nonce: 1,
            asset: TransactionAsset::None,
        }
    }

    #[test]
    fn test_transaction_id_is_deterministic() {
        let tx = test_transaction();
        assert_eq!(compute_transaction_id(&tx), compute_transaction_id(&tx));
    }

    #[test]
    fn test_transaction_id_covers_core_fields() {
        let tx = test_transaction();
        let base = compute_transaction_id(&tx);

        let mut changed = tx.clone();
        changed.nonce = 2;
        assert_ne!(compute_transaction_id(&changed), base);

        let mut changed = tx.clone();
        changed.amount = 501;
        assert_ne!(compute_transaction_id(&changed), base);

        let mut changed = tx;
        changed.asset = TransactionAsset::Votes(vec![VoteShare {
            username: "alpha".into(),
            percent: VotePercent::MAX,
        }]);
        assert_ne!(compute_transaction_id(&changed), base);
    }

    #[test]
    fn test_stored_id_does_not_feed_its_own_hash() {
        let mut tx = test_transaction();
        let base = compute_transaction_id(&tx);
        tx.id = TransactionId::new([9u8; TRANSACTION_ID_LEN]);
        assert_eq!(compute_transaction_id(&tx), base);
    }

    #[test]
    fn test_asset_serde_round_trip() {
        let asset = TransactionAsset::Votes(vec![
            VoteShare {
                username: "alpha".into(),
                percent: VotePercent::from_hundredths(6000).unwrap(),
            },
            VoteShare {
                username: "bravo".into(),
                percent: VotePercent::from_hundredths(4000).unwrap(),
            },
        ]);
        let encoded = serde_json::to_string(&asset).unwrap();
        let decoded: TransactionAsset = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, asset);
    }
}
