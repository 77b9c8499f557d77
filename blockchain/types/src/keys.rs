// Copyright (c) 2023-2025 The Meridian Foundation

//! Public keys, wallet addresses, and key roles.

use crate::error::ConvertError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};

/// Length in bytes of a wallet or producer public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// An opaque public key.
///
/// The ledger core only compares, orders, and displays keys; signature
/// verification happens upstream of state transition.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Wrap raw key bytes.
    pub const fn new(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl FromStr for PublicKey {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| ConvertError::InvalidHex)?;
        let bytes: [u8; PUBLIC_KEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ConvertError::LengthMismatch(PUBLIC_KEY_LEN, bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The role a public key plays on a wallet.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRole {
    /// The key that signs ordinary transactions.
    Primary,
    /// An additional signing key registered on the wallet.
    SecondPrimary,
    /// The aggregate key of a multisignature registration.
    MultiSignature,
}

/// An opaque wallet identity string, immutable once created.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Prefix character of every rendered Meridian address.
    pub const PREFIX: char = 'M';

    /// Wrap an identity string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Derive the address that corresponds to a public key.
    pub fn from_public_key(key: &PublicKey) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        let mut out = String::with_capacity(41);
        out.push(Self::PREFIX);
        out.push_str(&hex::encode(&digest[..20]));
        Self(out)
    }

    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&PublicKey> for Address {
    fn from(key: &PublicKey) -> Self {
        Self::from_public_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_hex_round_trip() {
        let key = PublicKey::new([7u8; PUBLIC_KEY_LEN]);
        let parsed: PublicKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_public_key_rejects_bad_hex() {
        assert_eq!("zz".parse::<PublicKey>(), Err(ConvertError::InvalidHex));
        assert_eq!(
            "aabb".parse::<PublicKey>(),
            Err(ConvertError::LengthMismatch(PUBLIC_KEY_LEN, 2))
        );
    }

    #[test]
    fn test_public_key_ordering_is_lexicographic() {
        let mut low = [0u8; PUBLIC_KEY_LEN];
        let mut high = [0u8; PUBLIC_KEY_LEN];
        low[0] = 1;
        high[0] = 2;
        assert!(PublicKey::new(low) < PublicKey::new(high));
    }

    #[test]
    fn test_address_derivation_is_deterministic() {
        let key = PublicKey::new([42u8; PUBLIC_KEY_LEN]);
        let a = Address::from_public_key(&key);
        let b = Address::from_public_key(&key);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with(Address::PREFIX));
        assert_eq!(a.as_str().len(), 41);
    }

    #[test]
    fn test_distinct_keys_produce_distinct_addresses() {
        let a = Address::from_public_key(&PublicKey::new([1u8; PUBLIC_KEY_LEN]));
        let b = Address::from_public_key(&PublicKey::new([2u8; PUBLIC_KEY_LEN]));
        assert_ne!(a, b);
    }
}
