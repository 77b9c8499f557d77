// Copyright (c) 2023-2025 The Meridian Foundation

//! Currency amounts and vote-weight percentages.

use crate::error::ConvertError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// An amount of currency, denominated in the smallest on-chain unit.
pub type Amount = u64;

/// Scale of [`VotePercent`]: the number of hundredths of a percent in 100%.
pub const PERCENT_DENOMINATOR: u32 = 10_000;

/// A vote-weight percentage with two decimal places of precision.
///
/// Stored as hundredths of a percent so that consensus arithmetic never
/// touches floating point: `33.34%` is stored as `3334`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct VotePercent(u16);

impl VotePercent {
    /// 100.00%, the maximum weight a wallet can spread across its votes.
    pub const MAX: Self = Self(PERCENT_DENOMINATOR as u16);

    /// Build from hundredths of a percent: `3334` is `33.34%`.
    pub fn from_hundredths(hundredths: u16) -> Result<Self, ConvertError> {
        if u32::from(hundredths) > PERCENT_DENOMINATOR {
            return Err(ConvertError::PercentOutOfRange(u32::from(hundredths)));
        }
        Ok(Self(hundredths))
    }

    /// Build from a percentage, rounded to two decimal places.
    pub fn from_percent(percent: f64) -> Result<Self, ConvertError> {
        if !percent.is_finite() || percent < 0.0 {
            return Err(ConvertError::PercentNotRepresentable);
        }
        let hundredths = (percent * 100.0).round();
        if hundredths > PERCENT_DENOMINATOR as f64 {
            return Err(ConvertError::PercentOutOfRange(hundredths as u32));
        }
        Ok(Self(hundredths as u16))
    }

    /// The raw value in hundredths of a percent.
    pub fn hundredths(self) -> u16 {
        self.0
    }

    /// The floor share of `amount` at this percentage.
    pub fn share_of(self, amount: Amount) -> Amount {
        ((amount as u128 * self.0 as u128) / PERCENT_DENOMINATOR as u128) as Amount
    }

    /// Sum a set of percentages; `None` when the total exceeds 100.00%.
    pub fn checked_total<I: IntoIterator<Item = Self>>(percents: I) -> Option<Self> {
        let mut total: u32 = 0;
        for percent in percents {
            total += u32::from(percent.0);
            if total > PERCENT_DENOMINATOR {
                return None;
            }
        }
        Some(Self(total as u16))
    }
}

impl<'de> Deserialize<'de> for VotePercent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hundredths = u16::deserialize(deserializer)?;
        Self::from_hundredths(hundredths).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for VotePercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
