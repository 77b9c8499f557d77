// Copyright (c) 2023-2025 The Meridian Foundation

//! Conversion errors for chain types.

use displaydoc::Display;

/// An error that occurs when converting raw data into a chain type.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum ConvertError {
    /// Expected {0} bytes, found {1}
    LengthMismatch(usize, usize),
    /// Invalid hex encoding
    InvalidHex,
    /// Percentage of {0} hundredths exceeds 100.00%
    PercentOutOfRange(u32),
    /// Percentage is not representable with two decimal places
    PercentNotRepresentable,
}

impl std::error::Error for ConvertError {}
