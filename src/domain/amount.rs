//! Fixed-point ledger amounts.
//!
//! The venue denominates every quantity in integer units with seven
//! implied decimal places. All quantity math stays on `Amount`; the
//! `Decimal` and string views exist for pricing and reporting only.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Implied decimal places of every ledger amount.
pub const AMOUNT_DECIMALS: u32 = 7;

/// Integer units per whole token (10^7).
pub const UNITS_PER_TOKEN: u128 = 10_000_000;

/// Errors from parsing or converting amounts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("invalid amount '{0}'")]
    Invalid(String),
    #[error("amount '{0}' has more than 7 decimal places")]
    TooPrecise(String),
    #[error("amount '{0}' is negative")]
    Negative(String),
    #[error("amount out of range")]
    Overflow,
}

/// Non-negative 7-decimal fixed-point amount in raw ledger units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Self = Self(0);

    /// Wrap a raw ledger integer.
    pub const fn from_units(units: u128) -> Self {
        Self(units)
    }

    /// Raw ledger integer.
    pub const fn units(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Convert a signed contract balance (token balances are i128).
    pub fn from_signed_units(units: i128) -> Result<Self, AmountError> {
        u128::try_from(units)
            .map(Self)
            .map_err(|_| AmountError::Negative(units.to_string()))
    }

    /// Exact decimal view, preserving all seven fractional digits.
    pub fn to_decimal(self) -> Result<Decimal, AmountError> {
        let signed = i128::try_from(self.0).map_err(|_| AmountError::Overflow)?;
        Decimal::try_from_i128_with_scale(signed, AMOUNT_DECIMALS)
            .map_err(|_| AmountError::Overflow)
    }

    /// Convert a human-readable decimal, truncating below 10^-7.
    pub fn from_decimal_floor(value: Decimal) -> Result<Self, AmountError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative(value.to_string()));
        }
        let scaled = value
            .checked_mul(Decimal::new(10_000_000, 0))
            .ok_or(AmountError::Overflow)?
            .floor();
        scaled.to_u128().map(Self).ok_or(AmountError::Overflow)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Amount {
    /// Renders as `"<whole>.<7 digits>"`, e.g. `1000.0000000`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNITS_PER_TOKEN;
        let frac = self.0 % UNITS_PER_TOKEN;
        write!(f, "{whole}.{frac:07}")
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value =
            Decimal::from_str(trimmed).map_err(|_| AmountError::Invalid(s.to_string()))?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative(s.to_string()));
        }
        if value.normalize().scale() > AMOUNT_DECIMALS {
            return Err(AmountError::TooPrecise(s.to_string()));
        }
        Self::from_decimal_floor(value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
