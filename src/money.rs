//! Money

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    ops::Deref,
};

use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by amount arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    /// The result does not fit in the minor-unit representation.
    #[error("amount overflow")]
    Overflow,
}

/// A non-negative amount in minor units (kobo, pence, cents).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount(0);

    /// Creates a new amount from minor units.
    pub const fn new(minor_units: u64) -> Self {
        Amount(minor_units)
    }

    /// Returns the raw minor units.
    pub const fn minor_units(self) -> u64 {
        self.0
    }

    /// Adds two amounts.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Overflow`] when the sum does not fit.
    pub fn checked_add(self, other: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    /// Multiplies a unit amount by a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Overflow`] when the product does not fit.
    pub fn checked_mul(self, quantity: u32) -> Result<Amount, AmountError> {
        self.0
            .checked_mul(u64::from(quantity))
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    /// Difference clamped at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Renders the amount in the given currency, e.g. `₦1,500.00`.
    pub fn display_in(self, currency: &'static Currency) -> String {
        match i64::try_from(self.0) {
            Ok(minor) => Money::from_minor(minor, currency).to_string(),
            Err(_) => format!("{} {}", self.0, currency.iso_alpha_code),
        }
    }
}

impl Deref for Amount {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(value)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}
