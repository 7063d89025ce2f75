//! Unnormalized share ledger units.

use core::fmt;

use super::Rounding;

/// A quantity of ledger shares — the non-rebasing internal unit backing
/// the claim token.
///
/// A holder's claim-token balance is `shares * total_supply /
/// total_shares`; shares themselves only move on transfer, mint, and
/// burn, never on rebase. Arithmetic is checked, mirroring [`Amount`].
///
/// [`Amount`]: super::Amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[must_use]
pub struct Shares(u128);

impl Shares {
    /// Zero shares.
    pub const ZERO: Self = Self(0);

    /// Creates a new `Shares` from a raw `u128` value.
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// Returns the underlying `u128` value.
    #[must_use]
    pub const fn get(&self) -> u128 {
        self.0
    }

    /// Returns `true` if the share count is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition. Returns `None` on overflow.
    #[must_use]
    pub const fn checked_add(&self, other: &Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction. Returns `None` on underflow.
    #[must_use]
    pub const fn checked_sub(&self, other: &Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Computes `self * numerator / denominator` with explicit rounding.
    ///
    /// This is the share⇄value conversion shape. Returns `None` if the
    /// intermediate product overflows or `denominator` is zero.
    #[must_use]
    pub const fn mul_div(&self, numerator: u128, denominator: u128, rounding: Rounding) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let product = match self.0.checked_mul(numerator) {
            Some(v) => v,
            None => return None,
        };
        match rounding {
            Rounding::Down => Some(Self(product / denominator)),
            Rounding::Up => {
                let q = product / denominator;
                let r = product % denominator;
                if r != 0 {
                    Some(Self(q + 1))
                } else {
                    Some(Self(q))
                }
            }
        }
    }
}

impl fmt::Display for Shares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
