//! Token amount with checked arithmetic.

use core::fmt;

use super::Rounding;

/// A token quantity in either native units or the 18-decimal normalized
/// common unit — the context decides which; `Amount` itself never
/// interprets decimals.
///
/// Arithmetic methods are checked: they return `None` on overflow,
/// underflow, or division by zero instead of panicking.
///
/// # Examples
///
/// ```
/// use tidepool::domain::{Amount, Rounding};
///
/// let a = Amount::new(100);
/// let b = Amount::new(200);
/// assert_eq!(a.checked_add(&b), Some(Amount::new(300)));
/// assert_eq!(b.checked_sub(&a), Some(Amount::new(100)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[must_use]
pub struct Amount(u128);

impl Amount {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Maximum representable amount.
    pub const MAX: Self = Self(u128::MAX);

    /// Creates a new `Amount` from a raw `u128` value.
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// Returns the underlying `u128` value.
    #[must_use]
    pub const fn get(&self) -> u128 {
        self.0
    }

    /// Returns `true` if the amount is zero.
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

    /// Checked multiplication. Returns `None` on overflow.
    #[must_use]
    pub const fn checked_mul(&self, other: &Self) -> Option<Self> {
        match self.0.checked_mul(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked division with explicit rounding direction.
    ///
    /// - [`Rounding::Down`]: floor division (round towards zero).
    /// - [`Rounding::Up`]: ceiling division — `(n + d - 1) / d`.
    ///
    /// Returns `None` if `divisor` is zero.
    #[must_use]
    pub const fn checked_div(&self, divisor: &Self, rounding: Rounding) -> Option<Self> {
        if divisor.0 == 0 {
            return None;
        }
        match rounding {
            Rounding::Down => Some(Self(self.0 / divisor.0)),
            Rounding::Up => {
                // Ceiling division: (n + d - 1) / d, with a fallback when
                // the adjusted numerator would overflow.
                let numerator = match self.0.checked_add(divisor.0 - 1) {
                    Some(v) => v,
                    None => {
                        let q = self.0 / divisor.0;
                        let r = self.0 % divisor.0;
                        if r != 0 {
                            return Some(Self(q + 1));
                        }
                        return Some(Self(q));
                    }
                };
                Some(Self(numerator / divisor.0))
            }
        }
    }

    /// Computes `self * numerator / denominator` with explicit rounding.
    ///
    /// Settlement math is dominated by this shape (`balance * share / D`,
    /// `amount * rate / 10^dec`). Returns `None` if the intermediate
    /// product overflows or `denominator` is zero.
    #[must_use]
    pub const fn mul_div(&self, numerator: u128, denominator: u128, rounding: Rounding) -> Option<Self> {
        let product = match self.0.checked_mul(numerator) {
            Some(v) => Self(v),
            None => return None,
        };
        product.checked_div(&Self(denominator), rounding)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
