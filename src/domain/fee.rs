//! Fee rates expressed in parts per `FEE_DENOMINATOR`.

use core::fmt;

use super::{Amount, Rounding};
use crate::error::PoolError;

/// Denominator for all fee rates: a rate of `10^10` would be 100%.
pub const FEE_DENOMINATOR: u128 = 10_000_000_000;

/// A fee rate in parts per [`FEE_DENOMINATOR`] (`10^10`).
///
/// Valid rates are strictly below 100%. The fine denominator lets
/// stable-pair fees be expressed precisely — a typical swap fee of
/// 0.04% is `4_000_000`.
///
/// # Examples
///
/// ```
/// use tidepool::domain::{Amount, FeeRate, Rounding};
///
/// let fee = FeeRate::new(4_000_000).expect("0.04%");
/// let cut = fee.apply(Amount::new(1_000_000_000), Rounding::Down).expect("no overflow");
/// assert_eq!(cut, Amount::new(400_000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeeRate(u64);

impl FeeRate {
    /// Zero fee (0%).
    pub const ZERO: Self = Self(0);

    /// Creates a new `FeeRate` after validating the range.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfiguration`] if `value` is not
    /// strictly below [`FEE_DENOMINATOR`].
    pub const fn new(value: u64) -> Result<Self, PoolError> {
        if value as u128 >= FEE_DENOMINATOR {
            return Err(PoolError::InvalidConfiguration(
                "fee rate must be below the denominator",
            ));
        }
        Ok(Self(value))
    }

    /// Returns the raw parts-per-`10^10` value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns `true` if this rate is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Computes `amount * rate / FEE_DENOMINATOR` with explicit rounding.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Overflow`] if the intermediate multiplication
    /// overflows.
    pub const fn apply(&self, amount: Amount, rounding: Rounding) -> Result<Amount, PoolError> {
        match amount.mul_div(self.0 as u128, FEE_DENOMINATOR, rounding) {
            Some(v) => Ok(v),
            None => Err(PoolError::Overflow("fee rate apply overflow")),
        }
    }

    /// Computes the complement `amount * (FEE_DENOMINATOR - rate) /
    /// FEE_DENOMINATOR` — the portion left after the fee.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Overflow`] if the intermediate multiplication
    /// overflows.
    pub const fn apply_complement(
        &self,
        amount: Amount,
        rounding: Rounding,
    ) -> Result<Amount, PoolError> {
        let complement = FEE_DENOMINATOR - self.0 as u128;
        match amount.mul_div(complement, FEE_DENOMINATOR, rounding) {
            Some(v) => Ok(v),
            None => Err(PoolError::Overflow("fee complement overflow")),
        }
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ppd", self.0)
    }
}
