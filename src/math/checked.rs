//! Checked arithmetic trait for domain wrapper types.
//!
//! The [`CheckedArithmetic`] trait provides fallible arithmetic
//! operations that return [`Result<Self, PoolError>`] instead of
//! panicking on overflow, underflow, or division by zero.
//!
//! # Implementations
//!
//! - [`Amount`] — token quantities (`u128`)
//! - [`Shares`] — ledger share quantities (`u128`)

use crate::domain::{Amount, Rounding, Shares};
use crate::error::PoolError;

/// Fallible arithmetic for domain wrapper types.
///
/// Every method returns [`Result<Self, PoolError>`] with a specific
/// error variant so callers can distinguish overflow from underflow from
/// division by zero.
///
/// # Contract
///
/// - **No panics** — all error conditions produce `Err`.
/// - **No saturation** — saturation hides bugs; errors propagate instead.
/// - Implementations must delegate to the inner type's checked operations.
pub trait CheckedArithmetic: Sized {
    /// Checked addition.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Overflow`] if the result exceeds the
    /// representable range.
    fn safe_add(&self, other: &Self) -> Result<Self, PoolError>;

    /// Checked subtraction.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Underflow`] if the result would be negative.
    fn safe_sub(&self, other: &Self) -> Result<Self, PoolError>;

    /// Checked `self * numerator / denominator` with explicit
    /// [`Rounding`] direction — the dominant shape of settlement math.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Overflow`] if the intermediate product
    /// overflows, [`PoolError::DivisionByZero`] if `denominator` is zero.
    fn safe_mul_div(
        &self,
        numerator: u128,
        denominator: u128,
        rounding: Rounding,
    ) -> Result<Self, PoolError>;
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

impl CheckedArithmetic for Amount {
    #[inline]
    fn safe_add(&self, other: &Self) -> Result<Self, PoolError> {
        self.checked_add(other)
            .ok_or(PoolError::Overflow("amount addition overflow"))
    }

    #[inline]
    fn safe_sub(&self, other: &Self) -> Result<Self, PoolError> {
        self.checked_sub(other)
            .ok_or(PoolError::Underflow("amount subtraction underflow"))
    }

    #[inline]
    fn safe_mul_div(
        &self,
        numerator: u128,
        denominator: u128,
        rounding: Rounding,
    ) -> Result<Self, PoolError> {
        if denominator == 0 {
            return Err(PoolError::DivisionByZero);
        }
        self.mul_div(numerator, denominator, rounding)
            .ok_or(PoolError::Overflow("amount mul_div overflow"))
    }
}

// ---------------------------------------------------------------------------
// Shares
// ---------------------------------------------------------------------------

impl CheckedArithmetic for Shares {
    #[inline]
    fn safe_add(&self, other: &Self) -> Result<Self, PoolError> {
        self.checked_add(other)
            .ok_or(PoolError::Overflow("shares addition overflow"))
    }

    #[inline]
    fn safe_sub(&self, other: &Self) -> Result<Self, PoolError> {
        self.checked_sub(other)
            .ok_or(PoolError::Underflow("shares subtraction underflow"))
    }

    #[inline]
    fn safe_mul_div(
        &self,
        numerator: u128,
        denominator: u128,
        rounding: Rounding,
    ) -> Result<Self, PoolError> {
        if denominator == 0 {
            return Err(PoolError::DivisionByZero);
        }
        self.mul_div(numerator, denominator, rounding)
            .ok_or(PoolError::Overflow("shares mul_div overflow"))
    }
}
