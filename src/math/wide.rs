//! Full-width multiply-then-divide.
//!
//! Settlement and share-conversion math multiplies two u128 quantities
//! before dividing — `shares * total_supply / total_shares`,
//! `balance * redeem_amount / D` — and the intermediate product does not
//! fit in u128 at 18-decimal magnitudes. The product is therefore taken
//! in 256 bits and only the quotient is required to fit back into u128.

use primitive_types::U256;

use crate::domain::Rounding;
use crate::error::{PoolError, Result};

/// Computes `a * b / denominator` with a 256-bit intermediate product
/// and explicit rounding.
///
/// # Errors
///
/// - [`PoolError::DivisionByZero`] if `denominator` is zero.
/// - [`PoolError::Overflow`] if the quotient does not fit in u128.
pub fn mul_div(a: u128, b: u128, denominator: u128, rounding: Rounding) -> Result<u128> {
    if denominator == 0 {
        return Err(PoolError::DivisionByZero);
    }
    let product = U256::from(a) * U256::from(b);
    let denom = U256::from(denominator);
    let mut quotient = product / denom;
    if rounding.is_up() && !(product % denom).is_zero() {
        quotient += U256::one();
    }
    if quotient > U256::from(u128::MAX) {
        return Err(PoolError::Overflow("mul_div quotient exceeds u128"));
    }
    Ok(quotient.low_u128())
}
