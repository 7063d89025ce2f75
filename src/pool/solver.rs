//! StableSwap invariant solvers.
//!
//! The invariant for `n` normalized balances `x_i` with amplification
//! `A`:
//!
//! ```text
//! A·n·S + D = A·n·D + D^(n+1) / (n^n · Π x_i)
//! ```
//!
//! where `S = Σ x_i`. Neither `D` nor a single unknown balance is
//! solvable in closed form for `n > 2`, so both solvers use
//! Newton-Raphson iteration:
//!
//! ```text
//! D_next = (A·n·S + n·D_P) · D / ((A·n − 1)·D + (n+1)·D_P)
//! ```
//!
//! with the product term `D_P = D^(n+1) / (n^n · Π x_i)` rebuilt each
//! iteration as `D_P = D_P · D / (n · x_i)` per balance, which keeps
//! intermediates bounded. All arithmetic runs on 256-bit integers with
//! checked operations; divisions truncate toward zero.

use primitive_types::U256;

use crate::error::{PoolError, Result};

/// Maximum Newton-Raphson iterations before declaring non-convergence.
const MAX_ITERATIONS: u32 = 255;

/// Convergence threshold: absolute difference between consecutive
/// iterates, in normalized units.
const CONVERGENCE_THRESHOLD: u128 = 1;

fn into_u128(value: U256, context: &'static str) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(PoolError::Overflow(context));
    }
    Ok(value.low_u128())
}

/// Computes the StableSwap invariant `D` via Newton-Raphson iteration,
/// starting from `S = Σ balances`.
///
/// Returns zero for an all-zero balance set (the empty pool). A zero
/// balance alongside non-zero ones is rejected — callers validate
/// deposits so that an initialized pool never holds a zero balance.
///
/// # Errors
///
/// - [`PoolError::DivisionByZero`] if one balance is zero while others
///   are not.
/// - [`PoolError::ConvergenceError`] if the iteration does not settle
///   within [`MAX_ITERATIONS`] steps — unreachable for honestly bounded
///   inputs, and fatal when it occurs.
/// - [`PoolError::Overflow`] if an intermediate exceeds 256 bits.
pub fn compute_d(balances: &[u128], amp: u128) -> Result<u128> {
    let n = U256::from(balances.len());
    let mut s = U256::zero();
    for &x in balances {
        s = s
            .checked_add(U256::from(x))
            .ok_or(PoolError::Overflow("D: S overflow"))?;
    }
    if s.is_zero() {
        return Ok(0);
    }

    let ann = U256::from(amp)
        .checked_mul(n)
        .ok_or(PoolError::Overflow("D: A·n overflow"))?;

    let mut d = s;
    for _ in 0..MAX_ITERATIONS {
        // D_P = D^(n+1) / (n^n · Π x_i), folded one balance at a time.
        let mut d_p = d;
        for &x in balances {
            let nx = n
                .checked_mul(U256::from(x))
                .ok_or(PoolError::Overflow("D: n·x overflow"))?;
            if nx.is_zero() {
                return Err(PoolError::DivisionByZero);
            }
            d_p = d_p
                .checked_mul(d)
                .ok_or(PoolError::Overflow("D: D_P·D overflow"))?
                / nx;
        }

        let d_prev = d;

        // numerator = (A·n·S + n·D_P) · D
        let ann_s = ann
            .checked_mul(s)
            .ok_or(PoolError::Overflow("D: A·n·S overflow"))?;
        let n_dp = n
            .checked_mul(d_p)
            .ok_or(PoolError::Overflow("D: n·D_P overflow"))?;
        let numerator = ann_s
            .checked_add(n_dp)
            .ok_or(PoolError::Overflow("D: numerator sum overflow"))?
            .checked_mul(d)
            .ok_or(PoolError::Overflow("D: numerator overflow"))?;

        // denominator = (A·n − 1)·D + (n+1)·D_P
        let denom_left = ann
            .checked_sub(U256::one())
            .unwrap_or_default()
            .checked_mul(d)
            .ok_or(PoolError::Overflow("D: denominator left overflow"))?;
        let denom_right = n
            .checked_add(U256::one())
            .ok_or(PoolError::Overflow("D: n+1 overflow"))?
            .checked_mul(d_p)
            .ok_or(PoolError::Overflow("D: denominator right overflow"))?;
        let denominator = denom_left
            .checked_add(denom_right)
            .ok_or(PoolError::Overflow("D: denominator overflow"))?;
        if denominator.is_zero() {
            return Err(PoolError::DivisionByZero);
        }

        d = numerator / denominator;

        let diff = if d > d_prev { d - d_prev } else { d_prev - d };
        if diff <= U256::from(CONVERGENCE_THRESHOLD) {
            return into_u128(d, "D exceeds u128");
        }
    }

    Err(PoolError::ConvergenceError(
        "D computation did not converge within 255 iterations",
    ))
}

/// Computes the balance of asset `j` that satisfies the invariant at
/// the given `d`, holding every other balance fixed.
///
/// The equation reduces to `y² + (b − D)·y = c` with
///
/// ```text
/// b = S' + D / (A·n)
/// c = D^(n+1) / (n^n · Π' x_i · A·n)
/// ```
///
/// where `S'` and `Π'` run over every balance except `j`; iterated as
/// `y_next = (y² + c) / (2·y + b − D)` from the generous starting point
/// `y = D`.
///
/// # Errors
///
/// - [`PoolError::InvalidToken`] if `j` is out of range.
/// - [`PoolError::DivisionByZero`] if any other balance is zero.
/// - [`PoolError::ConvergenceError`] if the iteration does not settle
///   within [`MAX_ITERATIONS`] steps.
/// - [`PoolError::Overflow`] if an intermediate exceeds 256 bits.
pub fn compute_y(balances: &[u128], j: usize, d: u128, amp: u128) -> Result<u128> {
    if j >= balances.len() {
        return Err(PoolError::InvalidToken("balance index out of range"));
    }
    let n = U256::from(balances.len());
    let d = U256::from(d);
    let ann = U256::from(amp)
        .checked_mul(n)
        .ok_or(PoolError::Overflow("y: A·n overflow"))?;
    if ann.is_zero() {
        return Err(PoolError::DivisionByZero);
    }

    // Fold c = D^(n+1) / (n^n · Π' x_i · A·n) and S' in one pass.
    let mut c = d;
    let mut s = U256::zero();
    for (i, &x) in balances.iter().enumerate() {
        if i == j {
            continue;
        }
        let nx = n
            .checked_mul(U256::from(x))
            .ok_or(PoolError::Overflow("y: n·x overflow"))?;
        if nx.is_zero() {
            return Err(PoolError::DivisionByZero);
        }
        c = c
            .checked_mul(d)
            .ok_or(PoolError::Overflow("y: c·D overflow"))?
            / nx;
        s = s
            .checked_add(U256::from(x))
            .ok_or(PoolError::Overflow("y: S overflow"))?;
    }
    let ann_n = ann
        .checked_mul(n)
        .ok_or(PoolError::Overflow("y: A·n² overflow"))?;
    c = c
        .checked_mul(d)
        .ok_or(PoolError::Overflow("y: c final overflow"))?
        / ann_n;

    let b = s
        .checked_add(d / ann)
        .ok_or(PoolError::Overflow("y: b overflow"))?;

    let mut y = d;
    for _ in 0..MAX_ITERATIONS {
        let y_prev = y;

        // y_next = (y² + c) / (2·y + b − D)
        let numerator = y
            .checked_mul(y)
            .ok_or(PoolError::Overflow("y: y² overflow"))?
            .checked_add(c)
            .ok_or(PoolError::Overflow("y: numerator overflow"))?;
        let denominator = y
            .checked_mul(U256::from(2u8))
            .ok_or(PoolError::Overflow("y: 2y overflow"))?
            .checked_add(b)
            .ok_or(PoolError::Overflow("y: denominator sum overflow"))?
            .checked_sub(d)
            .unwrap_or_default();
        if denominator.is_zero() {
            return Err(PoolError::DivisionByZero);
        }

        y = numerator / denominator;

        let diff = if y > y_prev { y - y_prev } else { y_prev - y };
        if diff <= U256::from(CONVERGENCE_THRESHOLD) {
            return into_u128(y, "y exceeds u128");
        }
    }

    Err(PoolError::ConvergenceError(
        "y computation did not converge within 255 iterations",
    ))
}
