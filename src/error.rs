//! Unified error types for the tidepool engine.
//!
//! All fallible operations across the crate return [`PoolError`] as their
//! error type, ensuring a consistent error handling experience for
//! consumers.
//!
//! # Taxonomy
//!
//! | Group | Examples | Meaning |
//! |-------|----------|---------|
//! | Input validation | `MismatchedLengths`, `InvalidQuantity`, `SameTokenInTokenOut` | rejected before any state mutation |
//! | Slippage / bounds | `InsufficientMintAmount`, `MaxRedeemAmount` | caller-supplied guarantee not met |
//! | Invariant health | `ImbalancedPool`, `PoolPaused`, `Reentrancy` | protects the peg from corrupted state |
//! | Authorization | `NoPool`, `NotAdmin`, `Unauthorized` | caller lacks the required capability |
//! | Numeric | `Overflow`, `ConvergenceError` | arithmetic failure; non-convergence is fatal, never caught internally |
//! | Governance bounds | `FeeDeltaTooBig`, `ExcessiveAChange` | requested change violates safety rails |
//! | External sources | `StalePrice` | rate source failure is surfaced, never defaulted |
//!
//! Settlement errors are atomic: the failed operation leaves every field
//! untouched, and nothing is retried internally.

use thiserror::Error;

/// Unified error enum for every fallible operation in the crate.
///
/// Variants carry a `&'static str` context payload where the same error
/// kind can arise at multiple call sites.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Arithmetic overflow with the offending computation named.
    #[error("arithmetic overflow: {0}")]
    Overflow(&'static str),

    /// Arithmetic underflow with the offending computation named.
    #[error("arithmetic underflow: {0}")]
    Underflow(&'static str),

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Newton iteration failed to converge within the iteration cap.
    #[error("invariant solver did not converge: {0}")]
    ConvergenceError(&'static str),

    /// A configuration invariant was violated at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),

    /// A quantity argument was zero, empty, or otherwise unusable.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(&'static str),

    /// A token is not part of this pool's basket.
    #[error("invalid token: {0}")]
    InvalidToken(&'static str),

    /// Native decimals outside the supported `0..=18` range.
    #[error("invalid precision: {0}")]
    InvalidPrecision(&'static str),

    /// Parallel array arguments disagree on length.
    #[error("mismatched array lengths")]
    MismatchedLengths,

    /// Swap requested with identical input and output indices.
    #[error("token in and token out are the same")]
    SameTokenInTokenOut,

    /// Settlement attempted while the pool is paused.
    #[error("pool is paused")]
    PoolPaused,

    /// A settlement operation re-entered while one was in flight.
    #[error("reentrant settlement call")]
    Reentrancy,

    /// Supplied timestamp precedes one already observed.
    #[error("timestamp moved backward")]
    NonMonotonicTime,

    /// Net mint fell below the caller's minimum.
    #[error("mint amount below caller minimum")]
    InsufficientMintAmount,

    /// Swap payout fell below the caller's minimum.
    #[error("swap output below caller minimum")]
    InsufficientSwapOutAmount,

    /// A redemption payout fell below the caller's per-asset minimum.
    #[error("redeem payout below caller minimum")]
    InsufficientRedeemAmount,

    /// Redemption would burn more than the caller's supplied ceiling.
    #[error("redeem amount above caller maximum")]
    MaxRedeemAmount,

    /// Recomputed invariant drifted beyond the configured tolerance.
    #[error("invariant drift beyond tolerance: {0}")]
    ImbalancedPool(&'static str),

    /// Caller is not a registered pool on the share ledger.
    #[error("caller is not a registered pool")]
    NoPool,

    /// Caller is neither the governor nor an admin.
    #[error("caller is not an admin")]
    NotAdmin,

    /// Caller lacks the role required for this operation.
    #[error("caller lacks the required role: {0}")]
    Unauthorized(&'static str),

    /// Relative parameter change exceeds the configured bound.
    #[error("parameter delta exceeds configured bound")]
    FeeDeltaTooBig,

    /// Absolute parameter value exceeds the configured cap.
    #[error("parameter value exceeds configured cap")]
    FeeOutOfBounds,

    /// New amplification value swings too far from the current one.
    #[error("amplification change exceeds safety limit")]
    ExcessiveAChange,

    /// Ramp end time is closer than the minimum ramp duration.
    #[error("ramp duration below minimum")]
    InsufficientRampTime,

    /// A ramp is still in flight.
    #[error("a ramp is already in progress")]
    RampAlreadyInProgress,

    /// An exchange rate was older than the configured freshness window.
    #[error("exchange rate is stale")]
    StalePrice,

    /// A rebase detected a net loss, which only the governor may apply.
    #[error("negative rebase pending governor resolution")]
    PendingLoss,

    /// Account balance (or allowance) too low for the requested move.
    #[error("insufficient balance: {0}")]
    InsufficientBalance(&'static str),
}

/// Convenience alias used across the crate.
pub type Result<T> = core::result::Result<T, PoolError>;
