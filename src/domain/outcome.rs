//! Settlement outcome types.
//!
//! Every committed settlement returns one of these structs, carrying the
//! normalized amounts and the fee actually charged. They are the audit
//! record of the operation; the pool also logs them through `log`.

use core::fmt;

use super::Amount;
use crate::error::PoolError;

/// The outcome of a mint, as credited to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MintOutcome {
    minted: Amount,
    fee: Amount,
}

impl MintOutcome {
    /// Creates a new `MintOutcome` with validated invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidQuantity`] if `minted` is zero.
    pub const fn new(minted: Amount, fee: Amount) -> Result<Self, PoolError> {
        if minted.is_zero() {
            return Err(PoolError::InvalidQuantity("minted amount must be positive"));
        }
        Ok(Self { minted, fee })
    }

    /// Net claim-token value credited to the caller.
    #[must_use]
    pub const fn minted(&self) -> Amount {
        self.minted
    }

    /// Fee charged, redistributed to all holders.
    #[must_use]
    pub const fn fee(&self) -> Amount {
        self.fee
    }
}

impl fmt::Display for MintOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MintOutcome(minted={}, fee={})", self.minted, self.fee)
    }
}

/// The outcome of a swap.
///
/// # Invariants
///
/// - `amount_in > 0` and `amount_out > 0`.
/// - `fee` was deducted from the gross output before `amount_out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapOutcome {
    amount_in: Amount,
    amount_out: Amount,
    fee: Amount,
}

impl SwapOutcome {
    /// Creates a new `SwapOutcome` with validated invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidQuantity`] if either amount is zero.
    pub const fn new(amount_in: Amount, amount_out: Amount, fee: Amount) -> Result<Self, PoolError> {
        if amount_in.is_zero() {
            return Err(PoolError::InvalidQuantity("amount_in must be positive"));
        }
        if amount_out.is_zero() {
            return Err(PoolError::InvalidQuantity("amount_out must be positive"));
        }
        Ok(Self {
            amount_in,
            amount_out,
            fee,
        })
    }

    /// Native input amount taken from the caller.
    #[must_use]
    pub const fn amount_in(&self) -> Amount {
        self.amount_in
    }

    /// Native output amount paid to the caller.
    #[must_use]
    pub const fn amount_out(&self) -> Amount {
        self.amount_out
    }

    /// Fee retained by the pool, credited to all holders.
    #[must_use]
    pub const fn fee(&self) -> Amount {
        self.fee
    }
}

impl fmt::Display for SwapOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SwapOutcome(in={}, out={}, fee={})",
            self.amount_in, self.amount_out, self.fee
        )
    }
}

/// The outcome of any of the three redemption flavors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RedeemOutcome {
    burned: Amount,
    fee: Amount,
    payouts: Vec<Amount>,
}

impl RedeemOutcome {
    /// Creates a new `RedeemOutcome` with validated invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidQuantity`] if `burned` is zero, the
    /// fee is not strictly below it, or `payouts` is empty.
    pub fn new(burned: Amount, fee: Amount, payouts: Vec<Amount>) -> Result<Self, PoolError> {
        if burned.is_zero() {
            return Err(PoolError::InvalidQuantity("burned amount must be positive"));
        }
        if fee.get() >= burned.get() {
            return Err(PoolError::InvalidQuantity("fee must be below burned amount"));
        }
        if payouts.is_empty() {
            return Err(PoolError::InvalidQuantity("payouts must not be empty"));
        }
        Ok(Self {
            burned,
            fee,
            payouts,
        })
    }

    /// Claim-token value burned from the caller.
    #[must_use]
    pub const fn burned(&self) -> Amount {
        self.burned
    }

    /// Fee charged, redistributed to remaining holders.
    #[must_use]
    pub const fn fee(&self) -> Amount {
        self.fee
    }

    /// Per-asset native payouts, indexed like the pool's token list.
    /// Zero entries mark assets not part of this redemption.
    #[must_use]
    pub fn payouts(&self) -> &[Amount] {
        &self.payouts
    }
}

/// The outcome of a rebase: balance growth split into its two sources.
///
/// Both components may be zero — a rebase that found only noise inside
/// the configured error margins reports `(0, 0)` and changes nothing
/// economically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RebaseOutcome {
    fee: Amount,
    yield_amount: Amount,
}

impl RebaseOutcome {
    /// Creates a new `RebaseOutcome`. Both components may be zero.
    #[must_use]
    pub const fn new(fee: Amount, yield_amount: Amount) -> Self {
        Self { fee, yield_amount }
    }

    /// Growth attributed to trading fees and untracked deposits.
    #[must_use]
    pub const fn fee(&self) -> Amount {
        self.fee
    }

    /// Growth attributed to external yield accrual (rate increases).
    #[must_use]
    pub const fn yield_amount(&self) -> Amount {
        self.yield_amount
    }

    /// Total value recognized by this rebase.
    #[must_use]
    pub const fn total(&self) -> Option<Amount> {
        self.fee.checked_add(&self.yield_amount)
    }
}

impl fmt::Display for RebaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RebaseOutcome(fee={}, yield={})",
            self.fee, self.yield_amount
        )
    }
}
