//! Validated configuration for pools and ledgers.
//!
//! Configuration structs are declarative blueprints: construction via
//! [`PoolConfig::new`] / [`LedgerConfig::new`] runs `validate()`, so a
//! successfully built config describes a pool that can actually be
//! instantiated.

use crate::domain::{Address, Amount, FeeRate, Token, FEE_DENOMINATOR};
use crate::error::{PoolError, Result};
use crate::ramp::MAX_A;

/// Default minimum ramp duration: one day.
pub const DEFAULT_MIN_RAMP_TIME: u64 = 86_400;

/// Configuration for a [`StablePool`](crate::pool::StablePool).
///
/// # Validation
///
/// - At least two tokens, all with distinct addresses.
/// - Amplification in `(0, 10^6]`.
/// - Fee rates are validated by [`FeeRate`] at their own construction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    tokens: Vec<Token>,
    mint_fee: FeeRate,
    swap_fee: FeeRate,
    redeem_fee: FeeRate,
    off_peg_multiplier: u64,
    a: u128,
    min_ramp_time: u64,
    fee_error_margin: Amount,
    yield_error_margin: Amount,
    max_delta_d: Amount,
    max_rate_age: u64,
    governor: Address,
}

impl PoolConfig {
    /// Creates a new `PoolConfig` with sensible operational defaults
    /// for the margins; adjust via the builder-style setters before
    /// instantiating the pool if needed.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidConfiguration`] if fewer than two tokens
    ///   are given, the amplification is out of range, or the off-peg
    ///   multiplier is below 1×.
    /// - [`PoolError::InvalidToken`] on duplicate token addresses.
    pub fn new(
        tokens: Vec<Token>,
        mint_fee: FeeRate,
        swap_fee: FeeRate,
        redeem_fee: FeeRate,
        a: u128,
        governor: Address,
    ) -> Result<Self> {
        let config = Self {
            tokens,
            mint_fee,
            swap_fee,
            redeem_fee,
            off_peg_multiplier: FEE_DENOMINATOR as u64,
            a,
            min_ramp_time: DEFAULT_MIN_RAMP_TIME,
            fee_error_margin: Amount::ZERO,
            yield_error_margin: Amount::ZERO,
            max_delta_d: Amount::new(100_000_000_000_000), // 10^14, 0.0001 of a unit
            max_rate_age: 3_600,
            governor,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates all configuration invariants.
    ///
    /// # Errors
    ///
    /// See [`PoolConfig::new`].
    pub fn validate(&self) -> Result<()> {
        if self.tokens.len() < 2 {
            return Err(PoolError::InvalidConfiguration(
                "a pool requires at least two tokens",
            ));
        }
        for (i, a) in self.tokens.iter().enumerate() {
            for b in &self.tokens[i + 1..] {
                if a.address() == b.address() {
                    return Err(PoolError::InvalidToken("duplicate token in basket"));
                }
            }
        }
        if self.a == 0 || self.a > MAX_A {
            return Err(PoolError::InvalidConfiguration(
                "amplification must be in (0, 10^6]",
            ));
        }
        if (self.off_peg_multiplier as u128) < FEE_DENOMINATOR {
            return Err(PoolError::InvalidConfiguration(
                "off-peg multiplier must be at least 1x",
            ));
        }
        Ok(())
    }

    /// Replaces the off-peg fee multiplier (parts per `10^10`, `>= 1x`).
    #[must_use]
    pub fn with_off_peg_multiplier(mut self, multiplier: u64) -> Self {
        self.off_peg_multiplier = multiplier;
        self
    }

    /// Replaces the minimum ramp duration.
    #[must_use]
    pub fn with_min_ramp_time(mut self, seconds: u64) -> Self {
        self.min_ramp_time = seconds;
        self
    }

    /// Replaces the rebase error margins.
    #[must_use]
    pub fn with_error_margins(mut self, fee: Amount, yield_margin: Amount) -> Self {
        self.fee_error_margin = fee;
        self.yield_error_margin = yield_margin;
        self
    }

    /// Replaces the per-operation invariant drift tolerance.
    #[must_use]
    pub fn with_max_delta_d(mut self, max_delta_d: Amount) -> Self {
        self.max_delta_d = max_delta_d;
        self
    }

    /// Replaces the exchange-rate freshness window in seconds.
    #[must_use]
    pub fn with_max_rate_age(mut self, seconds: u64) -> Self {
        self.max_rate_age = seconds;
        self
    }

    /// The basket, in pool index order.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Mint fee rate.
    #[must_use]
    pub const fn mint_fee(&self) -> FeeRate {
        self.mint_fee
    }

    /// Swap fee rate.
    #[must_use]
    pub const fn swap_fee(&self) -> FeeRate {
        self.swap_fee
    }

    /// Redeem fee rate.
    #[must_use]
    pub const fn redeem_fee(&self) -> FeeRate {
        self.redeem_fee
    }

    /// Off-peg fee multiplier in parts per `10^10`.
    #[must_use]
    pub const fn off_peg_multiplier(&self) -> u64 {
        self.off_peg_multiplier
    }

    /// Initial amplification coefficient.
    #[must_use]
    pub const fn a(&self) -> u128 {
        self.a
    }

    /// Minimum ramp duration in seconds.
    #[must_use]
    pub const fn min_ramp_time(&self) -> u64 {
        self.min_ramp_time
    }

    /// Rebase fee-classification noise margin.
    #[must_use]
    pub const fn fee_error_margin(&self) -> Amount {
        self.fee_error_margin
    }

    /// Rebase yield-classification noise margin.
    #[must_use]
    pub const fn yield_error_margin(&self) -> Amount {
        self.yield_error_margin
    }

    /// Per-operation invariant drift tolerance.
    #[must_use]
    pub const fn max_delta_d(&self) -> Amount {
        self.max_delta_d
    }

    /// Exchange-rate freshness window in seconds.
    #[must_use]
    pub const fn max_rate_age(&self) -> u64 {
        self.max_rate_age
    }

    /// Governance identity owning the pool.
    #[must_use]
    pub const fn governor(&self) -> Address {
        self.governor
    }
}

/// Configuration for a [`ShareLedger`](crate::ledger::ShareLedger).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedgerConfig {
    governor: Address,
    buffer_percent: FeeRate,
}

impl LedgerConfig {
    /// Creates a new `LedgerConfig`.
    ///
    /// `buffer_percent` is already range-validated by [`FeeRate`], so
    /// construction cannot fail beyond that.
    #[must_use]
    pub const fn new(governor: Address, buffer_percent: FeeRate) -> Self {
        Self {
            governor,
            buffer_percent,
        }
    }

    /// Governance identity owning the ledger.
    #[must_use]
    pub const fn governor(&self) -> Address {
        self.governor
    }

    /// Fraction of positive rebases carved into the buffer.
    #[must_use]
    pub const fn buffer_percent(&self) -> FeeRate {
        self.buffer_percent
    }
}
