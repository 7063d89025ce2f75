//! Exchange-rate sources for yield-bearing assets.
//!
//! Some basket assets appreciate against the reference unit over time
//! (liquid-staking receipts, rebasing wrappers). The pool consults a
//! [`RateOracle`] to learn how much of the reference unit one native
//! token is worth, and separates that appreciation from trading-fee
//! growth during rebase.
//!
//! Oracles are untrusted: every returned [`ExchangeRate`] carries the
//! time it was last updated, and the pool rejects rates older than its
//! configured freshness window with
//! [`StalePrice`](crate::error::PoolError::StalePrice) rather than
//! trusting a stale value.

use std::collections::BTreeMap;

use crate::domain::{Address, Timestamp, Token};
use crate::error::{PoolError, Result};

/// How much of the reference unit one native token is worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeRate {
    value: u128,
    decimals: u8,
    updated_at: Timestamp,
}

impl ExchangeRate {
    /// Creates a new rate observation.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidQuantity`] if `value` is zero or
    /// [`PoolError::InvalidPrecision`] if `decimals` exceeds 18.
    pub const fn new(value: u128, decimals: u8, updated_at: Timestamp) -> Result<Self> {
        if value == 0 {
            return Err(PoolError::InvalidQuantity("exchange rate must be positive"));
        }
        if decimals > 18 {
            return Err(PoolError::InvalidPrecision("rate decimals must be 0..=18"));
        }
        Ok(Self {
            value,
            decimals,
            updated_at,
        })
    }

    /// The identity rate: one token is worth exactly one reference unit,
    /// fresh at `now`.
    #[must_use]
    pub const fn identity(now: Timestamp) -> Self {
        Self {
            value: 1_000_000_000_000_000_000,
            decimals: 18,
            updated_at: now,
        }
    }

    /// Raw rate value.
    #[must_use]
    pub const fn value(&self) -> u128 {
        self.value
    }

    /// Decimal precision of [`value`](Self::value).
    #[must_use]
    pub const fn decimals(&self) -> u8 {
        self.decimals
    }

    /// `10^decimals`, the divisor that makes `value` a plain ratio.
    #[must_use]
    pub const fn denominator(&self) -> u128 {
        let mut factor: u128 = 1;
        let mut i = 0;
        while i < self.decimals {
            factor *= 10;
            i += 1;
        }
        factor
    }

    /// When this observation was last refreshed.
    #[must_use]
    pub const fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Fails with [`PoolError::StalePrice`] if the observation is older
    /// than `max_age` seconds at `now`.
    pub const fn ensure_fresh(&self, now: Timestamp, max_age: u64) -> Result<()> {
        let age = match now.checked_since(self.updated_at) {
            // An observation from the future is as untrustworthy as a
            // stale one.
            None => return Err(PoolError::StalePrice),
            Some(age) => age,
        };
        if age > max_age {
            return Err(PoolError::StalePrice);
        }
        Ok(())
    }
}

/// Read-only source of exchange rates, one per token.
///
/// Implementations must be pure with respect to pool state: the pool
/// only ever reads. A missing or failed rate must surface as an error,
/// never as a silently substituted default.
pub trait RateOracle {
    /// Returns the current rate observation for `token`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::StalePrice`] if no usable rate exists for
    /// the token.
    fn rate(&self, token: &Token) -> Result<ExchangeRate>;
}

/// Oracle for baskets with no yield-bearing assets: every token is worth
/// exactly one reference unit, always fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdentityOracle {
    now: Timestamp,
}

impl IdentityOracle {
    /// Creates an identity oracle whose observations are stamped `now`.
    #[must_use]
    pub const fn new(now: Timestamp) -> Self {
        Self { now }
    }
}

impl RateOracle for IdentityOracle {
    fn rate(&self, _token: &Token) -> Result<ExchangeRate> {
        Ok(ExchangeRate::identity(self.now))
    }
}

/// In-memory oracle fed by the host: rates are posted per token address
/// and served as-is.
///
/// Useful both in tests and for hosts that bridge an external feed into
/// the engine.
#[derive(Debug, Clone, Default)]
pub struct PostedRates {
    rates: BTreeMap<Address, ExchangeRate>,
}

impl PostedRates {
    /// Creates an empty oracle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts (or replaces) the rate for `token`.
    pub fn post(&mut self, token: Address, rate: ExchangeRate) {
        self.rates.insert(token, rate);
    }
}

impl RateOracle for PostedRates {
    fn rate(&self, token: &Token) -> Result<ExchangeRate> {
        self.rates
            .get(&token.address())
            .copied()
            .ok_or(PoolError::StalePrice)
    }
}
