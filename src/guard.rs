//! Governance-bounded parameter control.
//!
//! Tunable pool parameters are dangerous to move quickly: a fee or
//! amplification jump instantly reprices every open position. The
//! [`ParameterGuard`] therefore splits parameter authority across three
//! roles:
//!
//! - **curator** — may change parameters only within per-parameter
//!   relative bounds and absolute caps,
//! - **governor** — may change parameters without the percentage rails
//!   (calibration and emergencies) and owns the bounds registry,
//! - **guardian** — may only cancel an in-flight amplification ramp.
//!
//! The guard holds its own identity and applies accepted changes by
//! calling the pool's admin-gated setters, so the pool's governor must
//! register the guard as an admin once at deployment.
//!
//! Bounds are created once per deployment, updated only by the
//! governor, consulted on every curated change, and never discarded.

use std::collections::BTreeMap;

use crate::domain::{Address, FeeRate, Ppm, Timestamp};
use crate::error::{PoolError, Result};
use crate::pool::StablePool;

/// The three control identities recognized by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Roles {
    /// Unbounded parameter authority; owns the bounds registry.
    pub governor: Address,
    /// Bounded parameter authority.
    pub curator: Address,
    /// May cancel an in-flight amplification ramp, nothing else.
    pub guardian: Address,
}

/// Keys of the guarded parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamKey {
    /// The amplification coefficient.
    Amplification,
    /// The mint fee rate.
    MintFee,
    /// The swap fee rate.
    SwapFee,
    /// The redeem fee rate.
    RedeemFee,
    /// The off-peg fee multiplier.
    OffPegMultiplier,
}

/// Per-parameter safety rails for the curated path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    /// Absolute cap on the parameter value.
    pub max: u128,
    /// Largest allowed relative decrease per change.
    pub max_decrease: Ppm,
    /// Largest allowed relative increase per change.
    pub max_increase: Ppm,
}

/// A requested parameter change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamChange {
    /// Replace the mint fee.
    MintFee(FeeRate),
    /// Replace the swap fee.
    SwapFee(FeeRate),
    /// Replace the redeem fee.
    RedeemFee(FeeRate),
    /// Replace the off-peg fee multiplier.
    OffPegMultiplier(u64),
    /// Schedule an amplification ramp toward `new_a` ending at
    /// `end_time`.
    Amplification {
        /// The ramp target.
        new_a: u128,
        /// The ramp end time.
        end_time: Timestamp,
    },
}

impl ParamChange {
    const fn key(&self) -> ParamKey {
        match self {
            Self::MintFee(_) => ParamKey::MintFee,
            Self::SwapFee(_) => ParamKey::SwapFee,
            Self::RedeemFee(_) => ParamKey::RedeemFee,
            Self::OffPegMultiplier(_) => ParamKey::OffPegMultiplier,
            Self::Amplification { .. } => ParamKey::Amplification,
        }
    }

    const fn new_value(&self) -> u128 {
        match self {
            Self::MintFee(f) | Self::SwapFee(f) | Self::RedeemFee(f) => f.get() as u128,
            Self::OffPegMultiplier(m) => *m as u128,
            Self::Amplification { new_a, .. } => *new_a,
        }
    }
}

/// Registry plus keeper gate for bounded parameter changes.
///
/// Sits beside the pool: it holds no pool state, only the role
/// identities and the per-parameter [`Bounds`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterGuard {
    identity: Address,
    roles: Roles,
    bounds: BTreeMap<ParamKey, Bounds>,
}

impl ParameterGuard {
    /// Creates a guard with an empty bounds registry.
    ///
    /// `identity` is the address the guard uses when calling the pool;
    /// register it as a pool admin.
    #[must_use]
    pub const fn new(identity: Address, roles: Roles) -> Self {
        Self {
            identity,
            roles,
            bounds: BTreeMap::new(),
        }
    }

    /// The identity the guard applies changes under.
    #[must_use]
    pub const fn identity(&self) -> Address {
        self.identity
    }

    /// The configured roles.
    #[must_use]
    pub const fn roles(&self) -> Roles {
        self.roles
    }

    /// The bounds currently configured for `key`, if any.
    #[must_use]
    pub fn bounds(&self, key: ParamKey) -> Option<Bounds> {
        self.bounds.get(&key).copied()
    }

    /// Installs or replaces the bounds for `key`. Governor only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Unauthorized`] for any other caller.
    pub fn set_bounds(&mut self, caller: Address, key: ParamKey, bounds: Bounds) -> Result<()> {
        if caller != self.roles.governor {
            return Err(PoolError::Unauthorized("governor"));
        }
        self.bounds.insert(key, bounds);
        log::info!("guard: bounds for {key:?} set to {bounds:?}");
        Ok(())
    }

    /// Requests a parameter change on `pool`.
    ///
    /// The curator path checks the relative delta against the configured
    /// bound in the requested direction and the absolute cap; the
    /// governor path skips the percentage rails. Either way the change
    /// is applied through the pool's own setters, which re-validate the
    /// value itself.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Unauthorized`] if the caller is neither curator
    ///   nor governor.
    /// - [`PoolError::InvalidConfiguration`] if no bounds are configured
    ///   for the parameter on the curated path.
    /// - [`PoolError::FeeDeltaTooBig`] if the relative change exceeds
    ///   the configured bound.
    /// - [`PoolError::FeeOutOfBounds`] if the new value exceeds the
    ///   absolute cap.
    pub fn apply(
        &self,
        caller: Address,
        pool: &mut StablePool,
        change: ParamChange,
        now: Timestamp,
    ) -> Result<()> {
        if caller == self.roles.governor {
            return self.commit(pool, change, now);
        }
        if caller != self.roles.curator {
            return Err(PoolError::Unauthorized("curator or governor"));
        }

        let key = change.key();
        let bounds = self
            .bounds(key)
            .ok_or(PoolError::InvalidConfiguration("no bounds configured"))?;
        let new_value = change.new_value();
        if new_value > bounds.max {
            return Err(PoolError::FeeOutOfBounds);
        }

        let current = self.current_value(pool, key, now);
        if new_value >= current {
            let limit = bounds
                .max_increase
                .scale(current)
                .ok_or(PoolError::Overflow("increase bound overflow"))?;
            if new_value - current > limit {
                return Err(PoolError::FeeDeltaTooBig);
            }
        } else {
            let limit = bounds
                .max_decrease
                .scale(current)
                .ok_or(PoolError::Overflow("decrease bound overflow"))?;
            if current - new_value > limit {
                return Err(PoolError::FeeDeltaTooBig);
            }
        }

        self.commit(pool, change, now)
    }

    /// Unconditionally cancels an in-flight amplification ramp.
    /// Guardian or governor only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Unauthorized`] for any other caller.
    pub fn cancel_ramp(&self, caller: Address, pool: &mut StablePool, now: Timestamp) -> Result<()> {
        if caller != self.roles.guardian && caller != self.roles.governor {
            return Err(PoolError::Unauthorized("guardian or governor"));
        }
        log::info!("guard: ramp cancelled by {caller}");
        pool.stop_ramp(self.identity, now)
    }

    fn current_value(&self, pool: &StablePool, key: ParamKey, now: Timestamp) -> u128 {
        match key {
            ParamKey::Amplification => pool.get_a(now),
            ParamKey::MintFee => u128::from(pool.mint_fee().get()),
            ParamKey::SwapFee => u128::from(pool.swap_fee().get()),
            ParamKey::RedeemFee => u128::from(pool.redeem_fee().get()),
            ParamKey::OffPegMultiplier => u128::from(pool.off_peg_multiplier()),
        }
    }

    fn commit(&self, pool: &mut StablePool, change: ParamChange, now: Timestamp) -> Result<()> {
        match change {
            ParamChange::MintFee(fee) => pool.set_mint_fee(self.identity, fee),
            ParamChange::SwapFee(fee) => pool.set_swap_fee(self.identity, fee),
            ParamChange::RedeemFee(fee) => pool.set_redeem_fee(self.identity, fee),
            ParamChange::OffPegMultiplier(m) => pool.set_off_peg_multiplier(self.identity, m),
            ParamChange::Amplification { new_a, end_time } => {
                pool.ramp_a(self.identity, new_a, end_time, now)
            }
        }
    }
}
