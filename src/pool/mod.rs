//! The invariant-based exchange engine.
//!
//! [`StablePool`] owns per-asset balances, precision normalization, fee
//! rates, the amplification ramp, and the paused flag, and drives the
//! [`ShareLedger`] through mint/swap/redeem settlement and periodic
//! rebase.
//!
//! # Units
//!
//! Callers pass native amounts; the pool scales each asset by
//! `10^(18 − decimals)` and by its exchange rate into an 18-decimal
//! common unit before any invariant math, and scales payouts back down
//! on the way out. `balances` and `total_supply` live entirely in the
//! common unit.
//!
//! # Settlement discipline
//!
//! Every mutating operation runs in two phases: a pure planning phase
//! that computes the complete post-state into locals, and a commit phase
//! that only runs once every check has passed. A failure in any phase
//! leaves the pool untouched. A reentrancy flag is held for the duration
//! of each settlement and released on all exit paths, and each
//! settlement records the timestamp it saw so time cannot move backward.
//!
//! # Collaborators
//!
//! The share ledger and the rate oracle are passed into each operation
//! by the caller rather than stored, which keeps every function
//! deterministic and directly testable.

pub mod solver;

#[cfg(test)]
mod proptest_properties;

use std::collections::BTreeSet;

use crate::config::PoolConfig;
use crate::domain::{
    Address, Amount, FeeRate, MintOutcome, RebaseOutcome, RedeemOutcome, Rounding, SwapOutcome,
    Timestamp, Token, FEE_DENOMINATOR,
};
use crate::error::{PoolError, Result};
use crate::ledger::ShareLedger;
use crate::math::{mul_div, CheckedArithmetic};
use crate::ramp::AmpRamp;
use crate::rates::{ExchangeRate, RateOracle};

/// Conservative rounding unit withheld from every solved payout, so
/// iteration error can never pay out more than the curve allows.
const Y_ROUNDING_MARGIN: u128 = 1;

/// The peg-stabilizing multi-asset pool.
///
/// Created from a validated [`PoolConfig`]; starts empty and unpaused.
/// The pool calls the ledger under its own `address` identity, which
/// the ledger's governor must register via
/// [`ShareLedger::add_pool`](crate::ledger::ShareLedger::add_pool).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StablePool {
    address: Address,
    tokens: Vec<Token>,
    precisions: Vec<u128>,
    balances: Vec<Amount>,
    raw_balances: Vec<Amount>,
    untracked_in: Vec<Amount>,
    mint_fee: FeeRate,
    swap_fee: FeeRate,
    redeem_fee: FeeRate,
    off_peg_multiplier: u64,
    ramp: AmpRamp,
    total_supply: Amount,
    governor: Address,
    admins: BTreeSet<Address>,
    paused: bool,
    fee_error_margin: Amount,
    yield_error_margin: Amount,
    max_delta_d: Amount,
    max_rate_age: u64,
    entered: bool,
    last_activity: Timestamp,
}

impl StablePool {
    /// Creates an empty pool from a validated configuration.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`PoolConfig::validate`] and from ramp
    /// construction.
    pub fn new(address: Address, config: &PoolConfig) -> Result<Self> {
        config.validate()?;
        let n = config.tokens().len();
        Ok(Self {
            address,
            tokens: config.tokens().to_vec(),
            precisions: config.tokens().iter().map(Token::precision_factor).collect(),
            balances: vec![Amount::ZERO; n],
            raw_balances: vec![Amount::ZERO; n],
            untracked_in: vec![Amount::ZERO; n],
            mint_fee: config.mint_fee(),
            swap_fee: config.swap_fee(),
            redeem_fee: config.redeem_fee(),
            off_peg_multiplier: config.off_peg_multiplier(),
            ramp: AmpRamp::new(config.a(), config.min_ramp_time())?,
            total_supply: Amount::ZERO,
            governor: config.governor(),
            admins: BTreeSet::new(),
            paused: false,
            fee_error_margin: config.fee_error_margin(),
            yield_error_margin: config.yield_error_margin(),
            max_delta_d: config.max_delta_d(),
            max_rate_age: config.max_rate_age(),
            entered: false,
            last_activity: Timestamp::ZERO,
        })
    }

    // -- accessors ----------------------------------------------------------

    /// The identity this pool uses when calling the ledger.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The basket, in pool index order.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Tracked normalized balances.
    #[must_use]
    pub fn balances(&self) -> &[Amount] {
        &self.balances
    }

    /// Native holdings per asset, untracked deposits included.
    #[must_use]
    pub fn raw_balances(&self) -> &[Amount] {
        &self.raw_balances
    }

    /// The pool-attributable denominated supply (the tracked `D`).
    #[must_use]
    pub const fn total_supply(&self) -> Amount {
        self.total_supply
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

    /// Returns `true` while settlement is suspended.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// The amplification coefficient at `now`.
    #[must_use]
    pub fn get_a(&self, now: Timestamp) -> u128 {
        self.ramp.get_a(now)
    }

    /// Governance identity owning the pool.
    #[must_use]
    pub const fn governor(&self) -> Address {
        self.governor
    }

    /// Returns `true` if `caller` is the governor or a listed admin.
    #[must_use]
    pub fn is_admin(&self, caller: &Address) -> bool {
        *caller == self.governor || self.admins.contains(caller)
    }

    // -- settlement: mint ----------------------------------------------------

    /// Deposits `amounts` (native units, pool index order) and mints the
    /// resulting invariant growth to `caller`, minus the mint fee.
    ///
    /// The fee is not burned: it is credited to the ledger's total
    /// supply, diluting nothing and raising every holder's balance. The
    /// first deposit pays no fee and must fund every asset.
    ///
    /// # Errors
    ///
    /// - [`PoolError::PoolPaused`] while paused.
    /// - [`PoolError::MismatchedLengths`] / [`PoolError::InvalidQuantity`]
    ///   on malformed input.
    /// - [`PoolError::StalePrice`] if any needed rate is stale.
    /// - [`PoolError::InsufficientMintAmount`] if the net mint is below
    ///   `min_mint`.
    pub fn mint<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        caller: Address,
        amounts: &[Amount],
        min_mint: Amount,
        now: Timestamp,
    ) -> Result<MintOutcome> {
        self.enter(now)?;
        let result = self.mint_inner(ledger, oracle, caller, amounts, min_mint, now);
        self.exit();
        result
    }

    fn mint_inner<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        caller: Address,
        amounts: &[Amount],
        min_mint: Amount,
        now: Timestamp,
    ) -> Result<MintOutcome> {
        self.require_active()?;
        self.require_registered(ledger)?;
        let (new_balances, mint_amount, fee) = self.plan_mint(oracle, amounts, now)?;

        let net = mint_amount.safe_sub(&fee)?;
        if net < min_mint {
            return Err(PoolError::InsufficientMintAmount);
        }

        // Commit.
        ledger.mint(self.address, caller, net)?;
        if !fee.is_zero() {
            ledger.add_total_supply(self.address, fee)?;
        }
        for (i, amount) in amounts.iter().enumerate() {
            self.raw_balances[i] = self.raw_balances[i].safe_add(amount)?;
        }
        self.total_supply = self.total_supply.safe_add(&mint_amount)?;
        self.balances = new_balances;
        log::debug!("pool {}: mint net={net} fee={fee}", self.address);
        MintOutcome::new(net, fee)
    }

    /// Pure preview of [`mint`](Self::mint): returns `(net, fee)`.
    ///
    /// # Errors
    ///
    /// Same validation failures as `mint`, minus the slippage check.
    pub fn get_mint_amount<O: RateOracle>(
        &self,
        oracle: &O,
        amounts: &[Amount],
        now: Timestamp,
    ) -> Result<(Amount, Amount)> {
        let (_, mint_amount, fee) = self.plan_mint(oracle, amounts, now)?;
        Ok((mint_amount.safe_sub(&fee)?, fee))
    }

    fn plan_mint<O: RateOracle>(
        &self,
        oracle: &O,
        amounts: &[Amount],
        now: Timestamp,
    ) -> Result<(Vec<Amount>, Amount, Amount)> {
        if amounts.len() != self.tokens.len() {
            return Err(PoolError::MismatchedLengths);
        }
        let first_deposit = self.total_supply.is_zero();
        if amounts.iter().all(Amount::is_zero) {
            return Err(PoolError::InvalidQuantity("mint requires a deposit"));
        }
        if first_deposit && amounts.iter().any(Amount::is_zero) {
            return Err(PoolError::InvalidQuantity(
                "first deposit must fund every asset",
            ));
        }

        let a = self.ramp.get_a(now);
        self.check_tracked_supply(a)?;

        let mut new_balances = self.balances.clone();
        for (i, amount) in amounts.iter().enumerate() {
            if amount.is_zero() {
                continue;
            }
            let rate = self.fresh_rate(oracle, i, now)?;
            let normalized = self.normalize(i, *amount, &rate)?;
            new_balances[i] = new_balances[i].safe_add(&normalized)?;
        }

        let new_d = Amount::new(solver::compute_d(&raw(&new_balances), a)?);
        let mint_amount = new_d.safe_sub(&self.total_supply)?;
        let fee = if first_deposit {
            Amount::ZERO
        } else {
            self.mint_fee.apply(mint_amount, Rounding::Up)?
        };
        Ok((new_balances, mint_amount, fee))
    }

    // -- settlement: swap ----------------------------------------------------

    /// Swaps `dx` native units of asset `i` for asset `j`, holding the
    /// invariant constant. The fee is deducted from the gross output and
    /// retained in the pool, credited to all holders.
    ///
    /// # Errors
    ///
    /// - [`PoolError::SameTokenInTokenOut`] if `i == j`.
    /// - [`PoolError::InsufficientSwapOutAmount`] if the net payout is
    ///   below `min_dy`.
    /// - [`PoolError::ImbalancedPool`] if the recomputed invariant
    ///   drifts beyond the configured tolerance.
    #[allow(clippy::too_many_arguments)]
    pub fn swap<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        i: usize,
        j: usize,
        dx: Amount,
        min_dy: Amount,
        now: Timestamp,
    ) -> Result<SwapOutcome> {
        self.enter(now)?;
        let result = self.swap_inner(ledger, oracle, i, j, dx, min_dy, now);
        self.exit();
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn swap_inner<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        i: usize,
        j: usize,
        dx: Amount,
        min_dy: Amount,
        now: Timestamp,
    ) -> Result<SwapOutcome> {
        self.require_active()?;
        self.require_registered(ledger)?;
        let plan = self.plan_swap(oracle, i, j, dx, now)?;

        if plan.payout < min_dy {
            return Err(PoolError::InsufficientSwapOutAmount);
        }

        // Commit.
        self.settle_supply_drift(ledger, plan.new_d)?;
        self.balances[i] = plan.new_balance_in;
        self.balances[j] = plan.new_balance_out;
        self.raw_balances[i] = self.raw_balances[i].safe_add(&dx)?;
        self.raw_balances[j] = self.raw_balances[j].safe_sub(&plan.payout)?;
        log::debug!(
            "pool {}: swap {i}->{j} in={dx} out={} fee={}",
            self.address,
            plan.payout,
            plan.fee
        );
        SwapOutcome::new(dx, plan.payout, plan.fee)
    }

    /// Pure preview of [`swap`](Self::swap): returns the native payout
    /// and the normalized fee.
    ///
    /// # Errors
    ///
    /// Same validation failures as `swap`, minus the slippage check.
    pub fn get_swap_amount<O: RateOracle>(
        &self,
        oracle: &O,
        i: usize,
        j: usize,
        dx: Amount,
        now: Timestamp,
    ) -> Result<(Amount, Amount)> {
        let plan = self.plan_swap(oracle, i, j, dx, now)?;
        Ok((plan.payout, plan.fee))
    }

    fn plan_swap<O: RateOracle>(
        &self,
        oracle: &O,
        i: usize,
        j: usize,
        dx: Amount,
        now: Timestamp,
    ) -> Result<SwapPlan> {
        self.check_index(i)?;
        self.check_index(j)?;
        if i == j {
            return Err(PoolError::SameTokenInTokenOut);
        }
        if dx.is_zero() {
            return Err(PoolError::InvalidQuantity("swap input must be positive"));
        }
        if self.total_supply.is_zero() {
            return Err(PoolError::InvalidQuantity("pool has no liquidity"));
        }

        let a = self.ramp.get_a(now);
        self.check_tracked_supply(a)?;

        let rate_in = self.fresh_rate(oracle, i, now)?;
        let rate_out = self.fresh_rate(oracle, j, now)?;
        let dx_norm = self.normalize(i, dx, &rate_in)?;

        let mut balances = self.balances.clone();
        balances[i] = balances[i].safe_add(&dx_norm)?;

        let d = self.total_supply;
        let y_new = solver::compute_y(&raw(&balances), j, d.get(), a)?;
        let gross = self.balances[j]
            .get()
            .checked_sub(y_new)
            .and_then(|v| v.checked_sub(Y_ROUNDING_MARGIN))
            .ok_or(PoolError::InsufficientSwapOutAmount)?;

        let fee_rate = self.dynamic_swap_fee(balances[i].get(), y_new)?;
        let fee = Amount::new(mul_div(gross, fee_rate, FEE_DENOMINATOR, Rounding::Up)?);
        let dy_norm = Amount::new(gross).safe_sub(&fee)?;
        let payout = self.denormalize(j, dy_norm, &rate_out)?;
        if payout.is_zero() {
            return Err(PoolError::InsufficientSwapOutAmount);
        }

        // Fee stays in the pool: the output balance keeps it.
        let new_balance_out = Amount::new(y_new).safe_add(&fee)?;
        balances[j] = new_balance_out;
        let new_d = Amount::new(solver::compute_d(&raw(&balances), a)?);

        let drift = if new_d >= d {
            new_d.safe_sub(&d)?
        } else {
            d.safe_sub(&new_d)?
        };
        if drift > self.max_delta_d.safe_add(&fee)? {
            return Err(PoolError::ImbalancedPool("swap invariant drift"));
        }

        Ok(SwapPlan {
            new_balance_in: balances[i],
            new_balance_out,
            payout,
            fee,
            new_d,
        })
    }

    // -- settlement: redeem --------------------------------------------------

    /// Redeems `amount` of the caller's claim proportionally across the
    /// basket.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InsufficientRedeemAmount`] if any payout is below
    ///   the corresponding entry of `min_amounts`.
    pub fn redeem_proportion<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        caller: Address,
        amount: Amount,
        min_amounts: &[Amount],
        now: Timestamp,
    ) -> Result<RedeemOutcome> {
        self.enter(now)?;
        let result = self.redeem_proportion_inner(ledger, oracle, caller, amount, min_amounts, now);
        self.exit();
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn redeem_proportion_inner<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        caller: Address,
        amount: Amount,
        min_amounts: &[Amount],
        now: Timestamp,
    ) -> Result<RedeemOutcome> {
        self.require_active()?;
        self.require_registered(ledger)?;
        if min_amounts.len() != self.tokens.len() {
            return Err(PoolError::MismatchedLengths);
        }
        let plan = self.plan_redeem_proportion(oracle, amount, now)?;

        for (payout, min) in plan.payouts.iter().zip(min_amounts) {
            if payout < min {
                return Err(PoolError::InsufficientRedeemAmount);
            }
        }

        // Commit.
        ledger.burn(self.address, caller, amount)?;
        if !plan.fee.is_zero() {
            ledger.add_total_supply(self.address, plan.fee)?;
        }
        for (i, payout) in plan.payouts.iter().enumerate() {
            self.raw_balances[i] = self.raw_balances[i].safe_sub(payout)?;
        }
        self.balances = plan.new_balances;
        self.total_supply = plan.new_d;
        log::debug!(
            "pool {}: redeem_proportion burned={amount} fee={}",
            self.address,
            plan.fee
        );
        RedeemOutcome::new(amount, plan.fee, plan.payouts)
    }

    /// Pure preview of [`redeem_proportion`](Self::redeem_proportion):
    /// per-asset native payouts.
    ///
    /// # Errors
    ///
    /// Same validation failures as `redeem_proportion`, minus the
    /// per-asset minimum checks.
    pub fn get_redeem_proportion_amount<O: RateOracle>(
        &self,
        oracle: &O,
        amount: Amount,
        now: Timestamp,
    ) -> Result<Vec<Amount>> {
        Ok(self.plan_redeem_proportion(oracle, amount, now)?.payouts)
    }

    fn plan_redeem_proportion<O: RateOracle>(
        &self,
        oracle: &O,
        amount: Amount,
        now: Timestamp,
    ) -> Result<RedeemPlan> {
        if amount.is_zero() {
            return Err(PoolError::InvalidQuantity("redeem amount must be positive"));
        }
        if self.total_supply.is_zero() {
            return Err(PoolError::InvalidQuantity("pool has no liquidity"));
        }
        let a = self.ramp.get_a(now);
        self.check_tracked_supply(a)?;

        let fee = self.redeem_fee.apply(amount, Rounding::Up)?;
        let redeem_net = amount.safe_sub(&fee)?;
        if redeem_net.is_zero() {
            return Err(PoolError::InvalidQuantity("redeem amount consumed by fee"));
        }
        let d = self.total_supply;
        if redeem_net > d {
            return Err(PoolError::InsufficientBalance("pool supply"));
        }

        let mut new_balances = self.balances.clone();
        let mut payouts = Vec::with_capacity(self.tokens.len());
        for i in 0..self.tokens.len() {
            let share_norm = Amount::new(mul_div(
                self.balances[i].get(),
                redeem_net.get(),
                d.get(),
                Rounding::Down,
            )?);
            let rate = self.fresh_rate(oracle, i, now)?;
            let payout = self.denormalize(i, share_norm, &rate)?;
            new_balances[i] = new_balances[i].safe_sub(&share_norm)?;
            payouts.push(payout);
        }

        let new_d = d.safe_sub(&redeem_net)?;
        // Proportional withdrawal scales D linearly; verify within
        // tolerance.
        let check_d = Amount::new(solver::compute_d(&raw(&new_balances), a)?);
        let drift = if check_d >= new_d {
            check_d.safe_sub(&new_d)?
        } else {
            new_d.safe_sub(&check_d)?
        };
        if drift > self.max_delta_d {
            return Err(PoolError::ImbalancedPool("proportional redeem drift"));
        }

        Ok(RedeemPlan {
            new_balances,
            payouts,
            fee,
            new_d,
            burned: amount,
        })
    }

    /// Redeems `amount` of the caller's claim entirely into asset `i`.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InsufficientRedeemAmount`] if the payout is below
    ///   `min_redeem`.
    #[allow(clippy::too_many_arguments)]
    pub fn redeem_single<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        caller: Address,
        amount: Amount,
        i: usize,
        min_redeem: Amount,
        now: Timestamp,
    ) -> Result<RedeemOutcome> {
        self.enter(now)?;
        let result = self.redeem_single_inner(ledger, oracle, caller, amount, i, min_redeem, now);
        self.exit();
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn redeem_single_inner<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        caller: Address,
        amount: Amount,
        i: usize,
        min_redeem: Amount,
        now: Timestamp,
    ) -> Result<RedeemOutcome> {
        self.require_active()?;
        self.require_registered(ledger)?;
        let plan = self.plan_redeem_single(oracle, amount, i, now)?;

        let payout = plan.payouts[i];
        if payout < min_redeem {
            return Err(PoolError::InsufficientRedeemAmount);
        }

        // Commit.
        ledger.burn(self.address, caller, amount)?;
        if !plan.fee.is_zero() {
            ledger.add_total_supply(self.address, plan.fee)?;
        }
        self.raw_balances[i] = self.raw_balances[i].safe_sub(&payout)?;
        self.balances = plan.new_balances;
        self.total_supply = plan.new_d;
        log::debug!(
            "pool {}: redeem_single asset={i} burned={amount} fee={}",
            self.address,
            plan.fee
        );
        RedeemOutcome::new(amount, plan.fee, plan.payouts)
    }

    /// Pure preview of [`redeem_single`](Self::redeem_single): the
    /// native payout in asset `i`.
    ///
    /// # Errors
    ///
    /// Same validation failures as `redeem_single`, minus the minimum
    /// check.
    pub fn get_redeem_single_amount<O: RateOracle>(
        &self,
        oracle: &O,
        amount: Amount,
        i: usize,
        now: Timestamp,
    ) -> Result<Amount> {
        Ok(self.plan_redeem_single(oracle, amount, i, now)?.payouts[i])
    }

    fn plan_redeem_single<O: RateOracle>(
        &self,
        oracle: &O,
        amount: Amount,
        i: usize,
        now: Timestamp,
    ) -> Result<RedeemPlan> {
        self.check_index(i)?;
        if amount.is_zero() {
            return Err(PoolError::InvalidQuantity("redeem amount must be positive"));
        }
        if self.total_supply.is_zero() {
            return Err(PoolError::InvalidQuantity("pool has no liquidity"));
        }
        let a = self.ramp.get_a(now);
        self.check_tracked_supply(a)?;

        let fee = self.redeem_fee.apply(amount, Rounding::Up)?;
        let redeem_net = amount.safe_sub(&fee)?;
        if redeem_net.is_zero() {
            return Err(PoolError::InvalidQuantity("redeem amount consumed by fee"));
        }
        let d = self.total_supply;
        let shrunk_d = d.safe_sub(&redeem_net)?;

        let y_new = solver::compute_y(&raw(&self.balances), i, shrunk_d.get(), a)?;
        let dy_norm = self.balances[i]
            .get()
            .checked_sub(y_new)
            .and_then(|v| v.checked_sub(Y_ROUNDING_MARGIN))
            .ok_or(PoolError::InsufficientRedeemAmount)?;

        let rate = self.fresh_rate(oracle, i, now)?;
        let payout = self.denormalize(i, Amount::new(dy_norm), &rate)?;
        if payout.is_zero() {
            return Err(PoolError::InsufficientRedeemAmount);
        }

        let mut new_balances = self.balances.clone();
        new_balances[i] = Amount::new(y_new);

        let check_d = Amount::new(solver::compute_d(&raw(&new_balances), a)?);
        let drift = if check_d >= shrunk_d {
            check_d.safe_sub(&shrunk_d)?
        } else {
            shrunk_d.safe_sub(&check_d)?
        };
        if drift > self.max_delta_d {
            return Err(PoolError::ImbalancedPool("single-asset redeem drift"));
        }

        let mut payouts = vec![Amount::ZERO; self.tokens.len()];
        payouts[i] = payout;
        Ok(RedeemPlan {
            new_balances,
            payouts,
            fee,
            new_d: shrunk_d,
            burned: amount,
        })
    }

    /// Redeems exactly the requested native `amounts`, burning whatever
    /// claim value the invariant demands (fee included), bounded by
    /// `max_redeem`.
    ///
    /// # Errors
    ///
    /// - [`PoolError::MaxRedeemAmount`] if the required burn exceeds
    ///   the caller's ceiling.
    pub fn redeem_multi<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        caller: Address,
        amounts: &[Amount],
        max_redeem: Amount,
        now: Timestamp,
    ) -> Result<RedeemOutcome> {
        self.enter(now)?;
        let result = self.redeem_multi_inner(ledger, oracle, caller, amounts, max_redeem, now);
        self.exit();
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn redeem_multi_inner<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        caller: Address,
        amounts: &[Amount],
        max_redeem: Amount,
        now: Timestamp,
    ) -> Result<RedeemOutcome> {
        self.require_active()?;
        self.require_registered(ledger)?;
        let plan = self.plan_redeem_multi(oracle, amounts, now)?;

        let redeem_amount = plan.burned;
        if redeem_amount > max_redeem {
            return Err(PoolError::MaxRedeemAmount);
        }

        // Commit.
        ledger.burn(self.address, caller, redeem_amount)?;
        if !plan.fee.is_zero() {
            ledger.add_total_supply(self.address, plan.fee)?;
        }
        for (i, amount) in amounts.iter().enumerate() {
            self.raw_balances[i] = self.raw_balances[i].safe_sub(amount)?;
        }
        self.balances = plan.new_balances;
        self.total_supply = plan.new_d;
        log::debug!(
            "pool {}: redeem_multi burned={redeem_amount} fee={}",
            self.address,
            plan.fee
        );
        RedeemOutcome::new(redeem_amount, plan.fee, amounts.to_vec())
    }

    /// Pure preview of [`redeem_multi`](Self::redeem_multi): the claim
    /// value that would be burned, fee included.
    ///
    /// # Errors
    ///
    /// Same validation failures as `redeem_multi`, minus the ceiling
    /// check.
    pub fn get_redeem_multi_amount<O: RateOracle>(
        &self,
        oracle: &O,
        amounts: &[Amount],
        now: Timestamp,
    ) -> Result<Amount> {
        Ok(self.plan_redeem_multi(oracle, amounts, now)?.burned)
    }

    fn plan_redeem_multi<O: RateOracle>(
        &self,
        oracle: &O,
        amounts: &[Amount],
        now: Timestamp,
    ) -> Result<RedeemPlan> {
        if amounts.len() != self.tokens.len() {
            return Err(PoolError::MismatchedLengths);
        }
        if amounts.iter().all(Amount::is_zero) {
            return Err(PoolError::InvalidQuantity("redeem requires an amount"));
        }
        if self.total_supply.is_zero() {
            return Err(PoolError::InvalidQuantity("pool has no liquidity"));
        }
        let a = self.ramp.get_a(now);
        self.check_tracked_supply(a)?;

        let mut new_balances = self.balances.clone();
        for (i, amount) in amounts.iter().enumerate() {
            if amount.is_zero() {
                continue;
            }
            let rate = self.fresh_rate(oracle, i, now)?;
            let normalized = self.normalize(i, *amount, &rate)?;
            new_balances[i] = new_balances[i]
                .checked_sub(&normalized)
                .ok_or(PoolError::InsufficientBalance("pool asset balance"))?;
        }

        let d = self.total_supply;
        let new_d = Amount::new(solver::compute_d(&raw(&new_balances), a)?);
        // redeem = ΔD · (1 + redeem_fee)
        let delta = d.safe_sub(&new_d)?;
        let fee = self.redeem_fee.apply(delta, Rounding::Up)?;
        let burned = delta.safe_add(&fee)?;

        Ok(RedeemPlan {
            new_balances,
            payouts: amounts.to_vec(),
            fee,
            new_d,
            burned,
        })
    }

    // -- settlement: donate --------------------------------------------------

    /// Deposits `amounts` and redistributes the entire resulting
    /// invariant growth to existing holders, minting nothing to the
    /// caller.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InsufficientMintAmount`] if the donation value is
    ///   below `min_donation`.
    pub fn donate<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        amounts: &[Amount],
        min_donation: Amount,
        now: Timestamp,
    ) -> Result<Amount> {
        self.enter(now)?;
        let result = self.donate_inner(ledger, oracle, amounts, min_donation, now);
        self.exit();
        result
    }

    fn donate_inner<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        amounts: &[Amount],
        min_donation: Amount,
        now: Timestamp,
    ) -> Result<Amount> {
        self.require_active()?;
        self.require_registered(ledger)?;
        if self.total_supply.is_zero() {
            return Err(PoolError::InvalidQuantity(
                "donation requires existing liquidity",
            ));
        }
        let (new_balances, donation, _) = self.plan_mint(oracle, amounts, now)?;
        if donation < min_donation {
            return Err(PoolError::InsufficientMintAmount);
        }

        // Commit.
        ledger.add_total_supply(self.address, donation)?;
        for (i, amount) in amounts.iter().enumerate() {
            self.raw_balances[i] = self.raw_balances[i].safe_add(amount)?;
        }
        self.total_supply = self.total_supply.safe_add(&donation)?;
        self.balances = new_balances;
        log::debug!("pool {}: donation of {donation}", self.address);
        Ok(donation)
    }

    // -- rebase & loss -------------------------------------------------------

    /// Records an external native-unit deposit into asset `i` — value
    /// that arrived outside mint/swap/redeem settlement. Recognized as
    /// fee growth at the next [`rebase`](Self::rebase).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidToken`] for an out-of-range index.
    pub fn credit_raw(&mut self, i: usize, amount: Amount) -> Result<()> {
        self.check_index(i)?;
        self.raw_balances[i] = self.raw_balances[i].safe_add(&amount)?;
        self.untracked_in[i] = self.untracked_in[i].safe_add(&amount)?;
        Ok(())
    }

    /// Separates balance growth since the last settlement into trading
    /// fees and external yield, and recognizes both through the ledger.
    ///
    /// A component at or below its configured error margin is dropped as
    /// rounding noise and left pending. A net *loss* is never applied
    /// here: the call fails with [`PoolError::PendingLoss`] and state is
    /// untouched until the governor runs
    /// [`distribute_loss`](Self::distribute_loss).
    ///
    /// Allowed while paused — a rebase carries no caller funds.
    ///
    /// # Errors
    ///
    /// - [`PoolError::PendingLoss`] on a detected net loss.
    /// - [`PoolError::ImbalancedPool`] if the recognized growth exceeds
    ///   the drift tolerance.
    pub fn rebase<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        now: Timestamp,
    ) -> Result<RebaseOutcome> {
        self.enter(now)?;
        let result = self.rebase_inner(ledger, oracle, now);
        self.exit();
        result
    }

    fn rebase_inner<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        now: Timestamp,
    ) -> Result<RebaseOutcome> {
        self.require_registered(ledger)?;
        if self.total_supply.is_zero() {
            return Ok(RebaseOutcome::default());
        }
        let split = self.plan_rebase(oracle, now)?;
        let d_old = self.total_supply;

        if split.d_full < d_old {
            let net_loss = d_old.safe_sub(&split.d_full)?;
            if net_loss <= self.yield_error_margin {
                // Rounding noise; leave it pending.
                return Ok(RebaseOutcome::default());
            }
            return Err(PoolError::PendingLoss);
        }
        let net = split.d_full.safe_sub(&d_old)?;

        // Attribute untracked-deposit growth as fee, the rest as yield.
        let fee_raw = split.d_fee.checked_sub(&d_old).unwrap_or(Amount::ZERO).min(net);
        let yield_raw = net.safe_sub(&fee_raw)?;
        let fee = if fee_raw > self.fee_error_margin {
            fee_raw
        } else {
            Amount::ZERO
        };
        let yield_amount = if yield_raw > self.yield_error_margin {
            yield_raw
        } else {
            Amount::ZERO
        };
        let outcome = RebaseOutcome::new(fee, yield_amount);
        let total = fee.safe_add(&yield_amount)?;
        if total.is_zero() {
            return Ok(outcome);
        }
        if total > self.max_delta_d {
            return Err(PoolError::ImbalancedPool("rebase drift"));
        }

        // Commit. Supply grows by the recognized components only;
        // margin-dropped dust stays inside the drift tolerance.
        ledger.add_total_supply(self.address, total)?;
        self.balances = split.full_balances;
        self.total_supply = d_old.safe_add(&total)?;
        self.untracked_in = vec![Amount::ZERO; self.tokens.len()];
        log::info!("pool {}: rebase {outcome}", self.address);
        Ok(outcome)
    }

    /// Applies a detected net loss: the buffer absorbs what it can
    /// (shortfall recorded as bad debt for future rebases to repay) and
    /// the remainder cuts the ledger supply directly. Governor only.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Unauthorized`] for non-governor callers.
    /// - [`PoolError::InvalidQuantity`] if there is no loss to apply.
    pub fn distribute_loss<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        caller: Address,
        now: Timestamp,
    ) -> Result<Amount> {
        self.enter(now)?;
        let result = self.distribute_loss_inner(ledger, oracle, caller, now);
        self.exit();
        result
    }

    fn distribute_loss_inner<O: RateOracle>(
        &mut self,
        ledger: &mut ShareLedger,
        oracle: &O,
        caller: Address,
        now: Timestamp,
    ) -> Result<Amount> {
        self.require_governor(caller)?;
        self.require_registered(ledger)?;
        if self.total_supply.is_zero() {
            return Err(PoolError::InvalidQuantity("pool has no liquidity"));
        }
        let split = self.plan_rebase(oracle, now)?;
        if split.d_full >= self.total_supply {
            return Err(PoolError::InvalidQuantity("no loss to distribute"));
        }
        let loss = self.total_supply.safe_sub(&split.d_full)?;

        // Buffer first; the uncovered remainder cuts holder balances and
        // is recorded as debt so future gains refill the buffer before
        // reaching holders.
        let buffered = loss.min(ledger.buffer_amount());
        let uncovered = loss.safe_sub(&buffered)?;
        if !buffered.is_zero() {
            ledger.remove_total_supply(self.address, buffered, true, false)?;
        }
        if !uncovered.is_zero() {
            ledger.remove_total_supply(self.address, uncovered, false, false)?;
            ledger.remove_total_supply(self.address, uncovered, true, true)?;
        }

        self.balances = split.full_balances;
        self.total_supply = split.d_full;
        self.untracked_in = vec![Amount::ZERO; self.tokens.len()];
        log::warn!("pool {}: loss of {loss} distributed", self.address);
        Ok(loss)
    }

    /// Computes the two rebase views: tracked balances plus untracked
    /// deposits at the *tracked* normalization (`d_fee`, isolating fee
    /// growth), and full raw holdings at the latest rates (`d_full`).
    fn plan_rebase<O: RateOracle>(&self, oracle: &O, now: Timestamp) -> Result<RebaseSplit> {
        let a = self.ramp.get_a(now);

        let n = self.tokens.len();
        let mut fee_balances = self.balances.clone();
        let mut full_balances = Vec::with_capacity(n);
        for i in 0..n {
            let rate = self.fresh_rate(oracle, i, now)?;
            let untracked_norm = self.normalize(i, self.untracked_in[i], &rate)?;
            fee_balances[i] = fee_balances[i].safe_add(&untracked_norm)?;
            full_balances.push(self.normalize(i, self.raw_balances[i], &rate)?);
        }

        let d_fee = Amount::new(solver::compute_d(&raw(&fee_balances), a)?);
        let d_full = Amount::new(solver::compute_d(&raw(&full_balances), a)?);

        Ok(RebaseSplit {
            full_balances,
            d_fee,
            d_full,
        })
    }

    // -- governance ----------------------------------------------------------

    /// Suspends settlement. Governor or admin only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotAdmin`] for other callers.
    pub fn pause(&mut self, caller: Address) -> Result<()> {
        self.require_admin(caller)?;
        self.paused = true;
        log::info!("pool {}: paused", self.address);
        Ok(())
    }

    /// Resumes settlement. Governor or admin only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotAdmin`] for other callers.
    pub fn unpause(&mut self, caller: Address) -> Result<()> {
        self.require_admin(caller)?;
        self.paused = false;
        log::info!("pool {}: unpaused", self.address);
        Ok(())
    }

    /// Replaces the mint fee. Governor or admin only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotAdmin`] for other callers.
    pub fn set_mint_fee(&mut self, caller: Address, fee: FeeRate) -> Result<()> {
        self.require_admin(caller)?;
        self.mint_fee = fee;
        Ok(())
    }

    /// Replaces the swap fee. Governor or admin only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotAdmin`] for other callers.
    pub fn set_swap_fee(&mut self, caller: Address, fee: FeeRate) -> Result<()> {
        self.require_admin(caller)?;
        self.swap_fee = fee;
        Ok(())
    }

    /// Replaces the redeem fee. Governor or admin only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotAdmin`] for other callers.
    pub fn set_redeem_fee(&mut self, caller: Address, fee: FeeRate) -> Result<()> {
        self.require_admin(caller)?;
        self.redeem_fee = fee;
        Ok(())
    }

    /// Replaces the off-peg fee multiplier. Governor or admin only.
    ///
    /// # Errors
    ///
    /// - [`PoolError::NotAdmin`] for other callers.
    /// - [`PoolError::InvalidConfiguration`] below 1×.
    pub fn set_off_peg_multiplier(&mut self, caller: Address, multiplier: u64) -> Result<()> {
        self.require_admin(caller)?;
        if (multiplier as u128) < FEE_DENOMINATOR {
            return Err(PoolError::InvalidConfiguration(
                "off-peg multiplier must be at least 1x",
            ));
        }
        self.off_peg_multiplier = multiplier;
        Ok(())
    }

    /// Adds an admin. Governor only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Unauthorized`] for other callers.
    pub fn add_admin(&mut self, caller: Address, admin: Address) -> Result<()> {
        self.require_governor(caller)?;
        self.admins.insert(admin);
        Ok(())
    }

    /// Removes an admin. Governor only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Unauthorized`] for other callers.
    pub fn remove_admin(&mut self, caller: Address, admin: Address) -> Result<()> {
        self.require_governor(caller)?;
        self.admins.remove(&admin);
        Ok(())
    }

    /// Schedules an amplification ramp. Governor or admin only;
    /// delegates the safety checks to [`AmpRamp::ramp_a`].
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotAdmin`] for other callers, plus every
    /// ramp validation error.
    pub fn ramp_a(
        &mut self,
        caller: Address,
        new_a: u128,
        end_time: Timestamp,
        now: Timestamp,
    ) -> Result<()> {
        self.require_admin(caller)?;
        self.ramp.ramp_a(new_a, end_time, now)
    }

    /// Freezes the amplification ramp at its current value. Governor or
    /// admin only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotAdmin`] for other callers.
    pub fn stop_ramp(&mut self, caller: Address, now: Timestamp) -> Result<()> {
        self.require_admin(caller)?;
        self.ramp.stop_ramp(now);
        Ok(())
    }

    // -- internals -----------------------------------------------------------

    fn enter(&mut self, now: Timestamp) -> Result<()> {
        if self.entered {
            return Err(PoolError::Reentrancy);
        }
        if now < self.last_activity {
            return Err(PoolError::NonMonotonicTime);
        }
        self.entered = true;
        self.last_activity = now;
        Ok(())
    }

    fn exit(&mut self) {
        self.entered = false;
    }

    fn require_active(&self) -> Result<()> {
        if self.paused {
            return Err(PoolError::PoolPaused);
        }
        Ok(())
    }

    fn require_registered(&self, ledger: &ShareLedger) -> Result<()> {
        if ledger.is_pool(&self.address) {
            Ok(())
        } else {
            Err(PoolError::NoPool)
        }
    }

    fn require_admin(&self, caller: Address) -> Result<()> {
        if self.is_admin(&caller) {
            Ok(())
        } else {
            Err(PoolError::NotAdmin)
        }
    }

    fn require_governor(&self, caller: Address) -> Result<()> {
        if caller == self.governor {
            Ok(())
        } else {
            Err(PoolError::Unauthorized("governor"))
        }
    }

    fn check_index(&self, i: usize) -> Result<()> {
        if i >= self.tokens.len() {
            return Err(PoolError::InvalidToken("token index out of range"));
        }
        Ok(())
    }

    fn fresh_rate<O: RateOracle>(&self, oracle: &O, i: usize, now: Timestamp) -> Result<ExchangeRate> {
        let rate = oracle.rate(&self.tokens[i])?;
        rate.ensure_fresh(now, self.max_rate_age)?;
        Ok(rate)
    }

    /// Native → common unit: `amount · precision · rate / 10^rate_dec`.
    fn normalize(&self, i: usize, amount: Amount, rate: &ExchangeRate) -> Result<Amount> {
        let scaled = amount
            .checked_mul(&Amount::new(self.precisions[i]))
            .ok_or(PoolError::Overflow("normalized amount overflow"))?;
        Ok(Amount::new(mul_div(
            scaled.get(),
            rate.value(),
            rate.denominator(),
            Rounding::Down,
        )?))
    }

    /// Common unit → native: `amount · 10^rate_dec / rate / precision`.
    fn denormalize(&self, i: usize, amount: Amount, rate: &ExchangeRate) -> Result<Amount> {
        let unscaled = mul_div(amount.get(), rate.denominator(), rate.value(), Rounding::Down)?;
        Ok(Amount::new(unscaled / self.precisions[i]))
    }

    /// Verifies that the tracked supply still matches the invariant of
    /// the tracked balances, bounding unsettled drift before any
    /// settlement proceeds.
    fn check_tracked_supply(&self, a: u128) -> Result<()> {
        if self.total_supply.is_zero() {
            return Ok(());
        }
        let d_now = Amount::new(solver::compute_d(&raw(&self.balances), a)?);
        let drift = if d_now >= self.total_supply {
            d_now.safe_sub(&self.total_supply)?
        } else {
            self.total_supply.safe_sub(&d_now)?
        };
        if drift > self.max_delta_d {
            return Err(PoolError::ImbalancedPool("tracked supply diverged"));
        }
        Ok(())
    }

    /// Reconciles the post-swap invariant with the ledger: fee growth is
    /// redistributed, rounding dust is trued up in whichever direction
    /// it fell.
    fn settle_supply_drift(&mut self, ledger: &mut ShareLedger, new_d: Amount) -> Result<()> {
        if new_d > self.total_supply {
            ledger.add_total_supply(self.address, new_d.safe_sub(&self.total_supply)?)?;
        } else if new_d < self.total_supply {
            ledger.remove_total_supply(
                self.address,
                self.total_supply.safe_sub(&new_d)?,
                false,
                false,
            )?;
        }
        self.total_supply = new_d;
        Ok(())
    }

    /// Effective swap fee rate in parts per `10^10`, scaled up when the
    /// pool trades away from peg.
    ///
    /// With the multiplier at 1× this is exactly the flat swap fee; at
    /// higher multipliers the fee grows as the post-trade balances of
    /// the two legs diverge:
    ///
    /// ```text
    /// rate = mul · fee / ((mul − 1) · 4·x_i·x_j / (x_i+x_j)² + 1)
    /// ```
    ///
    /// (all terms in `FEE_DENOMINATOR` fixed point).
    fn dynamic_swap_fee(&self, xi: u128, xj: u128) -> Result<u128> {
        let fee = u128::from(self.swap_fee.get());
        let mul = u128::from(self.off_peg_multiplier);
        if mul <= FEE_DENOMINATOR || fee == 0 {
            return Ok(fee);
        }
        let sum = xi
            .checked_add(xj)
            .ok_or(PoolError::Overflow("dynamic fee balance sum overflow"))?;
        if sum == 0 {
            return Ok(fee);
        }
        // peg_ratio = 4·xi·xj / (xi+xj)², in FEE_DENOMINATOR fixed
        // point; 1.0 at peg, toward 0 as the legs diverge.
        let four_xi = 4u128
            .checked_mul(xi)
            .ok_or(PoolError::Overflow("dynamic fee 4x overflow"))?;
        let partial = mul_div(four_xi, FEE_DENOMINATOR, sum, Rounding::Down)?;
        let peg_ratio = mul_div(partial, xj, sum, Rounding::Down)?;

        let excess = mul - FEE_DENOMINATOR;
        let denominator = mul_div(excess, peg_ratio, FEE_DENOMINATOR, Rounding::Down)?
            .checked_add(FEE_DENOMINATOR)
            .ok_or(PoolError::Overflow("dynamic fee denominator overflow"))?;
        mul_div(mul, fee, denominator, Rounding::Down)
    }
}

fn raw(balances: &[Amount]) -> Vec<u128> {
    balances.iter().map(Amount::get).collect()
}

struct SwapPlan {
    new_balance_in: Amount,
    new_balance_out: Amount,
    payout: Amount,
    fee: Amount,
    new_d: Amount,
}

struct RedeemPlan {
    new_balances: Vec<Amount>,
    payouts: Vec<Amount>,
    fee: Amount,
    new_d: Amount,
    burned: Amount,
}

struct RebaseSplit {
    full_balances: Vec<Amount>,
    d_fee: Amount,
    d_full: Amount,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::domain::Decimals;
    use crate::ledger::DEAD_SHARES;
    use crate::rates::{IdentityOracle, PostedRates};

    const WAD: u128 = 1_000_000_000_000_000_000;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 32])
    }

    const GOV: u8 = 0xA0;
    const POOL: u8 = 0xB0;
    const ALICE: u8 = 1;
    const BOB: u8 = 2;

    fn tok(byte: u8) -> Token {
        let Ok(d) = Decimals::new(18) else {
            panic!("valid decimals");
        };
        Token::new(Address::from_bytes([byte; 32]), d)
    }

    fn config(a: u128, swap_fee: u64, mint_fee: u64, redeem_fee: u64) -> PoolConfig {
        let Ok(mint) = FeeRate::new(mint_fee) else {
            panic!("valid fee");
        };
        let Ok(swap) = FeeRate::new(swap_fee) else {
            panic!("valid fee");
        };
        let Ok(redeem) = FeeRate::new(redeem_fee) else {
            panic!("valid fee");
        };
        let Ok(cfg) = PoolConfig::new(
            vec![tok(0x10), tok(0x11)],
            mint,
            swap,
            redeem,
            a,
            addr(GOV),
        ) else {
            panic!("valid config");
        };
        cfg.with_max_delta_d(Amount::new(100 * WAD))
    }

    /// A registered pool/ledger pair plus an identity oracle, no fees.
    fn setup() -> (StablePool, ShareLedger, IdentityOracle) {
        setup_with(config(100, 0, 0, 0))
    }

    fn setup_with(cfg: PoolConfig) -> (StablePool, ShareLedger, IdentityOracle) {
        let Ok(pool) = StablePool::new(addr(POOL), &cfg) else {
            panic!("valid pool");
        };
        let mut ledger = ShareLedger::new(addr(GOV), FeeRate::ZERO);
        let Ok(()) = ledger.add_pool(addr(GOV), addr(POOL)) else {
            panic!("expected Ok");
        };
        (pool, ledger, IdentityOracle::new(Timestamp::ZERO))
    }

    fn t(seconds: u64) -> Timestamp {
        Timestamp::new(seconds)
    }

    fn seed(pool: &mut StablePool, ledger: &mut ShareLedger, oracle: &IdentityOracle) {
        let amounts = [Amount::new(1_000 * WAD), Amount::new(1_000 * WAD)];
        let Ok(_) = pool.mint(ledger, oracle, addr(ALICE), &amounts, Amount::ZERO, t(0)) else {
            panic!("seed mint");
        };
    }

    fn bal(ledger: &ShareLedger, account: u8) -> Amount {
        let Ok(b) = ledger.balance_of(&addr(account)) else {
            panic!("balance conversion");
        };
        b
    }

    // -- mint -----------------------------------------------------------------

    #[test]
    fn first_mint_equals_invariant() {
        let (mut pool, mut ledger, oracle) = setup();
        let amounts = [Amount::new(1_000 * WAD), Amount::new(1_000 * WAD)];
        let Ok(outcome) = pool.mint(&mut ledger, &oracle, addr(ALICE), &amounts, Amount::ZERO, t(0))
        else {
            panic!("expected Ok");
        };

        // Balanced first deposit mints D = sum of deposits, fee-free.
        let minted = outcome.minted().get();
        assert!(minted.abs_diff(2_000 * WAD) <= 2, "minted = {minted}");
        assert_eq!(outcome.fee(), Amount::ZERO);

        // The holder balance carries the dead-share offset.
        let holder = bal(&ledger, ALICE).get();
        assert!(minted - holder <= DEAD_SHARES + 1, "holder = {holder}");
        assert_eq!(pool.total_supply(), ledger.total_supply());
    }

    #[test]
    fn first_mint_requires_every_asset() {
        let (mut pool, mut ledger, oracle) = setup();
        let amounts = [Amount::new(1_000 * WAD), Amount::ZERO];
        let result = pool.mint(&mut ledger, &oracle, addr(ALICE), &amounts, Amount::ZERO, t(0));
        assert!(matches!(result, Err(PoolError::InvalidQuantity(_))));
    }

    #[test]
    fn mint_mismatched_lengths() {
        let (mut pool, mut ledger, oracle) = setup();
        let amounts = [Amount::new(WAD)];
        let result = pool.mint(&mut ledger, &oracle, addr(ALICE), &amounts, Amount::ZERO, t(0));
        assert_eq!(result, Err(PoolError::MismatchedLengths));
    }

    #[test]
    fn mint_slippage_guard() {
        let (mut pool, mut ledger, oracle) = setup();
        let amounts = [Amount::new(1_000 * WAD), Amount::new(1_000 * WAD)];
        let result = pool.mint(
            &mut ledger,
            &oracle,
            addr(ALICE),
            &amounts,
            Amount::new(2_001 * WAD),
            t(0),
        );
        assert_eq!(result, Err(PoolError::InsufficientMintAmount));
        // Failed mint leaves no trace.
        assert!(pool.total_supply().is_zero());
        assert!(ledger.total_supply().is_zero());
    }

    #[test]
    fn mint_fee_charged_after_first_deposit() {
        // 1% mint fee.
        let (mut pool, mut ledger, oracle) = setup_with(config(100, 0, 100_000_000, 0));
        seed(&mut pool, &mut ledger, &oracle);

        let amounts = [Amount::new(100 * WAD), Amount::new(100 * WAD)];
        let Ok(outcome) = pool.mint(&mut ledger, &oracle, addr(BOB), &amounts, Amount::ZERO, t(1))
        else {
            panic!("expected Ok");
        };
        let fee = outcome.fee().get();
        assert!(fee.abs_diff(2 * WAD) <= WAD / 1_000, "fee = {fee}");
        assert_eq!(pool.total_supply(), ledger.total_supply());
    }

    #[test]
    fn get_mint_amount_matches_mint() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);

        let amounts = [Amount::new(70 * WAD), Amount::new(30 * WAD)];
        let Ok((net_preview, fee_preview)) = pool.get_mint_amount(&oracle, &amounts, t(1)) else {
            panic!("expected Ok");
        };
        let Ok(outcome) = pool.mint(&mut ledger, &oracle, addr(BOB), &amounts, Amount::ZERO, t(1))
        else {
            panic!("expected Ok");
        };
        assert_eq!(outcome.minted(), net_preview);
        assert_eq!(outcome.fee(), fee_preview);
    }

    // -- swap -----------------------------------------------------------------

    #[test]
    fn swap_at_peg_low_slippage() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);
        let d_before = pool.total_supply();

        let Ok(outcome) = pool.swap(
            &mut ledger,
            &oracle,
            0,
            1,
            Amount::new(100 * WAD),
            Amount::ZERO,
            t(1),
        ) else {
            panic!("expected Ok");
        };

        let dy = outcome.amount_out().get();
        assert!(dy < 100 * WAD, "dy = {dy}");
        assert!(dy > 99 * WAD, "dy = {dy}");
        assert_eq!(outcome.fee(), Amount::ZERO);

        // Invariant held within tolerance.
        let d_after = pool.total_supply();
        let drift = d_after.get().abs_diff(d_before.get());
        assert!(drift <= 100, "drift = {drift}");
    }

    #[test]
    fn swap_same_token_rejected() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);
        let result = pool.swap(&mut ledger, &oracle, 1, 1, Amount::new(WAD), Amount::ZERO, t(1));
        assert_eq!(result, Err(PoolError::SameTokenInTokenOut));
    }

    #[test]
    fn swap_empty_pool_rejected() {
        let (mut pool, mut ledger, oracle) = setup();
        let result = pool.swap(&mut ledger, &oracle, 0, 1, Amount::new(WAD), Amount::ZERO, t(0));
        assert!(matches!(result, Err(PoolError::InvalidQuantity(_))));
    }

    #[test]
    fn swap_min_dy_guard() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);
        let Ok((dy, _)) = pool.get_swap_amount(&oracle, 0, 1, Amount::new(10 * WAD), t(1)) else {
            panic!("expected Ok");
        };
        let result = pool.swap(
            &mut ledger,
            &oracle,
            0,
            1,
            Amount::new(10 * WAD),
            Amount::new(dy.get() + 1),
            t(1),
        );
        assert_eq!(result, Err(PoolError::InsufficientSwapOutAmount));
    }

    #[test]
    fn swap_fee_reduces_payout() {
        let dx = Amount::new(50 * WAD);

        let (mut free_pool, mut free_ledger, oracle) = setup();
        seed(&mut free_pool, &mut free_ledger, &oracle);
        let Ok(free) = free_pool.swap(&mut free_ledger, &oracle, 0, 1, dx, Amount::ZERO, t(1))
        else {
            panic!("expected Ok");
        };

        // 0.1% swap fee.
        let (mut fee_pool, mut fee_ledger, oracle) = setup_with(config(100, 10_000_000, 0, 0));
        seed(&mut fee_pool, &mut fee_ledger, &oracle);
        let Ok(charged) = fee_pool.swap(&mut fee_ledger, &oracle, 0, 1, dx, Amount::ZERO, t(1))
        else {
            panic!("expected Ok");
        };

        assert!(charged.amount_out() < free.amount_out());
        assert!(charged.fee().get() > 0);
        // Fee is retained by the pool and credited to holders.
        assert!(fee_ledger.total_supply() > Amount::new(2_000 * WAD));
    }

    #[test]
    fn get_swap_amount_is_pure() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);
        let before = pool.clone();
        let Ok(_) = pool.get_swap_amount(&oracle, 0, 1, Amount::new(10 * WAD), t(1)) else {
            panic!("expected Ok");
        };
        assert_eq!(pool, before);
    }

    // -- redeem ---------------------------------------------------------------

    #[test]
    fn redeem_proportion_full_supply() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);

        let amount = bal(&ledger, ALICE);
        let Ok(outcome) = pool.redeem_proportion(
            &mut ledger,
            &oracle,
            addr(ALICE),
            amount,
            &[Amount::ZERO, Amount::ZERO],
            t(1),
        ) else {
            panic!("expected Ok");
        };

        let total_out: u128 = outcome.payouts().iter().map(Amount::get).sum();
        assert!(
            (2_000 * WAD) - total_out <= 2 * DEAD_SHARES + 2,
            "payouts sum = {total_out}"
        );
        // Only the dead shares remain.
        assert_eq!(ledger.total_shares().get(), DEAD_SHARES);
        assert!(pool.total_supply().get() <= DEAD_SHARES + 1);
    }

    #[test]
    fn redeem_proportion_min_guard() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);
        let result = pool.redeem_proportion(
            &mut ledger,
            &oracle,
            addr(ALICE),
            Amount::new(100 * WAD),
            &[Amount::new(51 * WAD), Amount::ZERO],
            t(1),
        );
        assert_eq!(result, Err(PoolError::InsufficientRedeemAmount));
    }

    #[test]
    fn redeem_single_near_peg() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);

        let Ok(outcome) = pool.redeem_single(
            &mut ledger,
            &oracle,
            addr(ALICE),
            Amount::new(100 * WAD),
            0,
            Amount::ZERO,
            t(1),
        ) else {
            panic!("expected Ok");
        };
        let payout = outcome.payouts()[0].get();
        assert!(payout < 100 * WAD, "payout = {payout}");
        assert!(payout > 99 * WAD, "payout = {payout}");
        assert_eq!(outcome.payouts()[1], Amount::ZERO);
    }

    #[test]
    fn redeem_multi_burns_about_requested_value() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);

        let amounts = [Amount::new(50 * WAD), Amount::new(50 * WAD)];
        let Ok(outcome) = pool.redeem_multi(
            &mut ledger,
            &oracle,
            addr(ALICE),
            &amounts,
            Amount::new(101 * WAD),
            t(1),
        ) else {
            panic!("expected Ok");
        };
        let burned = outcome.burned().get();
        assert!(burned.abs_diff(100 * WAD) <= WAD / 100, "burned = {burned}");
    }

    #[test]
    fn redeem_multi_ceiling_guard() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);
        let amounts = [Amount::new(50 * WAD), Amount::new(50 * WAD)];
        let result = pool.redeem_multi(
            &mut ledger,
            &oracle,
            addr(ALICE),
            &amounts,
            Amount::new(99 * WAD),
            t(1),
        );
        assert_eq!(result, Err(PoolError::MaxRedeemAmount));
    }

    // -- donate ---------------------------------------------------------------

    #[test]
    fn donation_lifts_every_holder() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);
        let before = bal(&ledger, ALICE);

        let amounts = [Amount::new(10 * WAD), Amount::new(10 * WAD)];
        let Ok(donated) = pool.donate(&mut ledger, &oracle, &amounts, Amount::ZERO, t(1)) else {
            panic!("expected Ok");
        };
        assert!(donated.get() > 19 * WAD);
        assert!(bal(&ledger, ALICE) > before);
        // The donor received nothing.
        assert_eq!(ledger.shares_of(&addr(BOB)), crate::domain::Shares::ZERO);
    }

    // -- pause gating ----------------------------------------------------------

    #[test]
    fn pause_gates_all_settlement() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);
        let Ok(()) = pool.pause(addr(GOV)) else {
            panic!("expected Ok");
        };
        let snapshot_pool = pool.clone();
        let snapshot_supply = ledger.total_supply();

        let one = [Amount::new(WAD), Amount::new(WAD)];
        let mins = [Amount::ZERO, Amount::ZERO];
        assert_eq!(
            pool.mint(&mut ledger, &oracle, addr(ALICE), &one, Amount::ZERO, t(1)),
            Err(PoolError::PoolPaused)
        );
        assert_eq!(
            pool.swap(&mut ledger, &oracle, 0, 1, Amount::new(WAD), Amount::ZERO, t(1)),
            Err(PoolError::PoolPaused)
        );
        assert_eq!(
            pool.redeem_proportion(&mut ledger, &oracle, addr(ALICE), Amount::new(WAD), &mins, t(1)),
            Err(PoolError::PoolPaused)
        );
        assert_eq!(
            pool.redeem_single(
                &mut ledger,
                &oracle,
                addr(ALICE),
                Amount::new(WAD),
                0,
                Amount::ZERO,
                t(1)
            ),
            Err(PoolError::PoolPaused)
        );
        assert_eq!(
            pool.redeem_multi(&mut ledger, &oracle, addr(ALICE), &one, Amount::new(3 * WAD), t(1)),
            Err(PoolError::PoolPaused)
        );
        assert_eq!(
            pool.donate(&mut ledger, &oracle, &one, Amount::ZERO, t(1)),
            Err(PoolError::PoolPaused)
        );

        // No field changed while paused (the timestamps update on entry).
        let mut after = pool.clone();
        after.last_activity = snapshot_pool.last_activity;
        assert_eq!(after, snapshot_pool);
        assert_eq!(ledger.total_supply(), snapshot_supply);

        let Ok(()) = pool.unpause(addr(GOV)) else {
            panic!("expected Ok");
        };
        assert!(pool
            .swap(&mut ledger, &oracle, 0, 1, Amount::new(WAD), Amount::ZERO, t(2))
            .is_ok());
    }

    #[test]
    fn pause_requires_admin() {
        let (mut pool, _, _) = setup();
        assert_eq!(pool.pause(addr(ALICE)), Err(PoolError::NotAdmin));
    }

    // -- rebase ----------------------------------------------------------------

    #[test]
    fn rebase_clean_pool_is_noop() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);
        let Ok(outcome) = pool.rebase(&mut ledger, &oracle, t(1)) else {
            panic!("expected Ok");
        };
        assert_eq!(outcome, RebaseOutcome::default());
    }

    #[test]
    fn rebase_recognizes_untracked_deposit_as_fee() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);
        let before = bal(&ledger, ALICE);

        let Ok(()) = pool.credit_raw(0, Amount::new(10 * WAD)) else {
            panic!("expected Ok");
        };
        let Ok(outcome) = pool.rebase(&mut ledger, &oracle, t(1)) else {
            panic!("expected Ok");
        };

        assert!(outcome.fee().get() > 9 * WAD, "fee = {}", outcome.fee());
        assert_eq!(outcome.yield_amount(), Amount::ZERO);
        assert!(bal(&ledger, ALICE) > before);
        assert_eq!(pool.total_supply(), ledger.total_supply());
    }

    fn posted_oracle(rate0: u128, at: Timestamp) -> PostedRates {
        let mut oracle = PostedRates::new();
        let Ok(r0) = crate::rates::ExchangeRate::new(rate0, 18, at) else {
            panic!("valid rate");
        };
        let Ok(r1) = crate::rates::ExchangeRate::new(WAD, 18, at) else {
            panic!("valid rate");
        };
        oracle.post(tok(0x10).address(), r0);
        oracle.post(tok(0x11).address(), r1);
        oracle
    }

    #[test]
    fn rebase_recognizes_rate_growth_as_yield() {
        let (mut pool, mut ledger, _) = setup();
        let oracle = posted_oracle(WAD, t(0));
        seed_with(&mut pool, &mut ledger, &oracle);

        // Token 0 appreciates 2%.
        let oracle = posted_oracle(WAD * 102 / 100, t(1));
        let Ok(outcome) = pool.rebase(&mut ledger, &oracle, t(1)) else {
            panic!("expected Ok");
        };
        assert!(outcome.fee().is_zero());
        let gain = outcome.yield_amount().get();
        assert!(gain > 19 * WAD, "yield = {gain}");
        assert!(gain < 21 * WAD, "yield = {gain}");
        assert_eq!(pool.total_supply(), ledger.total_supply());
    }

    fn seed_with<O: RateOracle>(pool: &mut StablePool, ledger: &mut ShareLedger, oracle: &O) {
        let amounts = [Amount::new(1_000 * WAD), Amount::new(1_000 * WAD)];
        let Ok(_) = pool.mint(ledger, oracle, addr(ALICE), &amounts, Amount::ZERO, t(0)) else {
            panic!("seed mint");
        };
    }

    #[test]
    fn rebase_loss_requires_governor() {
        let (mut pool, mut ledger, _) = setup();
        let oracle = posted_oracle(WAD, t(0));
        seed_with(&mut pool, &mut ledger, &oracle);
        let supply_before = ledger.total_supply();

        // Token 0 depegs 5%.
        let oracle = posted_oracle(WAD * 95 / 100, t(1));
        assert_eq!(
            pool.rebase(&mut ledger, &oracle, t(1)),
            Err(PoolError::PendingLoss)
        );
        assert_eq!(ledger.total_supply(), supply_before);

        assert_eq!(
            pool.distribute_loss(&mut ledger, &oracle, addr(ALICE), t(1)),
            Err(PoolError::Unauthorized("governor"))
        );

        let Ok(loss) = pool.distribute_loss(&mut ledger, &oracle, addr(GOV), t(1)) else {
            panic!("expected Ok");
        };
        assert!(loss.get() > 40 * WAD, "loss = {loss}");
        assert!(ledger.total_supply() < supply_before);
        assert_eq!(ledger.buffer_bad_debt(), loss);
        // The pool is consistent again: settlement proceeds.
        assert!(pool
            .swap(&mut ledger, &oracle, 0, 1, Amount::new(WAD), Amount::ZERO, t(2))
            .is_ok());
    }

    #[test]
    fn stale_rate_fails_settlement() {
        let (mut pool, mut ledger, _) = setup();
        let oracle = posted_oracle(WAD, t(0));
        seed_with(&mut pool, &mut ledger, &oracle);

        // Default freshness window is one hour; jump past it.
        let result = pool.swap(
            &mut ledger,
            &oracle,
            0,
            1,
            Amount::new(WAD),
            Amount::ZERO,
            t(7_200),
        );
        assert_eq!(result, Err(PoolError::StalePrice));
    }

    // -- time & reentrancy ------------------------------------------------------

    #[test]
    fn time_cannot_move_backward() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);
        let Ok(_) = pool.swap(&mut ledger, &oracle, 0, 1, Amount::new(WAD), Amount::ZERO, t(100))
        else {
            panic!("expected Ok");
        };
        let result = pool.swap(&mut ledger, &oracle, 0, 1, Amount::new(WAD), Amount::ZERO, t(50));
        assert_eq!(result, Err(PoolError::NonMonotonicTime));
    }

    #[test]
    fn reentrancy_flag_blocks_settlement() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);

        pool.entered = true;
        let result = pool.swap(&mut ledger, &oracle, 0, 1, Amount::new(WAD), Amount::ZERO, t(1));
        assert_eq!(result, Err(PoolError::Reentrancy));

        pool.entered = false;
        assert!(pool
            .swap(&mut ledger, &oracle, 0, 1, Amount::new(WAD), Amount::ZERO, t(1))
            .is_ok());
    }

    // -- drift guard ------------------------------------------------------------

    #[test]
    fn corrupted_tracking_is_rejected() {
        let (mut pool, mut ledger, oracle) = setup();
        seed(&mut pool, &mut ledger, &oracle);

        // Tracked balances no longer support the recorded supply.
        pool.balances[0] = Amount::new(500 * WAD);
        let result = pool.swap(&mut ledger, &oracle, 0, 1, Amount::new(WAD), Amount::ZERO, t(1));
        assert!(matches!(result, Err(PoolError::ImbalancedPool(_))));
    }

    // -- governance --------------------------------------------------------------

    #[test]
    fn fee_setters_are_admin_gated() {
        let (mut pool, _, _) = setup();
        let Ok(fee) = FeeRate::new(5_000_000) else {
            panic!("valid fee");
        };
        assert_eq!(
            pool.set_swap_fee(addr(ALICE), fee),
            Err(PoolError::NotAdmin)
        );
        let Ok(()) = pool.add_admin(addr(GOV), addr(BOB)) else {
            panic!("expected Ok");
        };
        let Ok(()) = pool.set_swap_fee(addr(BOB), fee) else {
            panic!("expected Ok");
        };
        assert_eq!(pool.swap_fee(), fee);
    }

    #[test]
    fn admin_management_is_governor_gated() {
        let (mut pool, _, _) = setup();
        assert_eq!(
            pool.add_admin(addr(ALICE), addr(ALICE)),
            Err(PoolError::Unauthorized("governor"))
        );
        let Ok(()) = pool.add_admin(addr(GOV), addr(BOB)) else {
            panic!("expected Ok");
        };
        assert!(pool.is_admin(&addr(BOB)));
        let Ok(()) = pool.remove_admin(addr(GOV), addr(BOB)) else {
            panic!("expected Ok");
        };
        assert!(!pool.is_admin(&addr(BOB)));
    }

    #[test]
    fn ramp_through_pool() {
        let cfg = config(100, 0, 0, 0).with_min_ramp_time(600);
        let (mut pool, _, _) = setup_with(cfg);
        assert_eq!(
            pool.ramp_a(addr(ALICE), 200, t(700), t(0)),
            Err(PoolError::NotAdmin)
        );
        let Ok(()) = pool.ramp_a(addr(GOV), 200, t(700), t(0)) else {
            panic!("expected Ok");
        };
        assert_eq!(pool.get_a(t(350)), 150);
        let Ok(()) = pool.stop_ramp(addr(GOV), t(350)) else {
            panic!("expected Ok");
        };
        assert_eq!(pool.get_a(t(700)), 150);
    }

    #[test]
    fn off_peg_multiplier_raises_fee_away_from_peg() {
        // 0.1% base fee, 5x off-peg multiplier.
        let cfg = config(100, 10_000_000, 0, 0).with_off_peg_multiplier(50_000_000_000);
        let (mut pool, mut ledger, oracle) = setup_with(cfg);
        seed(&mut pool, &mut ledger, &oracle);

        // First push the pool off peg, then compare the effective fee of
        // an identical follow-up swap against the flat-fee pool.
        let Ok(_) = pool.swap(
            &mut ledger,
            &oracle,
            0,
            1,
            Amount::new(600 * WAD),
            Amount::ZERO,
            t(1),
        ) else {
            panic!("expected Ok");
        };
        let Ok((_, off_peg_fee)) = pool.get_swap_amount(&oracle, 0, 1, Amount::new(10 * WAD), t(2))
        else {
            panic!("expected Ok");
        };

        let (mut flat_pool, mut flat_ledger, oracle2) = setup_with(config(100, 10_000_000, 0, 0));
        seed(&mut flat_pool, &mut flat_ledger, &oracle2);
        let Ok(_) = flat_pool.swap(
            &mut flat_ledger,
            &oracle2,
            0,
            1,
            Amount::new(600 * WAD),
            Amount::ZERO,
            t(1),
        ) else {
            panic!("expected Ok");
        };
        let Ok((_, flat_fee)) = flat_pool.get_swap_amount(&oracle2, 0, 1, Amount::new(10 * WAD), t(2))
        else {
            panic!("expected Ok");
        };

        assert!(
            off_peg_fee > flat_fee,
            "off_peg = {off_peg_fee}, flat = {flat_fee}"
        );
    }
}
