//! Rebasing share ledger backing the claim token.
//!
//! The ledger maps accounts to *shares* — a non-rebasing internal unit —
//! while the externally visible claim-token balance is a function of the
//! share price:
//!
//! ```text
//! balance_of(a) = shares[a] · total_supply / total_shares
//! ```
//!
//! Trading fees and external yield raise `total_supply` without touching
//! anyone's shares, so every holder's balance grows in place. Losses run
//! the same mechanism backward, but only through an explicit governance
//! path, and a buffer carved out of positive rebases absorbs them first.
//!
//! The ledger is dependency-free of pricing logic: pools drive it
//! through the mint/burn/supply surface, and every such call is gated on
//! the caller being a registered pool.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Address, Amount, FeeRate, Rounding, Shares};
use crate::error::{PoolError, Result};
use crate::math::{mul_div, CheckedArithmetic};

/// Shares permanently assigned to the null holder at first mint, so the
/// share price cannot be manipulated while `total_shares` is small.
pub const DEAD_SHARES: u128 = 1_000;

/// The rebasing share ledger.
///
/// One ledger may serve several pools; each pool only ever adjusts the
/// portion of `total_supply` it attributes to itself.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShareLedger {
    governor: Address,
    pools: BTreeSet<Address>,
    shares: BTreeMap<Address, Shares>,
    total_shares: Shares,
    total_supply: Amount,
    total_rewards: Amount,
    buffer_amount: Amount,
    buffer_percent: FeeRate,
    buffer_bad_debt: Amount,
    allowances: BTreeMap<(Address, Address), Amount>,
}

impl ShareLedger {
    /// Creates an empty ledger owned by `governor`.
    ///
    /// `buffer_percent` is the fraction of every positive rebase carved
    /// into the loss-absorption buffer.
    #[must_use]
    pub fn new(governor: Address, buffer_percent: FeeRate) -> Self {
        Self {
            governor,
            pools: BTreeSet::new(),
            shares: BTreeMap::new(),
            total_shares: Shares::ZERO,
            total_supply: Amount::ZERO,
            total_rewards: Amount::ZERO,
            buffer_amount: Amount::ZERO,
            buffer_percent,
            buffer_bad_debt: Amount::ZERO,
            allowances: BTreeMap::new(),
        }
    }

    // -- views --------------------------------------------------------------

    /// Claim-token balance of `account` at the current share price.
    ///
    /// # Errors
    ///
    /// Propagates conversion overflow, which cannot occur for shares
    /// actually held on this ledger.
    pub fn balance_of(&self, account: &Address) -> Result<Amount> {
        self.pegged_token_by_shares(self.shares_of(account))
    }

    /// Raw share count of `account`.
    #[must_use]
    pub fn shares_of(&self, account: &Address) -> Shares {
        self.shares.get(account).copied().unwrap_or(Shares::ZERO)
    }

    /// Total shares in existence, dead shares included.
    #[must_use]
    pub const fn total_shares(&self) -> Shares {
        self.total_shares
    }

    /// Total denominated supply backing the shares.
    #[must_use]
    pub const fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Cumulative rewards ever distributed to holders.
    #[must_use]
    pub const fn total_rewards(&self) -> Amount {
        self.total_rewards
    }

    /// Current loss-absorption buffer.
    #[must_use]
    pub const fn buffer_amount(&self) -> Amount {
        self.buffer_amount
    }

    /// Buffer deficit to be repaid by future positive rebases.
    #[must_use]
    pub const fn buffer_bad_debt(&self) -> Amount {
        self.buffer_bad_debt
    }

    /// Fraction of positive rebases carved into the buffer.
    #[must_use]
    pub const fn buffer_percent(&self) -> FeeRate {
        self.buffer_percent
    }

    /// Returns `true` if `caller` is a registered pool.
    #[must_use]
    pub fn is_pool(&self, caller: &Address) -> bool {
        self.pools.contains(caller)
    }

    /// Converts a claim-token amount into shares at the current price.
    ///
    /// The exact inverse of [`pegged_token_by_shares`]
    /// (Self::pegged_token_by_shares) up to integer rounding. Before the
    /// first mint (`total_shares == 0`) the conversion is 1:1.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::DivisionByZero`] if shares exist but the
    /// supply has been wiped out entirely — a degenerate state only a
    /// total loss can produce.
    pub fn shares_by_pegged_token(&self, amount: Amount) -> Result<Shares> {
        if self.total_shares.is_zero() {
            return Ok(Shares::new(amount.get()));
        }
        let raw = mul_div(
            amount.get(),
            self.total_shares.get(),
            self.total_supply.get(),
            Rounding::Down,
        )?;
        Ok(Shares::new(raw))
    }

    /// Converts shares into a claim-token amount at the current price.
    /// Zero whenever `total_shares` is zero.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Overflow`] only for share counts beyond the
    /// ledger's own total.
    pub fn pegged_token_by_shares(&self, shares: Shares) -> Result<Amount> {
        if self.total_shares.is_zero() {
            return Ok(Amount::ZERO);
        }
        let raw = mul_div(
            shares.get(),
            self.total_supply.get(),
            self.total_shares.get(),
            Rounding::Down,
        )?;
        Ok(Amount::new(raw))
    }

    // -- governance ---------------------------------------------------------

    /// Registers `pool` as an authorized caller. Governor only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Unauthorized`] for any other caller.
    pub fn add_pool(&mut self, caller: Address, pool: Address) -> Result<()> {
        self.require_governor(caller)?;
        self.pools.insert(pool);
        log::info!("ledger: pool {pool} registered");
        Ok(())
    }

    /// Removes `pool` from the authorized set. Governor only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Unauthorized`] for any other caller.
    pub fn remove_pool(&mut self, caller: Address, pool: Address) -> Result<()> {
        self.require_governor(caller)?;
        self.pools.remove(&pool);
        log::info!("ledger: pool {pool} deregistered");
        Ok(())
    }

    /// Updates the buffer carve fraction. Governor only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Unauthorized`] for any other caller.
    pub fn set_buffer_percent(&mut self, caller: Address, percent: FeeRate) -> Result<()> {
        self.require_governor(caller)?;
        self.buffer_percent = percent;
        Ok(())
    }

    // -- pool-gated supply surface -------------------------------------------

    /// Mints `amount` of claim-token value to `to`. Registered pools only.
    ///
    /// The first mint ever reserves [`DEAD_SHARES`] to the null address;
    /// the remainder is credited to `to`.
    ///
    /// # Errors
    ///
    /// - [`PoolError::NoPool`] if `caller` is not registered.
    /// - [`PoolError::InvalidQuantity`] if `amount` is zero, or if the
    ///   first mint is not strictly larger than the dead-share reserve.
    pub fn mint(&mut self, caller: Address, to: Address, amount: Amount) -> Result<Shares> {
        self.require_pool(caller)?;
        if amount.is_zero() {
            return Err(PoolError::InvalidQuantity("mint amount must be positive"));
        }

        let shares = self.shares_by_pegged_token(amount)?;
        if self.total_shares.is_zero() {
            // First mint anchors the share price: a fixed reserve goes to
            // the null holder, the rest to the minter.
            let reserved = Shares::new(DEAD_SHARES);
            let to_minter = shares
                .checked_sub(&reserved)
                .filter(|s| !s.is_zero())
                .ok_or(PoolError::InvalidQuantity(
                    "first mint must exceed the dead-share reserve",
                ))?;
            self.credit_shares(Address::ZERO, reserved)?;
            self.credit_shares(to, to_minter)?;
        } else {
            if shares.is_zero() {
                return Err(PoolError::InvalidQuantity("mint too small for one share"));
            }
            self.credit_shares(to, shares)?;
        }
        self.total_supply = self.total_supply.safe_add(&amount)?;
        log::debug!("ledger: minted {amount} ({shares} shares) to {to}");
        Ok(shares)
    }

    /// Mints raw `shares` to `to`. Registered pools only.
    ///
    /// # Errors
    ///
    /// - [`PoolError::NoPool`] if `caller` is not registered.
    /// - [`PoolError::InvalidQuantity`] if `shares` is zero.
    pub fn mint_shares(&mut self, caller: Address, to: Address, shares: Shares) -> Result<Amount> {
        self.require_pool(caller)?;
        if shares.is_zero() {
            return Err(PoolError::InvalidQuantity("share mint must be positive"));
        }
        let value = self.pegged_token_by_shares(shares)?;
        self.credit_shares(to, shares)?;
        self.total_supply = self.total_supply.safe_add(&value)?;
        Ok(value)
    }

    /// Burns `amount` of claim-token value from `from`. Registered pools
    /// only. Share conversion rounds up so a burn can never remove less
    /// value than charged.
    ///
    /// # Errors
    ///
    /// - [`PoolError::NoPool`] if `caller` is not registered.
    /// - [`PoolError::InsufficientBalance`] if `from` holds fewer shares.
    pub fn burn(&mut self, caller: Address, from: Address, amount: Amount) -> Result<Shares> {
        self.require_pool(caller)?;
        if amount.is_zero() {
            return Err(PoolError::InvalidQuantity("burn amount must be positive"));
        }
        if self.total_shares.is_zero() {
            return Err(PoolError::InsufficientBalance("no shares outstanding"));
        }
        let shares = Shares::new(mul_div(
            amount.get(),
            self.total_shares.get(),
            self.total_supply.get(),
            Rounding::Up,
        )?);
        self.debit_shares(from, shares)?;
        self.total_supply = self.total_supply.safe_sub(&amount)?;
        log::debug!("ledger: burned {amount} ({shares} shares) from {from}");
        Ok(shares)
    }

    /// Burns raw `shares` from `from`. Registered pools only.
    ///
    /// # Errors
    ///
    /// - [`PoolError::NoPool`] if `caller` is not registered.
    /// - [`PoolError::InsufficientBalance`] if `from` holds fewer shares.
    pub fn burn_shares(&mut self, caller: Address, from: Address, shares: Shares) -> Result<Amount> {
        self.require_pool(caller)?;
        if shares.is_zero() {
            return Err(PoolError::InvalidQuantity("share burn must be positive"));
        }
        let value = self.pegged_token_by_shares(shares)?;
        self.debit_shares(from, shares)?;
        self.total_supply = self.total_supply.safe_sub(&value)?;
        Ok(value)
    }

    /// Recognizes `amount` of positive rebase value. Registered pools
    /// only.
    ///
    /// Order of application: outstanding buffer bad debt is repaid into
    /// the buffer first; the [`buffer_percent`](Self::buffer_percent)
    /// fraction of the remainder is retained in the buffer; the rest
    /// raises `total_supply` and `total_rewards`, lifting every holder's
    /// balance without touching shares. With no shares outstanding the
    /// whole amount is bufferized — there is nobody to distribute to.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoPool`] if `caller` is not registered.
    pub fn add_total_supply(&mut self, caller: Address, amount: Amount) -> Result<()> {
        self.require_pool(caller)?;
        if amount.is_zero() {
            return Ok(());
        }

        let mut remaining = amount;
        if !self.buffer_bad_debt.is_zero() {
            let repay = remaining.min(self.buffer_bad_debt);
            self.buffer_bad_debt = self.buffer_bad_debt.safe_sub(&repay)?;
            self.buffer_amount = self.buffer_amount.safe_add(&repay)?;
            remaining = remaining.safe_sub(&repay)?;
            log::info!("ledger: repaid {repay} of buffer bad debt");
        }
        if remaining.is_zero() {
            return Ok(());
        }

        let carve = if self.total_shares.is_zero() {
            remaining
        } else {
            self.buffer_percent.apply(remaining, Rounding::Down)?
        };
        let distributed = remaining.safe_sub(&carve)?;
        self.buffer_amount = self.buffer_amount.safe_add(&carve)?;
        self.total_supply = self.total_supply.safe_add(&distributed)?;
        self.total_rewards = self.total_rewards.safe_add(&distributed)?;
        log::info!("ledger: +{distributed} supply, +{carve} buffer");
        Ok(())
    }

    /// Removes `amount` of recognized value — the negative-rebase path.
    /// Registered pools only.
    ///
    /// With `is_buffer` the draw targets the buffer; `with_debt` then
    /// lets the draw exceed the buffer by recording the shortfall as
    /// [`buffer_bad_debt`](Self::buffer_bad_debt). Without `is_buffer`
    /// the amount comes straight out of `total_supply`, cutting every
    /// holder's balance.
    ///
    /// # Errors
    ///
    /// - [`PoolError::NoPool`] if `caller` is not registered.
    /// - [`PoolError::InsufficientBalance`] on a buffer draw beyond the
    ///   buffer without `with_debt`.
    /// - [`PoolError::Underflow`] on a supply cut beyond `total_supply`.
    pub fn remove_total_supply(
        &mut self,
        caller: Address,
        amount: Amount,
        is_buffer: bool,
        with_debt: bool,
    ) -> Result<()> {
        self.require_pool(caller)?;
        if amount.is_zero() {
            return Ok(());
        }

        if is_buffer {
            if amount <= self.buffer_amount {
                self.buffer_amount = self.buffer_amount.safe_sub(&amount)?;
            } else if with_debt {
                let shortfall = amount.safe_sub(&self.buffer_amount)?;
                self.buffer_amount = Amount::ZERO;
                self.buffer_bad_debt = self.buffer_bad_debt.safe_add(&shortfall)?;
                log::warn!("ledger: buffer exhausted, {shortfall} recorded as bad debt");
            } else {
                return Err(PoolError::InsufficientBalance("buffer"));
            }
        } else {
            self.total_supply = self.total_supply.safe_sub(&amount)?;
            log::warn!("ledger: -{amount} supply (negative rebase)");
        }
        Ok(())
    }

    /// Adds `amount` directly to the buffer. Registered pools only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoPool`] if `caller` is not registered.
    pub fn add_buffer(&mut self, caller: Address, amount: Amount) -> Result<()> {
        self.require_pool(caller)?;
        self.buffer_amount = self.buffer_amount.safe_add(&amount)?;
        Ok(())
    }

    /// Extracts `amount` of buffer value by minting new shares to `to`
    /// at the current share price. Governor only.
    ///
    /// Existing holders keep their per-share value but own a smaller
    /// fraction of the ledger afterwards.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Unauthorized`] for non-governor callers.
    /// - [`PoolError::InsufficientBalance`] if the buffer is smaller.
    /// - [`PoolError::InvalidQuantity`] before the first mint.
    pub fn withdraw_buffer(&mut self, caller: Address, to: Address, amount: Amount) -> Result<Shares> {
        self.require_governor(caller)?;
        if amount.is_zero() {
            return Err(PoolError::InvalidQuantity("buffer withdrawal must be positive"));
        }
        if amount > self.buffer_amount {
            return Err(PoolError::InsufficientBalance("buffer"));
        }
        if self.total_shares.is_zero() {
            return Err(PoolError::InvalidQuantity(
                "buffer withdrawal requires outstanding shares",
            ));
        }
        let shares = self.shares_by_pegged_token(amount)?;
        if shares.is_zero() {
            return Err(PoolError::InvalidQuantity("withdrawal too small for one share"));
        }
        self.buffer_amount = self.buffer_amount.safe_sub(&amount)?;
        self.credit_shares(to, shares)?;
        self.total_supply = self.total_supply.safe_add(&amount)?;
        log::info!("ledger: buffer payout {amount} ({shares} shares) to {to}");
        Ok(shares)
    }

    // -- holder surface -----------------------------------------------------

    /// Moves raw `shares` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InsufficientBalance`] if `from` holds fewer
    /// shares.
    pub fn transfer_shares(&mut self, from: Address, to: Address, shares: Shares) -> Result<()> {
        if shares.is_zero() {
            return Err(PoolError::InvalidQuantity("transfer must be positive"));
        }
        self.debit_shares(from, shares)?;
        self.credit_shares(to, shares)?;
        Ok(())
    }

    /// Moves `amount` of claim-token value from `from` to `to`.
    ///
    /// Transfers always move shares; this face converts the amount into
    /// shares at the current price first.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InsufficientBalance`] if `from`'s balance is
    /// lower.
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<Shares> {
        let shares = self.shares_by_pegged_token(amount)?;
        self.transfer_shares(from, to, shares)?;
        Ok(shares)
    }

    /// Sets `spender`'s allowance over `owner`'s balance, in
    /// denominated-value terms. Overwrites any previous allowance.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }

    /// Remaining allowance of `spender` over `owner`'s balance.
    #[must_use]
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Moves `amount` from `owner` to `to` on behalf of `spender`,
    /// consuming allowance.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InsufficientBalance`] if the allowance or
    /// the owner's balance is lower than `amount`.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> Result<Shares> {
        let allowed = self.allowance(&owner, &spender);
        if allowed < amount {
            return Err(PoolError::InsufficientBalance("allowance"));
        }
        let shares = self.transfer(owner, to, amount)?;
        self.approve(owner, spender, allowed.safe_sub(&amount)?);
        Ok(shares)
    }

    // -- internals ----------------------------------------------------------

    fn require_pool(&self, caller: Address) -> Result<()> {
        if self.pools.contains(&caller) {
            Ok(())
        } else {
            Err(PoolError::NoPool)
        }
    }

    fn require_governor(&self, caller: Address) -> Result<()> {
        if caller == self.governor {
            Ok(())
        } else {
            Err(PoolError::Unauthorized("governor"))
        }
    }

    fn credit_shares(&mut self, to: Address, shares: Shares) -> Result<()> {
        let current = self.shares_of(&to);
        let updated = current.safe_add(&shares)?;
        self.shares.insert(to, updated);
        self.total_shares = self.total_shares.safe_add(&shares)?;
        Ok(())
    }

    fn debit_shares(&mut self, from: Address, shares: Shares) -> Result<()> {
        let current = self.shares_of(&from);
        let updated = current
            .checked_sub(&shares)
            .ok_or(PoolError::InsufficientBalance("shares"))?;
        if updated.is_zero() {
            self.shares.remove(&from);
        } else {
            self.shares.insert(from, updated);
        }
        self.total_shares = self.total_shares.safe_sub(&shares)?;
        Ok(())
    }
}
