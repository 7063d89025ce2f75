//! # Tidepool
//!
//! Peg-stabilizing multi-asset exchange engine: a StableSwap-style
//! automated market maker paired with a rebasing share ledger and a
//! governance-bounded parameter-control layer.
//!
//! Liquidity providers deposit a basket of pegged assets, receive a
//! fungible claim on the pool, trade between assets at prices set by an
//! invariant curve, and redeem the claim back into underlying assets —
//! while externally accruing yield and trading fees are continuously
//! absorbed into the claim token's exchange rate.
//!
//! # Subsystems
//!
//! | Subsystem | Type | Responsibility |
//! |-----------|------|----------------|
//! | Invariant engine | [`pool::StablePool`] | balance tracking, Newton-Raphson invariant solving, mint/swap/redeem settlement, yield/fee separation |
//! | Share ledger | [`ledger::ShareLedger`] | share-to-value conversion, supply rebasing, loss-absorption buffer |
//! | Ramp controller | [`ramp::AmpRamp`] | time-interpolated amplification changes with hard safety limits |
//! | Parameter guard | [`guard::ParameterGuard`] | bounded curator changes, governor bypass, guardian ramp cancellation |
//! | Rate sources | [`rates::RateOracle`] | external exchange rates with freshness enforcement |
//!
//! # Quick Start
//!
//! ```rust
//! use tidepool::config::{LedgerConfig, PoolConfig};
//! use tidepool::domain::{Address, Amount, Decimals, FeeRate, Timestamp, Token};
//! use tidepool::ledger::ShareLedger;
//! use tidepool::pool::StablePool;
//! use tidepool::rates::IdentityOracle;
//!
//! let governor = Address::from_bytes([0xA0; 32]);
//! let usd_a = Token::new(Address::from_bytes([1; 32]), Decimals::new(18).expect("valid"));
//! let usd_b = Token::new(Address::from_bytes([2; 32]), Decimals::new(6).expect("valid"));
//!
//! // 1. Configure and create the pool and its ledger.
//! let config = PoolConfig::new(
//!     vec![usd_a, usd_b],
//!     FeeRate::ZERO,
//!     FeeRate::new(4_000_000).expect("0.04%"),
//!     FeeRate::ZERO,
//!     100,
//!     governor,
//! )
//! .expect("valid config");
//! let pool_id = Address::from_bytes([0xB0; 32]);
//! let mut pool = StablePool::new(pool_id, &config).expect("pool created");
//! let mut ledger = ShareLedger::new(governor, FeeRate::ZERO);
//! ledger.add_pool(governor, pool_id).expect("registered");
//!
//! // 2. Provide liquidity and trade.
//! let oracle = IdentityOracle::new(Timestamp::ZERO);
//! let lp = Address::from_bytes([7; 32]);
//! let wad = 1_000_000_000_000_000_000u128;
//! let deposit = [Amount::new(1_000 * wad), Amount::new(1_000_000_000)];
//! pool.mint(&mut ledger, &oracle, lp, &deposit, Amount::ZERO, Timestamp::ZERO)
//!     .expect("minted");
//!
//! let out = pool
//!     .swap(&mut ledger, &oracle, 0, 1, Amount::new(10 * wad), Amount::ZERO, Timestamp::new(1))
//!     .expect("swapped");
//! assert!(out.amount_out().get() > 0);
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  mint/swap/redeem/rebase  ┌─────────────┐
//! │   Caller    │ ────────────────────────▶ │  StablePool  │
//! └────────────┘                           └──────┬──────┘
//!        │ bounded parameter changes              │ mint/burn/adjust supply
//!        ▼                                        ▼
//! ┌────────────┐  gated setters           ┌─────────────┐
//! │ Parameter   │ ────────────────────────▶ │ ShareLedger  │
//! │   Guard     │        (and AmpRamp)     └─────────────┘
//! └────────────┘
//!        ▲ rates consulted read-only by the pool
//! ┌────────────┐
//! │ RateOracle  │  (external collaborator)
//! └────────────┘
//! ```
//!
//! # Module Guide
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`domain`] | Newtype value types: [`Amount`](domain::Amount), [`Shares`](domain::Shares), [`FeeRate`](domain::FeeRate), [`Address`](domain::Address), … |
//! | [`pool`] | [`StablePool`](pool::StablePool) settlement engine and the invariant solvers |
//! | [`ledger`] | [`ShareLedger`](ledger::ShareLedger) rebasing share accounting |
//! | [`ramp`] | [`AmpRamp`](ramp::AmpRamp) amplification ramp controller |
//! | [`guard`] | [`ParameterGuard`](guard::ParameterGuard) bounded parameter gate |
//! | [`rates`] | [`RateOracle`](rates::RateOracle) trait and reference oracles |
//! | [`config`] | Validated [`PoolConfig`](config::PoolConfig) / [`LedgerConfig`](config::LedgerConfig) blueprints |
//! | [`math`] | Checked arithmetic and full-width mul-div |
//! | [`error`] | [`PoolError`](error::PoolError) unified error enum |
//! | [`prelude`] | Convenience re-exports for common types |

pub mod config;
pub mod domain;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod math;
pub mod pool;
pub mod prelude;
pub mod ramp;
pub mod rates;
