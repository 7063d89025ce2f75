//! Convenience re-exports for common types and traits.
//!
//! The prelude provides a single import to bring all commonly used items
//! into scope:
//!
//! ```rust
//! use tidepool::prelude::*;
//! ```

pub use crate::config::{LedgerConfig, PoolConfig};
pub use crate::domain::{
    Address, Amount, Decimals, FeeRate, MintOutcome, Ppm, RebaseOutcome, RedeemOutcome, Rounding,
    Shares, SwapOutcome, Timestamp, Token, FEE_DENOMINATOR,
};
pub use crate::error::{PoolError, Result};
pub use crate::guard::{Bounds, ParamChange, ParamKey, ParameterGuard, Roles};
pub use crate::ledger::{ShareLedger, DEAD_SHARES};
pub use crate::math::CheckedArithmetic;
pub use crate::pool::StablePool;
pub use crate::ramp::AmpRamp;
pub use crate::rates::{ExchangeRate, IdentityOracle, PostedRates, RateOracle};
