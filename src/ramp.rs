//! Amplification coefficient ramp controller.
//!
//! The amplification coefficient `A` controls how flat (peg-like) vs.
//! convex (constant-product-like) the pricing curve is. Changing it
//! instantaneously moves the invariant surface under open positions, so
//! every change is applied as a scheduled linear ramp over a bounded
//! time window.
//!
//! # Ramp state
//!
//! ```text
//! A
//! │        future_a ────────●───────
//! │                     ╱
//! │                 ╱
//! │ initial_a ──●
//! └─────────────┴───────────┴────── t
//!         initial_a_time  future_a_time
//! ```
//!
//! [`get_a`](AmpRamp::get_a) interpolates linearly between the two
//! anchor points, integer-truncated, monotonic in the ramp direction.
//! At most one ramp is in flight; a new ramp cannot start before the
//! previous one's end time.

use crate::domain::Timestamp;
use crate::error::{PoolError, Result};

/// Upper bound on the amplification coefficient.
pub const MAX_A: u128 = 1_000_000;

/// Ordinary safety limit: a ramp may at most double or halve the
/// current interpolated A.
const MAX_A_CHANGE: u128 = 2;

/// Relaxed limit applied while the current A is at or below
/// [`SMALL_A_BOUND`] — small coefficients need proportionally larger
/// swings to be adjustable at all.
const MAX_A_CHANGE_SMALL: u128 = 4;

/// Threshold below which the relaxed increase limit applies.
const SMALL_A_BOUND: u128 = 2;

/// A linear ramp descriptor for the amplification coefficient.
///
/// Constructed with a flat initial value; subsequent changes go through
/// [`ramp_a`](Self::ramp_a) / [`stop_ramp`](Self::stop_ramp).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AmpRamp {
    initial_a: u128,
    future_a: u128,
    initial_a_time: Timestamp,
    future_a_time: Timestamp,
    min_ramp_time: u64,
}

impl AmpRamp {
    /// Creates a flat ramp pinned at `a`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfiguration`] if `a` is zero or
    /// exceeds [`MAX_A`].
    pub const fn new(a: u128, min_ramp_time: u64) -> Result<Self> {
        if a == 0 || a > MAX_A {
            return Err(PoolError::InvalidConfiguration(
                "amplification must be in (0, 10^6]",
            ));
        }
        Ok(Self {
            initial_a: a,
            future_a: a,
            initial_a_time: Timestamp::ZERO,
            future_a_time: Timestamp::ZERO,
            min_ramp_time,
        })
    }

    /// Returns the amplification coefficient at `now`.
    ///
    /// `future_a` once the ramp is complete, `initial_a` before or at
    /// the ramp's start, and a time-weighted linear interpolation in
    /// between. Interpolation is exact in u128: both A values are
    /// `≤ 10^6` and time deltas fit in `u64`, so the products stay far
    /// below the overflow boundary.
    #[must_use]
    pub fn get_a(&self, now: Timestamp) -> u128 {
        if now >= self.future_a_time {
            return self.future_a;
        }
        if now <= self.initial_a_time {
            return self.initial_a;
        }

        // Strictly inside the window, so both deltas are non-zero.
        let elapsed = u128::from(now.get() - self.initial_a_time.get());
        let window = u128::from(self.future_a_time.get() - self.initial_a_time.get());
        if self.future_a >= self.initial_a {
            self.initial_a + (self.future_a - self.initial_a) * elapsed / window
        } else {
            self.initial_a - (self.initial_a - self.future_a) * elapsed / window
        }
    }

    /// Returns `true` while a ramp is still in flight at `now`.
    #[must_use]
    pub fn is_ramping(&self, now: Timestamp) -> bool {
        now < self.future_a_time
    }

    /// The ramp's target value.
    #[must_use]
    pub const fn future_a(&self) -> u128 {
        self.future_a
    }

    /// The ramp's end time.
    #[must_use]
    pub const fn future_a_time(&self) -> Timestamp {
        self.future_a_time
    }

    /// The minimum duration enforced on every new ramp.
    #[must_use]
    pub const fn min_ramp_time(&self) -> u64 {
        self.min_ramp_time
    }

    /// Schedules a new linear ramp from the current interpolated value
    /// to `new_a`, ending at `end_time`.
    ///
    /// # Errors
    ///
    /// - [`PoolError::RampAlreadyInProgress`] if the previous ramp has
    ///   not completed.
    /// - [`PoolError::InsufficientRampTime`] if `end_time - now` is
    ///   below the minimum ramp duration.
    /// - [`PoolError::InvalidConfiguration`] if `new_a` is outside
    ///   `(0, 10^6]`.
    /// - [`PoolError::ExcessiveAChange`] if `new_a` more than doubles
    ///   or more than halves the current interpolated value. While the
    ///   current value is ≤ 2 a 4× increase is allowed instead.
    pub fn ramp_a(&mut self, new_a: u128, end_time: Timestamp, now: Timestamp) -> Result<()> {
        if self.is_ramping(now) {
            return Err(PoolError::RampAlreadyInProgress);
        }
        let duration = end_time
            .checked_since(now)
            .ok_or(PoolError::InsufficientRampTime)?;
        if duration < self.min_ramp_time {
            return Err(PoolError::InsufficientRampTime);
        }
        if new_a == 0 || new_a > MAX_A {
            return Err(PoolError::InvalidConfiguration(
                "amplification must be in (0, 10^6]",
            ));
        }

        let current = self.get_a(now);
        if new_a >= current {
            let limit = if current <= SMALL_A_BOUND {
                MAX_A_CHANGE_SMALL
            } else {
                MAX_A_CHANGE
            };
            if new_a > current * limit {
                return Err(PoolError::ExcessiveAChange);
            }
        } else if new_a * MAX_A_CHANGE < current {
            return Err(PoolError::ExcessiveAChange);
        }

        self.initial_a = current;
        self.future_a = new_a;
        self.initial_a_time = now;
        self.future_a_time = end_time;
        log::info!(
            "amplification ramp scheduled: {current} -> {new_a} ending at {end_time}"
        );
        Ok(())
    }

    /// Freezes A at its current interpolated value immediately.
    ///
    /// Usable as an emergency brake at any time; stopping an already
    /// completed ramp is a no-op.
    pub fn stop_ramp(&mut self, now: Timestamp) {
        let current = self.get_a(now);
        self.initial_a = current;
        self.future_a = current;
        self.initial_a_time = now;
        self.future_a_time = now;
        log::info!("amplification ramp stopped at {current}");
    }
}
