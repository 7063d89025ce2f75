//! Property-based tests using `proptest` for engine invariants.
//!
//! Covers the core laws:
//!
//! 1. **Conservation** — substituting a solved balance back into the
//!    invariant reproduces `D` within rounding.
//! 2. **Homogeneity** — scaling every balance scales `D` linearly.
//! 3. **No free lunch** — a swap never pays out more than it takes in
//!    (pegged assets, identity rates).
//! 4. **Fee monotonicity** — a fee never increases the payout.
//! 5. **Share round-trip** — value→shares→value loses at most one unit.
//! 6. **Ramp boundedness** — the interpolated A never leaves the
//!    `[initial, future]` envelope and moves monotonically.

use proptest::prelude::*;

use super::solver;
use crate::config::PoolConfig;
use crate::domain::{Address, Amount, Decimals, FeeRate, Timestamp, Token};
use crate::ledger::ShareLedger;
use crate::pool::StablePool;
use crate::ramp::AmpRamp;
use crate::rates::IdentityOracle;

const WAD: u128 = 1_000_000_000_000_000_000;

fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 32])
}

fn tok(byte: u8) -> Token {
    let Ok(d) = Decimals::new(18) else {
        panic!("valid decimals");
    };
    Token::new(Address::from_bytes([byte; 32]), d)
}

fn pool_with(a: u128, swap_fee: u64, x: u128, y: u128) -> (StablePool, ShareLedger, IdentityOracle) {
    let Ok(fee) = FeeRate::new(swap_fee) else {
        panic!("valid fee");
    };
    let Ok(cfg) = PoolConfig::new(
        vec![tok(0x10), tok(0x11)],
        FeeRate::ZERO,
        fee,
        FeeRate::ZERO,
        a,
        addr(0xA0),
    ) else {
        panic!("valid config");
    };
    let cfg = cfg.with_max_delta_d(Amount::new(u128::MAX / 2));
    let Ok(mut pool) = StablePool::new(addr(0xB0), &cfg) else {
        panic!("valid pool");
    };
    let mut ledger = ShareLedger::new(addr(0xA0), FeeRate::ZERO);
    let Ok(()) = ledger.add_pool(addr(0xA0), addr(0xB0)) else {
        panic!("expected Ok");
    };
    let oracle = IdentityOracle::new(Timestamp::ZERO);
    let amounts = [Amount::new(x), Amount::new(y)];
    let Ok(_) = pool.mint(
        &mut ledger,
        &oracle,
        addr(1),
        &amounts,
        Amount::ZERO,
        Timestamp::ZERO,
    ) else {
        panic!("seed mint");
    };
    (pool, ledger, oracle)
}

proptest! {
    // -- Conservation -------------------------------------------------------

    #[test]
    fn y_substitution_conserves_d(
        x in 1_000u128..1_000_000,
        y in 1_000u128..1_000_000,
        dx in 1u128..10_000,
        amp in 1u128..10_000,
    ) {
        let balances = [x * WAD, y * WAD];
        let Ok(d) = solver::compute_d(&balances, amp) else {
            return Err(TestCaseError::fail("D did not converge"));
        };
        let moved = [(x + dx) * WAD, balances[1]];
        let Ok(solved) = solver::compute_y(&moved, 1, d, amp) else {
            return Err(TestCaseError::fail("y did not converge"));
        };
        let after = [moved[0], solved];
        let Ok(d_after) = solver::compute_d(&after, amp) else {
            return Err(TestCaseError::fail("D' did not converge"));
        };
        // Rounding in two Newton solves stays within a few units.
        prop_assert!(d.abs_diff(d_after) <= 10, "D drifted: {d} -> {d_after}");
    }

    #[test]
    fn d_is_homogeneous(
        x in 1_000u128..1_000_000,
        y in 1_000u128..1_000_000,
        scale in 2u128..50,
        amp in 1u128..10_000,
    ) {
        let balances = [x * WAD, y * WAD];
        let scaled = [balances[0] * scale, balances[1] * scale];
        let Ok(d1) = solver::compute_d(&balances, amp) else {
            return Err(TestCaseError::fail("D did not converge"));
        };
        let Ok(d2) = solver::compute_d(&scaled, amp) else {
            return Err(TestCaseError::fail("scaled D did not converge"));
        };
        prop_assert!(d2.abs_diff(d1 * scale) <= scale + 2);
    }

    // -- Swaps --------------------------------------------------------------

    #[test]
    fn swap_never_pays_more_than_input(
        reserve in 10_000u128..1_000_000,
        dx in 1u128..5_000,
        amp in 1u128..1_000,
    ) {
        let (mut pool, mut ledger, oracle) = pool_with(amp, 0, reserve * WAD, reserve * WAD);
        let Ok(outcome) = pool.swap(
            &mut ledger,
            &oracle,
            0,
            1,
            Amount::new(dx * WAD),
            Amount::ZERO,
            Timestamp::new(1),
        ) else {
            // Tiny swaps may round to nothing; that is a rejection, not
            // a payout.
            return Ok(());
        };
        prop_assert!(outcome.amount_out().get() <= dx * WAD);
        prop_assert!(outcome.amount_out().get() > 0);
    }

    #[test]
    fn swap_fee_never_increases_payout(
        reserve in 10_000u128..500_000,
        dx in 10u128..5_000,
        fee_rate in 1u64..100_000_000,
    ) {
        let dx = Amount::new(dx * WAD);
        let (mut free, mut free_ledger, oracle) = pool_with(100, 0, reserve * WAD, reserve * WAD);
        let (mut paid, mut paid_ledger, _) = pool_with(100, fee_rate, reserve * WAD, reserve * WAD);

        let Ok(a) = free.swap(&mut free_ledger, &oracle, 0, 1, dx, Amount::ZERO, Timestamp::new(1))
        else {
            return Ok(());
        };
        let Ok(b) = paid.swap(&mut paid_ledger, &oracle, 0, 1, dx, Amount::ZERO, Timestamp::new(1))
        else {
            return Ok(());
        };
        prop_assert!(b.amount_out() <= a.amount_out());
    }

    // -- Share ledger -------------------------------------------------------

    #[test]
    fn share_conversion_round_trip(
        seed_amount in 10_000u128..u64::MAX as u128,
        reward in 0u128..u64::MAX as u128,
        probe in 1u128..u64::MAX as u128,
    ) {
        let mut ledger = ShareLedger::new(addr(0xA0), FeeRate::ZERO);
        let Ok(()) = ledger.add_pool(addr(0xA0), addr(0xB0)) else {
            return Err(TestCaseError::fail("add_pool"));
        };
        let Ok(_) = ledger.mint(addr(0xB0), addr(1), Amount::new(seed_amount)) else {
            return Err(TestCaseError::fail("mint"));
        };
        let Ok(()) = ledger.add_total_supply(addr(0xB0), Amount::new(reward)) else {
            return Err(TestCaseError::fail("reward"));
        };

        let Ok(shares) = ledger.shares_by_pegged_token(Amount::new(probe)) else {
            return Err(TestCaseError::fail("to shares"));
        };
        let Ok(back) = ledger.pegged_token_by_shares(shares) else {
            return Err(TestCaseError::fail("to value"));
        };
        prop_assert!(back.get() <= probe);
        // Truncation loses at most one share price step.
        let price_step = ledger.total_supply().get() / ledger.total_shares().get() + 1;
        prop_assert!(probe - back.get() <= price_step + 1);
    }

    // -- Ramp ---------------------------------------------------------------

    #[test]
    fn ramp_stays_bounded_and_monotonic(
        initial in 1u128..500_000,
        target_num in 10u128..20,
        window in 86_400u64..1_000_000,
        probes in proptest::collection::vec(0u64..2_000_000, 1..20),
    ) {
        // Target within the 2x safety envelope: initial * num / 10.
        let target = (initial * target_num / 10).max(1);
        let Ok(mut ramp) = AmpRamp::new(initial, 86_400) else {
            return Err(TestCaseError::fail("ramp new"));
        };
        let Ok(()) = ramp.ramp_a(target, Timestamp::new(window), Timestamp::ZERO) else {
            return Err(TestCaseError::fail("ramp_a"));
        };

        let lo = initial.min(target);
        let hi = initial.max(target);
        let mut sorted = probes;
        sorted.sort_unstable();
        let mut prev = ramp.get_a(Timestamp::ZERO);
        for probe in sorted {
            let a = ramp.get_a(Timestamp::new(probe));
            prop_assert!((lo..=hi).contains(&a), "A = {a} outside [{lo}, {hi}]");
            if target >= initial {
                prop_assert!(a >= prev, "upward ramp regressed: {prev} -> {a}");
            } else {
                prop_assert!(a <= prev, "downward ramp regressed: {prev} -> {a}");
            }
            prev = a;
        }
        prop_assert_eq!(ramp.get_a(Timestamp::new(u64::MAX)), target);
    }
}
