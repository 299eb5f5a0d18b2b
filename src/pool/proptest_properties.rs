//! Property-based tests for the constant-product pricing curve.
//!
//! 1. Output stays below the output reserve.
//! 2. Output is strictly increasing in the input.
//! 3. Price impact is non-negative and strictly increasing in the input.
//! 4. Round trip A->B->A never returns more than was put in.
//! 5. `k` never decreases across a settlement.

use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::pool::model::LiquidityPool;
use crate::types::{SwapDirection, TokenInfo, TokenPair};

fn make_pool(reserve_base: u64, reserve_quote: u64, fee_bps: u32) -> LiquidityPool {
    let pair = TokenPair::new(TokenInfo::new("AAA", 8), TokenInfo::new("BBB", 6));
    let Ok(pool) = LiquidityPool::new(
        "prop",
        pair,
        Decimal::from(reserve_base),
        Decimal::from(reserve_quote),
        fee_bps,
    ) else {
        panic!("valid pool");
    };
    pool
}

fn direction(flag: bool) -> SwapDirection {
    if flag {
        SwapDirection::BaseToQuote
    } else {
        SwapDirection::QuoteToBase
    }
}

proptest! {
    #[test]
    fn output_below_reserve(
        rb in 1_000u64..1_000_000_000,
        rq in 1_000u64..1_000_000_000,
        amount in 1u64..1_000_000_000,
        fee in 0u32..1_000,
        flag in any::<bool>(),
    ) {
        let pool = make_pool(rb, rq, fee);
        let dir = direction(flag);
        let (_, reserve_out) = pool.reserves_for(dir);
        if let Ok(out) = pool.quote_output(dir, Decimal::from(amount)) {
            prop_assert!(out < reserve_out);
            prop_assert!(out >= Decimal::ZERO);
        }
    }

    #[test]
    fn output_strictly_increasing(
        rb in 1_000u64..1_000_000_000,
        rq in 1_000u64..1_000_000_000,
        amount in 1u64..10_000_000,
        step in 1u64..10_000_000,
        fee in 0u32..1_000,
        flag in any::<bool>(),
    ) {
        let pool = make_pool(rb, rq, fee);
        let dir = direction(flag);
        let small = pool.quote_output(dir, Decimal::from(amount));
        let large = pool.quote_output(dir, Decimal::from(amount + step));
        if let (Ok(small), Ok(large)) = (small, large) {
            prop_assert!(small < large, "{} !< {}", small, large);
        }
    }

    #[test]
    fn impact_non_negative_and_increasing(
        rb in 1_000u64..1_000_000_000,
        rq in 1_000u64..1_000_000_000,
        amount in 1u64..10_000_000,
        step in 1u64..10_000_000,
        fee in 0u32..1_000,
        flag in any::<bool>(),
    ) {
        let pool = make_pool(rb, rq, fee);
        let dir = direction(flag);
        let small = pool.price_impact(dir, Decimal::from(amount)).unwrap();
        let large = pool.price_impact(dir, Decimal::from(amount + step)).unwrap();
        prop_assert!(small >= Decimal::ZERO);
        prop_assert!(small < large, "{} !< {}", small, large);
    }

    #[test]
    fn round_trip_never_gains(
        rb in 10_000u64..1_000_000_000,
        rq in 10_000u64..1_000_000_000,
        amount in 1u64..1_000_000,
        fee in 0u32..1_000,
    ) {
        let pool = make_pool(rb, rq, fee);
        let amount_in = Decimal::from(amount);
        let Ok(first) = pool.settlable_output(SwapDirection::BaseToQuote, amount_in) else {
            return Ok(());
        };
        if first.is_zero() {
            return Ok(());
        }
        let Ok(back) = pool.settlable_output(SwapDirection::QuoteToBase, first) else {
            return Ok(());
        };
        prop_assert!(back <= amount_in, "{} -> {} -> {}", amount_in, first, back);
    }

    #[test]
    fn settlement_never_lowers_k(
        rb in 1_000u64..1_000_000_000,
        rq in 1_000u64..1_000_000_000,
        amount in 1u64..100_000_000,
        fee in 0u32..1_000,
        flag in any::<bool>(),
    ) {
        let mut pool = make_pool(rb, rq, fee);
        let dir = direction(flag);
        let amount_in = Decimal::from(amount);
        let Ok(out) = pool.settlable_output(dir, amount_in) else {
            return Ok(());
        };
        if out.is_zero() {
            return Ok(());
        }
        let k_before = pool.k;
        let snapshot = pool.apply_settlement(dir, amount_in, out);
        prop_assert!(snapshot.is_ok());
        prop_assert!(pool.k >= k_before);
    }
}
