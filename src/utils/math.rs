use rust_decimal::Decimal;

use crate::types::{BPS_DENOMINATOR, Result, SwapError};

/// Convert basis points to a fractional rate (30 bps -> 0.003)
pub fn bps_to_rate(bps: u32) -> Decimal {
    Decimal::from(bps) / Decimal::from(BPS_DENOMINATOR)
}

/// Input amount that actually enters the curve after the pool fee
pub fn amount_after_fee(amount_in: Decimal, fee_bps: u32) -> Result<Decimal> {
    amount_in
        .checked_mul(Decimal::ONE - bps_to_rate(fee_bps))
        .ok_or(SwapError::Arithmetic("fee adjustment overflow"))
}

/// Calculate constant product AMM output amount.
///
/// `reserve_out - (reserve_in * reserve_out) / (reserve_in + amount_in_after_fee)`
///
/// The result is exact to `Decimal` precision and is not rounded to any
/// token's decimals. Callers must check it against `reserve_out`.
pub fn calculate_amm_output(
    amount_in: Decimal,
    reserve_in: Decimal,
    reserve_out: Decimal,
    fee_bps: u32,
) -> Result<Decimal> {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(SwapError::Arithmetic("swap against empty reserve"));
    }
    let net_in = amount_after_fee(amount_in, fee_bps)?;
    let k = reserve_in
        .checked_mul(reserve_out)
        .ok_or(SwapError::Arithmetic("constant product overflow"))?;
    let denominator = reserve_in
        .checked_add(net_in)
        .ok_or(SwapError::Arithmetic("reserve sum overflow"))?;
    let remaining = k
        .checked_div(denominator)
        .ok_or(SwapError::Arithmetic("constant product division"))?;
    Ok(reserve_out - remaining)
}

/// Calculate price impact for a trade, in percent.
///
/// `1 - (amount_out / amount_in_after_fee) / spot`, with `spot = reserve_out / reserve_in`.
/// On the constant-product curve `amount_out / amount_in_after_fee = reserve_out / (reserve_in + net)`,
/// so the impact reduces to `net / (reserve_in + net)`: strictly increasing in the input.
pub fn calculate_price_impact(
    amount_in: Decimal,
    reserve_in: Decimal,
    reserve_out: Decimal,
    fee_bps: u32,
) -> Result<Decimal> {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(SwapError::Arithmetic("price impact on empty reserve"));
    }
    let net_in = amount_after_fee(amount_in, fee_bps)?;
    let denominator = reserve_in
        .checked_add(net_in)
        .ok_or(SwapError::Arithmetic("reserve sum overflow"))?;
    let impact = net_in
        .checked_div(denominator)
        .ok_or(SwapError::Arithmetic("price impact division"))?;
    Ok(impact * Decimal::ONE_HUNDRED)
}

/// Calculate slippage between an expected and an actual output, in percent.
/// Negative when the actual output beats the expectation.
pub fn calculate_slippage(expected_output: Decimal, actual_output: Decimal) -> Decimal {
    if expected_output.is_zero() {
        return Decimal::ZERO;
    }
    (expected_output - actual_output) / expected_output * Decimal::ONE_HUNDRED
}

/// Apply slippage tolerance to get minimum output
pub fn apply_slippage_tolerance(expected_output: Decimal, slippage_bps: u32) -> Decimal {
    expected_output * (Decimal::ONE - bps_to_rate(slippage_bps))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_bps_to_rate() {
        assert_eq!(bps_to_rate(30), dec!(0.003));
        assert_eq!(bps_to_rate(10_000), Decimal::ONE);
        assert_eq!(bps_to_rate(0), Decimal::ZERO);
    }

    #[test]
    fn test_amm_output_reference_pool() {
        let out = calculate_amm_output(dec!(1000), dec!(100000), dec!(523), 30).unwrap();
        // 523 * 997 / 100997
        assert!(out > dec!(5.162) && out < dec!(5.163), "out = {}", out);
    }

    #[test]
    fn test_amm_output_without_fee() {
        let out = calculate_amm_output(dec!(100), dec!(1000), dec!(1000), 0).unwrap();
        assert_eq!(out.round_dp(12), dec!(90.909090909091));
    }

    #[test]
    fn test_amm_output_empty_reserve() {
        assert!(calculate_amm_output(dec!(1), Decimal::ZERO, Decimal::ZERO, 30).is_err());
        // An empty input side must not pay out the whole output reserve
        assert!(calculate_amm_output(dec!(1), Decimal::ZERO, dec!(523), 30).is_err());
        assert!(calculate_amm_output(dec!(1), dec!(100000), Decimal::ZERO, 30).is_err());
    }

    #[test]
    fn test_price_impact_reference_pool() {
        let impact = calculate_price_impact(dec!(1000), dec!(100000), dec!(523), 30).unwrap();
        assert!(impact > dec!(0.3) && impact < dec!(1), "impact = {}", impact);
    }

    #[test]
    fn test_price_impact_grows_with_size() {
        let small = calculate_price_impact(dec!(10), dec!(5000), dec!(5000), 30).unwrap();
        let large = calculate_price_impact(dec!(1000), dec!(5000), dec!(5000), 30).unwrap();
        assert!(small < large);
        assert!(small > Decimal::ZERO);
    }

    #[test]
    fn test_slippage_helpers() {
        assert_eq!(calculate_slippage(dec!(100), dec!(99)), dec!(1));
        assert_eq!(calculate_slippage(Decimal::ZERO, dec!(1)), Decimal::ZERO);
        assert_eq!(apply_slippage_tolerance(dec!(200), 50), dec!(199));
        assert_eq!(apply_slippage_tolerance(dec!(200), 0), dec!(200));
    }
}
