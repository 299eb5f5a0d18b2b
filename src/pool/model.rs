//! Constant-product liquidity pool (`reserve_base * reserve_quote = k`).
//!
//! The fee is taken from the input before pricing and stays in the pool,
//! so every settlement leaves `k` equal or larger. Reserves are `Decimal`
//! fixed-point values; payouts are rounded down to the output token's
//! precision before they touch the reserves.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::types::{
    BPS_DENOMINATOR, PoolId, PoolSnapshot, Result, SwapDirection, SwapError, Timestamp, TokenInfo,
    TokenPair, now,
};
use crate::utils::config::PoolConfig;
use crate::utils::math::{calculate_amm_output, calculate_price_impact};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub pool_id: PoolId,
    pub pair: TokenPair,
    pub reserve_base: Decimal,
    pub reserve_quote: Decimal,
    pub fee_bps: u32,
    pub k: Decimal,
    pub volume_base: Decimal,
    pub volume_quote: Decimal,
    pub halted: bool,
    pub last_updated: Timestamp,
}

impl LiquidityPool {
    pub fn new(
        pool_id: impl Into<PoolId>,
        pair: TokenPair,
        reserve_base: Decimal,
        reserve_quote: Decimal,
        fee_bps: u32,
    ) -> Result<Self> {
        let pool_id = pool_id.into();

        if fee_bps >= BPS_DENOMINATOR {
            return Err(SwapError::Config(format!("Pool {} fee {} bps out of range", pool_id, fee_bps)));
        }
        if reserve_base.is_sign_negative() || reserve_quote.is_sign_negative() {
            return Err(SwapError::Config(format!("Pool {} has negative reserves", pool_id)));
        }
        if pair.base.symbol == pair.quote.symbol {
            return Err(SwapError::Config(format!("Pool {} pairs {} with itself", pool_id, pair.base)));
        }

        let k = Self::constant_product(&pool_id, reserve_base, reserve_quote)?;

        Ok(Self {
            pool_id,
            pair,
            reserve_base,
            reserve_quote,
            fee_bps,
            k,
            volume_base: Decimal::ZERO,
            volume_quote: Decimal::ZERO,
            halted: false,
            last_updated: now(),
        })
    }

    /// `reserve_base * reserve_quote`, which must fit in a `Decimal` (about 7.9e28)
    pub fn constant_product(pool_id: &str, reserve_base: Decimal, reserve_quote: Decimal) -> Result<Decimal> {
        reserve_base.checked_mul(reserve_quote).ok_or_else(|| {
            SwapError::Config(format!(
                "Pool {} reserves {} x {} exceed the constant product limit of {}",
                pool_id,
                reserve_base,
                reserve_quote,
                Decimal::MAX
            ))
        })
    }

    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        Self::new(
            config.id.clone(),
            TokenPair::new(config.base.clone(), config.quote.clone()),
            config.reserve_base,
            config.reserve_quote,
            config.fee_bps,
        )
    }

    /// Resolve `from -> to` symbols to a direction on this pool
    pub fn direction(&self, from: &str, to: &str) -> Result<SwapDirection> {
        let base = self.pair.base.symbol.as_str();
        let quote = self.pair.quote.symbol.as_str();

        match (from, to) {
            (f, t) if f == base && t == quote => Ok(SwapDirection::BaseToQuote),
            (f, t) if f == quote && t == base => Ok(SwapDirection::QuoteToBase),
            _ => Err(SwapError::UnsupportedPair {
                pool_id: self.pool_id.clone(),
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    pub fn token_in(&self, direction: SwapDirection) -> &TokenInfo {
        match direction {
            SwapDirection::BaseToQuote => &self.pair.base,
            SwapDirection::QuoteToBase => &self.pair.quote,
        }
    }

    pub fn token_out(&self, direction: SwapDirection) -> &TokenInfo {
        self.token_in(direction.reverse())
    }

    /// (reserve_in, reserve_out) for a direction
    pub fn reserves_for(&self, direction: SwapDirection) -> (Decimal, Decimal) {
        match direction {
            SwapDirection::BaseToQuote => (self.reserve_base, self.reserve_quote),
            SwapDirection::QuoteToBase => (self.reserve_quote, self.reserve_base),
        }
    }

    /// Pre-trade rate: units of output per unit of input
    pub fn spot_rate(&self, direction: SwapDirection) -> Result<Decimal> {
        let (reserve_in, reserve_out) = self.reserves_for(direction);
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(SwapError::liquidity(self.pool_id.clone(), Decimal::ZERO, reserve_out));
        }
        Ok(reserve_out / reserve_in)
    }

    pub fn fee_rate(&self) -> Decimal {
        crate::utils::math::bps_to_rate(self.fee_bps)
    }

    /// Exact curve output for `amount_in`, not rounded to token precision
    pub fn quote_output(&self, direction: SwapDirection, amount_in: Decimal) -> Result<Decimal> {
        if amount_in <= Decimal::ZERO {
            return Err(SwapError::InvalidAmount { amount: amount_in });
        }

        let (reserve_in, reserve_out) = self.reserves_for(direction);
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(SwapError::liquidity(self.pool_id.clone(), amount_in, reserve_out));
        }

        let amount_out = calculate_amm_output(amount_in, reserve_in, reserve_out, self.fee_bps)?;
        if amount_out >= reserve_out {
            return Err(SwapError::liquidity(self.pool_id.clone(), amount_out, reserve_out));
        }

        Ok(amount_out)
    }

    /// Curve output rounded down to the output token's precision
    pub fn settlable_output(&self, direction: SwapDirection, amount_in: Decimal) -> Result<Decimal> {
        let exact = self.quote_output(direction, amount_in)?;
        Ok(self.token_out(direction).quantize(exact))
    }

    /// Price impact of `amount_in`, in percent
    pub fn price_impact(&self, direction: SwapDirection, amount_in: Decimal) -> Result<Decimal> {
        if amount_in <= Decimal::ZERO {
            return Err(SwapError::InvalidAmount { amount: amount_in });
        }
        let (reserve_in, reserve_out) = self.reserves_for(direction);
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(SwapError::liquidity(self.pool_id.clone(), amount_in, reserve_out));
        }
        calculate_price_impact(amount_in, reserve_in, reserve_out, self.fee_bps)
    }

    /// Move reserves for a settled swap.
    ///
    /// A drop in `k` means the accounting diverged from the curve: the pool is
    /// halted, its reserves are left untouched, and every later settlement
    /// fails with `PoolHalted`.
    pub fn apply_settlement(
        &mut self,
        direction: SwapDirection,
        amount_in: Decimal,
        amount_out: Decimal,
    ) -> Result<PoolSnapshot> {
        if self.halted {
            return Err(SwapError::PoolHalted { pool_id: self.pool_id.clone() });
        }
        if amount_in <= Decimal::ZERO {
            return Err(SwapError::InvalidAmount { amount: amount_in });
        }
        if amount_out <= Decimal::ZERO {
            return Err(SwapError::InvalidAmount { amount: amount_out });
        }

        let (reserve_in, reserve_out) = self.reserves_for(direction);
        if amount_out >= reserve_out {
            return Err(SwapError::liquidity(self.pool_id.clone(), amount_out, reserve_out));
        }

        let new_in = reserve_in
            .checked_add(amount_in)
            .ok_or(SwapError::Arithmetic("reserve overflow"))?;
        let new_out = reserve_out - amount_out;
        let k_before = self.k;
        let k_after = new_in
            .checked_mul(new_out)
            .ok_or(SwapError::Arithmetic("constant product overflow"))?;

        if k_after < k_before {
            self.halted = true;
            error!(
                "Invariant violation on pool {}: k {} -> {} ({} in, {} out). Pool halted.",
                self.pool_id, k_before, k_after, amount_in, amount_out
            );
            return Err(SwapError::InvariantViolation {
                pool_id: self.pool_id.clone(),
                k_before,
                k_after,
            });
        }

        match direction {
            SwapDirection::BaseToQuote => {
                self.reserve_base = new_in;
                self.reserve_quote = new_out;
                self.volume_base += amount_in;
                self.volume_quote += amount_out;
            }
            SwapDirection::QuoteToBase => {
                self.reserve_quote = new_in;
                self.reserve_base = new_out;
                self.volume_quote += amount_in;
                self.volume_base += amount_out;
            }
        }
        self.k = k_after;
        self.last_updated = now();

        debug!(
            "Pool {} settled {} {}: reserves {}/{}, k {}",
            self.pool_id, amount_in, direction, self.reserve_base, self.reserve_quote, self.k
        );

        Ok(self.snapshot())
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            pool_id: self.pool_id.clone(),
            pair: self.pair.clone(),
            reserve_base: self.reserve_base,
            reserve_quote: self.reserve_quote,
            fee_bps: self.fee_bps,
            k: self.k,
            volume_base: self.volume_base,
            volume_quote: self.volume_quote,
            taken_at: now(),
        }
    }
}
