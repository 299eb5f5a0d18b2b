use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{PoolId, Timestamp, TokenPair};

/// Point-in-time copy of a pool's reserves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub pool_id: PoolId,
    pub pair: TokenPair,
    pub reserve_base: Decimal,
    pub reserve_quote: Decimal,
    pub fee_bps: u32,
    pub k: Decimal,
    pub volume_base: Decimal,
    pub volume_quote: Decimal,
    pub taken_at: Timestamp,
}

impl PoolSnapshot {
    pub fn spot_price_base_to_quote(&self) -> Decimal {
        if self.reserve_base.is_zero() {
            return Decimal::ZERO;
        }
        self.reserve_quote / self.reserve_base
    }
}
