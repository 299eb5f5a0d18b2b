use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{PoolId, PoolSnapshot, SwapDirection, Timestamp, TokenInfo};

/// Incoming quote request from the API layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub pool_id: PoolId,
    pub from_token: String,
    pub to_token: String,
    pub amount_in: Decimal,
    pub max_slippage_bps: u32,
}

impl QuoteRequest {
    pub fn new(
        pool_id: impl Into<PoolId>,
        from_token: impl Into<String>,
        to_token: impl Into<String>,
        amount_in: Decimal,
        max_slippage_bps: u32,
    ) -> Self {
        Self {
            pool_id: pool_id.into(),
            from_token: from_token.into(),
            to_token: to_token.into(),
            amount_in,
            max_slippage_bps,
        }
    }
}

/// How severe a quote's price impact is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactSeverity {
    Low,
    Medium,
    High,
}

impl ImpactSeverity {
    pub fn classify(impact_pct: Decimal, medium_pct: Decimal, high_pct: Decimal) -> Self {
        if impact_pct > high_pct {
            ImpactSeverity::High
        } else if impact_pct >= medium_pct {
            ImpactSeverity::Medium
        } else {
            ImpactSeverity::Low
        }
    }
}

impl fmt::Display for ImpactSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpactSeverity::Low => write!(f, "low"),
            ImpactSeverity::Medium => write!(f, "medium"),
            ImpactSeverity::High => write!(f, "high"),
        }
    }
}

/// Oracle price attached to a quote for display only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePrice {
    pub price: Decimal,
    pub price_change_percent: Decimal,
    pub sampled_at: Timestamp,
    pub stale: bool,
    /// Pool spot rate deviation from the oracle price, in percent
    pub deviation_pct: Decimal,
}

/// A priced, time-bounded offer to swap against one pool snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub quote_id: String,
    pub pool_id: PoolId,
    pub direction: SwapDirection,
    pub token_in: TokenInfo,
    pub token_out: TokenInfo,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    pub min_amount_out: Decimal,
    pub price_impact_pct: Decimal,
    pub impact_severity: ImpactSeverity,
    pub effective_rate: Decimal,
    pub spot_rate: Decimal,
    pub max_slippage_bps: u32,
    pub snapshot: PoolSnapshot,
    pub reference_price: Option<ReferencePrice>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Quote {
    pub fn is_expired_at(&self, at: Timestamp) -> bool {
        at > self.expires_at
    }

    /// Get human-readable description
    pub fn description(&self) -> String {
        format!(
            "{} {} -> {} {} on {} (impact {:.4}%, min {})",
            self.amount_in,
            self.token_in.symbol,
            self.amount_out,
            self.token_out.symbol,
            self.pool_id,
            self.price_impact_pct,
            self.min_amount_out,
        )
    }
}

/// Quote response returned to the API layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub quote_id: String,
    pub amount_out: Decimal,
    pub price_impact_pct: Decimal,
    pub effective_rate: Decimal,
    pub min_amount_out: Decimal,
    pub expires_at: Timestamp,
    pub impact_severity: ImpactSeverity,
}

impl From<&Quote> for QuoteResponse {
    fn from(quote: &Quote) -> Self {
        Self {
            quote_id: quote.quote_id.clone(),
            amount_out: quote.amount_out,
            price_impact_pct: quote.price_impact_pct,
            effective_rate: quote.effective_rate,
            min_amount_out: quote.min_amount_out,
            expires_at: quote.expires_at,
            impact_severity: quote.impact_severity,
        }
    }
}
