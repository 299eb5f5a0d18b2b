use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{PoolId, PoolSnapshot, Quote, Timestamp, TokenInfo};

/// Which quote an execute request settles against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QuoteRef {
    /// A quote previously issued by this engine and held in the quote book
    Issued(String),
    /// A quote carried by the caller
    Provided(Box<Quote>),
}

impl QuoteRef {
    pub fn quote_id(&self) -> &str {
        match self {
            QuoteRef::Issued(quote_id) => quote_id,
            QuoteRef::Provided(quote) => &quote.quote_id,
        }
    }
}

/// Execute request from the API layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub quote: QuoteRef,
    pub amount_in: Decimal,
    pub caller_balance: Decimal,
    pub idempotency_token: String,
    pub caller: String,
}

impl ExecuteRequest {
    pub fn for_quote(
        quote: &Quote,
        caller_balance: Decimal,
        idempotency_token: impl Into<String>,
        caller: impl Into<String>,
    ) -> Self {
        Self {
            quote: QuoteRef::Issued(quote.quote_id.clone()),
            amount_in: quote.amount_in,
            caller_balance,
            idempotency_token: idempotency_token.into(),
            caller: caller.into(),
        }
    }

    pub fn with_amount_in(mut self, amount_in: Decimal) -> Self {
        self.amount_in = amount_in;
        self
    }
}

/// Record of a settled swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub receipt_id: String,
    pub quote_id: String,
    pub idempotency_token: String,
    pub caller: String,
    pub pool_id: PoolId,
    pub token_in: TokenInfo,
    pub token_out: TokenInfo,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    pub price_impact_pct: Decimal,
    pub new_pool_state: PoolSnapshot,
    pub settled_at: Timestamp,
}

impl SwapReceipt {
    /// Get execution summary
    pub fn summary(&self) -> String {
        format!(
            "SETTLED {}: {} {} -> {} {} on {} (impact {:.4}%) reserves now {}/{}",
            self.receipt_id,
            self.amount_in,
            self.token_in.symbol,
            self.amount_out,
            self.token_out.symbol,
            self.pool_id,
            self.price_impact_pct,
            self.new_pool_state.reserve_base,
            self.new_pool_state.reserve_quote,
        )
    }
}

/// Lifecycle of a single swap attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapStatus {
    Requested,
    Validated,
    Settled,
    Rejected,
    Expired,
}

impl SwapStatus {
    pub fn can_transition_to(self, next: SwapStatus) -> bool {
        matches!(
            (self, next),
            (SwapStatus::Requested, SwapStatus::Validated)
                | (SwapStatus::Requested, SwapStatus::Expired)
                | (SwapStatus::Requested, SwapStatus::Rejected)
                | (SwapStatus::Validated, SwapStatus::Settled)
                | (SwapStatus::Validated, SwapStatus::Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SwapStatus::Settled | SwapStatus::Rejected | SwapStatus::Expired)
    }
}

/// Statistics for execution performance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total_attempts: u64,
    pub settled: u64,
    pub rejected: u64,
    pub expired: u64,
    pub duplicates: u64,
    /// Sum of `amount_in` over settled swaps, across all pools and tokens
    pub settled_volume_in: Decimal,
    pub last_settlement_time: Option<Timestamp>,
}

impl ExecutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, status: SwapStatus, amount_in: Decimal, at: Timestamp) {
        self.total_attempts += 1;
        match status {
            SwapStatus::Settled => {
                self.settled += 1;
                self.settled_volume_in += amount_in;
                self.last_settlement_time = Some(at);
            }
            SwapStatus::Expired => self.expired += 1,
            SwapStatus::Rejected => self.rejected += 1,
            SwapStatus::Requested | SwapStatus::Validated => {}
        }
    }

    pub fn success_rate(&self) -> Decimal {
        if self.total_attempts == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.settled) / Decimal::from(self.total_attempts) * Decimal::ONE_HUNDRED
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(SwapStatus::Requested.can_transition_to(SwapStatus::Validated));
        assert!(SwapStatus::Requested.can_transition_to(SwapStatus::Expired));
        assert!(SwapStatus::Validated.can_transition_to(SwapStatus::Settled));
        assert!(!SwapStatus::Validated.can_transition_to(SwapStatus::Expired));
        assert!(!SwapStatus::Settled.can_transition_to(SwapStatus::Rejected));
        assert!(SwapStatus::Expired.is_terminal());
        assert!(!SwapStatus::Validated.is_terminal());
    }

    #[test]
    fn test_quote_ref_id() {
        assert_eq!(QuoteRef::Issued("q-1".into()).quote_id(), "q-1");
    }

    #[test]
    fn test_stats_success_rate() {
        let mut stats = ExecutionStats::new();
        stats.record(SwapStatus::Settled, dec!(1000), 10);
        stats.record(SwapStatus::Rejected, dec!(500), 11);
        stats.record(SwapStatus::Settled, dec!(2.5), 12);
        stats.record(SwapStatus::Expired, dec!(7), 13);
        assert_eq!(stats.total_attempts, 4);
        assert_eq!(stats.success_rate(), Decimal::from(50));
        assert_eq!(stats.last_settlement_time, Some(12));
        // Only settled input counts as volume
        assert_eq!(stats.settled_volume_in, dec!(1002.5));
    }
}
