use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{PoolId, Timestamp};

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Invalid amount: {amount} (must be greater than zero)")]
    InvalidAmount { amount: Decimal },

    #[error("Invalid slippage tolerance: {bps} bps exceeds 10000")]
    InvalidSlippage { bps: u32 },

    #[error("Unsupported pair {from}->{to} for pool {pool_id}")]
    UnsupportedPair { pool_id: PoolId, from: String, to: String },

    #[error("Amount too small: {amount_in} in yields zero {token} at {decimals} decimals")]
    AmountTooSmall { amount_in: Decimal, token: String, decimals: u8 },

    #[error("Insufficient liquidity in pool {pool_id}: requested {requested}, reserve {available}")]
    InsufficientLiquidity { pool_id: PoolId, requested: Decimal, available: Decimal },

    #[error("Quote {quote_id} expired at {expired_at} (now {now}, {overdue_ms}ms overdue)")]
    QuoteExpired { quote_id: String, expired_at: Timestamp, now: Timestamp, overdue_ms: u64 },

    #[error("Unknown quote {quote_id}")]
    UnknownQuote { quote_id: String },

    #[error("Quote {quote_id} already settled as receipt {receipt_id}")]
    QuoteAlreadySettled { quote_id: String, receipt_id: String },

    #[error("Idempotency token {idempotency_token} already used by receipt {receipt_id} for a different swap")]
    IdempotencyConflict { idempotency_token: String, receipt_id: String },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("Slippage exceeded: minimum {min_amount_out}, got {actual_amount_out} (short by {shortfall})")]
    SlippageExceeded { min_amount_out: Decimal, actual_amount_out: Decimal, shortfall: Decimal },

    #[error("Settlement lock on pool {pool_id} not acquired within {waited_ms}ms")]
    SettlementTimeout { pool_id: PoolId, waited_ms: u64 },

    #[error("Invariant violation in pool {pool_id}: k fell from {k_before} to {k_after}")]
    InvariantViolation { pool_id: PoolId, k_before: Decimal, k_after: Decimal },

    #[error("Pool {pool_id} is halted")]
    PoolHalted { pool_id: PoolId },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Arithmetic overflow: {0}")]
    Arithmetic(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SwapError>;

impl SwapError {
    /// Caller may retry with new parameters
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SwapError::InvalidAmount { .. }
                | SwapError::InvalidSlippage { .. }
                | SwapError::UnsupportedPair { .. }
                | SwapError::AmountTooSmall { .. }
                | SwapError::InsufficientLiquidity { .. }
                | SwapError::QuoteExpired { .. }
                | SwapError::UnknownQuote { .. }
                | SwapError::QuoteAlreadySettled { .. }
                | SwapError::IdempotencyConflict { .. }
                | SwapError::InsufficientBalance { .. }
                | SwapError::SlippageExceeded { .. }
        )
    }

    /// Caller may retry the same request with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, SwapError::SettlementTimeout { .. })
    }

    /// Reserve accounting diverged from the constant-product model
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SwapError::InvariantViolation { .. } | SwapError::PoolHalted { .. }
        )
    }

    pub fn liquidity(pool_id: impl Into<PoolId>, requested: Decimal, available: Decimal) -> Self {
        Self::InsufficientLiquidity {
            pool_id: pool_id.into(),
            requested,
            available,
        }
    }
}

impl From<config::ConfigError> for SwapError {
    fn from(err: config::ConfigError) -> Self {
        SwapError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for SwapError {
    fn from(err: toml::de::Error) -> Self {
        SwapError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_error_classification() {
        let slippage = SwapError::SlippageExceeded {
            min_amount_out: dec!(5),
            actual_amount_out: dec!(4.5),
            shortfall: dec!(0.5),
        };
        assert!(slippage.is_recoverable());
        assert!(!slippage.is_fatal());

        let timeout = SwapError::SettlementTimeout { pool_id: "p".into(), waited_ms: 10 };
        assert!(timeout.is_retryable());
        assert!(!timeout.is_recoverable());

        let violation = SwapError::InvariantViolation {
            pool_id: "p".into(),
            k_before: dec!(10),
            k_after: dec!(9),
        };
        assert!(violation.is_fatal());
        assert!(!violation.is_retryable());

        let reused = SwapError::QuoteAlreadySettled { quote_id: "q".into(), receipt_id: "r".into() };
        assert!(reused.is_recoverable());
        assert!(!reused.is_retryable());
    }

    #[test]
    fn test_rejection_message_carries_detail() {
        let err = SwapError::InsufficientBalance { required: dec!(100), available: dec!(40) };
        let msg = err.to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("40"));
    }
}
