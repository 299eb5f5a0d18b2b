use rust_decimal::Decimal;

use crate::types::{Quote, Result, SwapError, Timestamp};

/// Per-request checks that run before and during settlement.
///
/// Each check fails with the structured error naming the violated bound.
pub trait SwapValidator: Send + Sync {
    fn check_expiry(&self, quote: &Quote, at: Timestamp) -> Result<()>;

    fn check_balance(&self, amount_in: Decimal, caller_balance: Decimal) -> Result<()>;

    fn check_slippage(&self, quote: &Quote, actual_amount_out: Decimal) -> Result<()>;
}

pub struct DefaultSwapValidator;

impl DefaultSwapValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DefaultSwapValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SwapValidator for DefaultSwapValidator {
    fn check_expiry(&self, quote: &Quote, at: Timestamp) -> Result<()> {
        if quote.is_expired_at(at) {
            return Err(SwapError::QuoteExpired {
                quote_id: quote.quote_id.clone(),
                expired_at: quote.expires_at,
                now: at,
                overdue_ms: at.saturating_sub(quote.expires_at),
            });
        }
        Ok(())
    }

    fn check_balance(&self, amount_in: Decimal, caller_balance: Decimal) -> Result<()> {
        if amount_in <= Decimal::ZERO {
            return Err(SwapError::InvalidAmount { amount: amount_in });
        }
        if caller_balance < amount_in {
            return Err(SwapError::InsufficientBalance {
                required: amount_in,
                available: caller_balance,
            });
        }
        Ok(())
    }

    fn check_slippage(&self, quote: &Quote, actual_amount_out: Decimal) -> Result<()> {
        if actual_amount_out < quote.min_amount_out {
            return Err(SwapError::SlippageExceeded {
                min_amount_out: quote.min_amount_out,
                actual_amount_out,
                shortfall: quote.min_amount_out - actual_amount_out,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::pool::model::tests::reference_pool;
    use crate::quote::get_quote;
    use crate::utils::config::EngineConfig;

    fn quote() -> Quote {
        get_quote(&reference_pool(), "GLD", "USDC", dec!(1000), 50, &EngineConfig::default(), 1_000).unwrap()
    }

    #[test]
    fn test_expiry_boundary() {
        let validator = DefaultSwapValidator::new();
        let quote = quote();
        assert!(validator.check_expiry(&quote, quote.expires_at).is_ok());

        match validator.check_expiry(&quote, quote.expires_at + 250) {
            Err(SwapError::QuoteExpired { overdue_ms, .. }) => assert_eq!(overdue_ms, 250),
            other => panic!("expected QuoteExpired, got {:?}", other),
        }
    }

    #[test]
    fn test_balance() {
        let validator = DefaultSwapValidator::new();
        assert!(validator.check_balance(dec!(1000), dec!(1000)).is_ok());
        assert!(matches!(
            validator.check_balance(dec!(1000), dec!(999.99)),
            Err(SwapError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            validator.check_balance(Decimal::ZERO, dec!(10)),
            Err(SwapError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_slippage_reports_shortfall() {
        let validator = DefaultSwapValidator::new();
        let quote = quote();
        assert!(validator.check_slippage(&quote, quote.min_amount_out).is_ok());

        match validator.check_slippage(&quote, dec!(5.1)) {
            Err(SwapError::SlippageExceeded { shortfall, .. }) => assert_eq!(shortfall, dec!(0.037021)),
            other => panic!("expected SlippageExceeded, got {:?}", other),
        }
    }
}
