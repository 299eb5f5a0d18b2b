use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::oracle::cache::OracleCache;
use crate::pool::{LiquidityPool, PoolRegistry};
use crate::quote::book::QuoteBook;
use crate::types::{
    BPS_DENOMINATOR, ImpactSeverity, Quote, QuoteRequest, Result, SwapDirection, SwapError,
    Timestamp, now,
};
use crate::utils::config::EngineConfig;
use crate::utils::math::apply_slippage_tolerance;

pub trait QuoteEngine: Send + Sync {
    /// Price a request against the live pool. Never mutates pool state.
    fn quote(&self, request: &QuoteRequest) -> Result<Quote>;

    /// Look up a previously issued quote
    fn issued(&self, quote_id: &str) -> Result<Quote>;
}

/// Price `amount_in` of `from` against one pool state.
///
/// Pure: the same pool, request and `at` always give the same numbers
/// (only the quote id differs).
pub fn get_quote(
    pool: &LiquidityPool,
    from: &str,
    to: &str,
    amount_in: Decimal,
    max_slippage_bps: u32,
    config: &EngineConfig,
    at: Timestamp,
) -> Result<Quote> {
    if amount_in <= Decimal::ZERO {
        return Err(SwapError::InvalidAmount { amount: amount_in });
    }
    if max_slippage_bps > BPS_DENOMINATOR {
        return Err(SwapError::InvalidSlippage { bps: max_slippage_bps });
    }

    let direction = pool.direction(from, to)?;
    let token_in = pool.token_in(direction).clone();
    let token_out = pool.token_out(direction).clone();

    let amount_out = pool.settlable_output(direction, amount_in)?;
    if amount_out.is_zero() {
        return Err(SwapError::AmountTooSmall {
            amount_in,
            token: token_out.symbol.clone(),
            decimals: token_out.decimals,
        });
    }

    let price_impact_pct = pool.price_impact(direction, amount_in)?;
    let spot_rate = pool.spot_rate(direction)?;
    let min_amount_out = token_out.quantize(apply_slippage_tolerance(amount_out, max_slippage_bps));
    let impact_severity = ImpactSeverity::classify(
        price_impact_pct,
        config.medium_impact_pct,
        config.high_impact_pct,
    );

    Ok(Quote {
        quote_id: Uuid::new_v4().to_string(),
        pool_id: pool.pool_id.clone(),
        direction,
        token_in,
        token_out,
        amount_in,
        amount_out,
        min_amount_out,
        price_impact_pct,
        impact_severity,
        effective_rate: amount_out / amount_in,
        spot_rate,
        max_slippage_bps,
        snapshot: pool.snapshot(),
        reference_price: None,
        created_at: at,
        expires_at: at + config.quote_validity_ms,
    })
}

pub struct DefaultQuoteEngine {
    registry: Arc<PoolRegistry>,
    book: Arc<QuoteBook>,
    oracle: Option<Arc<OracleCache>>,
    config: EngineConfig,
}

impl DefaultQuoteEngine {
    pub fn new(
        registry: Arc<PoolRegistry>,
        book: Arc<QuoteBook>,
        oracle: Option<Arc<OracleCache>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            book,
            oracle,
            config,
        }
    }

    fn annotate(&self, quote: &mut Quote) {
        let Some(oracle) = &self.oracle else {
            return;
        };
        // Oracle keys quote the base token in units of the quote token
        let pool_spot = match quote.direction {
            SwapDirection::BaseToQuote => quote.spot_rate,
            SwapDirection::QuoteToBase => quote.snapshot.spot_price_base_to_quote(),
        };
        quote.reference_price = oracle.reference_price(&quote.snapshot.pair.symbol(), pool_spot);
    }
}

impl QuoteEngine for DefaultQuoteEngine {
    fn quote(&self, request: &QuoteRequest) -> Result<Quote> {
        // Rejected before any pool access
        if request.amount_in <= Decimal::ZERO {
            return Err(SwapError::InvalidAmount { amount: request.amount_in });
        }

        let pool = self.registry.get(&request.pool_id)?.read()?;
        let mut quote = get_quote(
            &pool,
            &request.from_token,
            &request.to_token,
            request.amount_in,
            request.max_slippage_bps,
            &self.config,
            now(),
        )?;
        self.annotate(&mut quote);

        if quote.impact_severity == ImpactSeverity::High {
            warn!("High price impact quote: {}", quote.description());
        } else {
            debug!("Quote {}: {}", quote.quote_id, quote.description());
        }

        self.book.insert(quote.clone())?;
        Ok(quote)
    }

    fn issued(&self, quote_id: &str) -> Result<Quote> {
        self.book.get(quote_id)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::oracle::cache::tests::sample;
    use crate::pool::model::tests::reference_pool;

    fn engine_with(oracle: Option<Arc<OracleCache>>) -> (DefaultQuoteEngine, Arc<QuoteBook>) {
        let registry = Arc::new(PoolRegistry::new());
        registry.register(reference_pool()).unwrap();
        let book = Arc::new(QuoteBook::new());
        let engine = DefaultQuoteEngine::new(registry, book.clone(), oracle, EngineConfig::default());
        (engine, book)
    }

    #[test]
    fn test_reference_quote() {
        let (engine, book) = engine_with(None);
        let request = QuoteRequest::new("gld-usdc", "GLD", "USDC", dec!(1000), 50);
        let quote = engine.quote(&request).unwrap();

        assert_eq!(quote.amount_out, dec!(5.162836));
        assert_eq!(quote.min_amount_out, dec!(5.137021));
        assert!(quote.price_impact_pct > dec!(0.3) && quote.price_impact_pct < dec!(1));
        assert_eq!(quote.impact_severity, ImpactSeverity::Low);
        assert_eq!(quote.effective_rate, quote.amount_out / dec!(1000));
        assert_eq!(quote.expires_at - quote.created_at, 15_000);
        assert!(quote.reference_price.is_none());

        // Quoting leaves the pool untouched
        assert_eq!(quote.snapshot.reserve_quote, dec!(523));
        assert_eq!(engine.issued(&quote.quote_id).unwrap().amount_out, quote.amount_out);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_zero_amount_rejected_without_pool_access() {
        let (engine, _) = engine_with(None);
        // The pool id does not exist: the amount check must fire first
        let request = QuoteRequest::new("no-such-pool", "GLD", "USDC", Decimal::ZERO, 50);
        assert!(matches!(engine.quote(&request), Err(SwapError::InvalidAmount { .. })));
    }

    #[test]
    fn test_unsupported_pair() {
        let (engine, _) = engine_with(None);
        let request = QuoteRequest::new("gld-usdc", "GLD", "HBAR", dec!(10), 50);
        assert!(matches!(engine.quote(&request), Err(SwapError::UnsupportedPair { .. })));
    }

    #[test]
    fn test_amount_too_small() {
        let (engine, _) = engine_with(None);
        // 0.00000001 GLD buys far less than one micro-USDC
        let request = QuoteRequest::new("gld-usdc", "GLD", "USDC", dec!(0.00000001), 50);
        assert!(matches!(engine.quote(&request), Err(SwapError::AmountTooSmall { .. })));
    }

    #[test]
    fn test_invalid_slippage() {
        let (engine, _) = engine_with(None);
        let request = QuoteRequest::new("gld-usdc", "GLD", "USDC", dec!(10), 10_001);
        assert!(matches!(engine.quote(&request), Err(SwapError::InvalidSlippage { bps: 10_001 })));
    }

    #[test]
    fn test_high_impact_still_quoted() {
        let (engine, _) = engine_with(None);
        let request = QuoteRequest::new("gld-usdc", "GLD", "USDC", dec!(50000), 5000);
        let quote = engine.quote(&request).unwrap();
        assert!(quote.price_impact_pct > dec!(15));
        assert_eq!(quote.impact_severity, ImpactSeverity::High);
        assert!(quote.amount_out < dec!(523));
    }

    #[test]
    fn test_reverse_direction_quote() {
        let (engine, _) = engine_with(None);
        let request = QuoteRequest::new("gld-usdc", "USDC", "GLD", dec!(5), 100);
        let quote = engine.quote(&request).unwrap();
        assert_eq!(quote.direction, SwapDirection::QuoteToBase);
        assert_eq!(quote.token_out.symbol, "GLD");
        // Roughly 5 / 0.00523 GLD minus fee and impact
        assert!(quote.amount_out > dec!(900) && quote.amount_out < dec!(956));
    }

    #[test]
    fn test_oracle_annotation_is_display_only() {
        let oracle = Arc::new(OracleCache::new(Duration::from_secs(10)));
        oracle.publish(vec![sample("GLD/USDC", dec!(0.006))]);
        let (engine, _) = engine_with(Some(oracle.clone()));

        let request = QuoteRequest::new("gld-usdc", "GLD", "USDC", dec!(1000), 50);
        let quote = engine.quote(&request).unwrap();
        let reference = quote.reference_price.unwrap();
        assert_eq!(reference.price, dec!(0.006));
        assert!(!reference.stale);
        // Pool pricing is unchanged by the oracle
        assert_eq!(quote.amount_out, dec!(5.162836));

        // A stale oracle is still shown, flagged, and still ignored for pricing
        oracle.publish_at(vec![sample("GLD/USDC", dec!(0.006))], 1);
        let quote = engine.quote(&request).unwrap();
        assert!(quote.reference_price.unwrap().stale);
        assert_eq!(quote.amount_out, dec!(5.162836));
    }

    #[test]
    fn test_purge_expired_quotes() {
        let (engine, book) = engine_with(None);
        let request = QuoteRequest::new("gld-usdc", "GLD", "USDC", dec!(1000), 50);
        let quote = engine.quote(&request).unwrap();

        assert_eq!(book.purge_expired(quote.expires_at), 0);
        assert_eq!(book.purge_expired(quote.expires_at + 1), 1);
        assert!(matches!(engine.issued(&quote.quote_id), Err(SwapError::UnknownQuote { .. })));
    }
}
