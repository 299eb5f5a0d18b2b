use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::types::{Quote, Result, SwapError, Timestamp};

/// Issued quotes, held until they settle or expire so execution can refer to them by id
pub struct QuoteBook {
    quotes: RwLock<HashMap<String, Quote>>,
}

impl QuoteBook {
    pub fn new() -> Self {
        Self {
            quotes: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, quote: Quote) -> Result<()> {
        let mut quotes = self
            .quotes
            .write()
            .map_err(|_| SwapError::InvalidState("Quote book lock poisoned".into()))?;
        quotes.insert(quote.quote_id.clone(), quote);
        Ok(())
    }

    pub fn get(&self, quote_id: &str) -> Result<Quote> {
        let quotes = self
            .quotes
            .read()
            .map_err(|_| SwapError::InvalidState("Quote book lock poisoned".into()))?;
        quotes
            .get(quote_id)
            .cloned()
            .ok_or_else(|| SwapError::UnknownQuote { quote_id: quote_id.to_string() })
    }

    /// Consume a quote so it cannot back a second settlement
    pub fn take(&self, quote_id: &str) -> Option<Quote> {
        self.quotes.write().ok()?.remove(quote_id)
    }

    /// Drop every quote that expired before `at`; returns how many were dropped
    pub fn purge_expired(&self, at: Timestamp) -> usize {
        let Ok(mut quotes) = self.quotes.write() else {
            return 0;
        };
        let before = quotes.len();
        quotes.retain(|_, quote| !quote.is_expired_at(at));
        let purged = before - quotes.len();
        if purged > 0 {
            debug!("Purged {} expired quotes, {} live", purged, quotes.len());
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.quotes.read().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QuoteBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::pool::model::tests::reference_pool;
    use crate::quote::get_quote;
    use crate::utils::config::EngineConfig;

    fn quote_at(at: Timestamp) -> Quote {
        get_quote(&reference_pool(), "GLD", "USDC", dec!(1000), 50, &EngineConfig::default(), at).unwrap()
    }

    #[test]
    fn test_take_consumes_once() {
        let book = QuoteBook::new();
        let quote = quote_at(1_000);
        book.insert(quote.clone()).unwrap();

        assert_eq!(book.take(&quote.quote_id).unwrap().quote_id, quote.quote_id);
        assert!(book.take(&quote.quote_id).is_none());
        assert!(matches!(book.get(&quote.quote_id), Err(SwapError::UnknownQuote { .. })));
        assert!(book.is_empty());
    }

    #[test]
    fn test_purge_keeps_live_quotes() {
        let book = QuoteBook::new();
        book.insert(quote_at(1_000)).unwrap();
        book.insert(quote_at(20_000)).unwrap();

        // Quotes live 15s by default
        assert_eq!(book.purge_expired(17_000), 1);
        assert_eq!(book.len(), 1);
    }
}
