use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::debug;

use crate::types::{OraclePriceSample, OracleSnapshot, ReferencePrice, Timestamp, now};

/// Latest oracle snapshot, swapped wholesale on every successful refresh.
///
/// Readers get an `Arc` to a complete snapshot and keep it for as long as
/// they like; a concurrent publish never mutates what they hold.
pub struct OracleCache {
    current: RwLock<Arc<OracleSnapshot>>,
    sequence: AtomicU64,
    stale_after_ms: u64,
}

impl OracleCache {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            current: RwLock::new(Arc::new(OracleSnapshot::new())),
            sequence: AtomicU64::new(0),
            stale_after_ms: stale_after.as_millis() as u64,
        }
    }

    pub fn publish(&self, samples: Vec<OraclePriceSample>) -> u64 {
        self.publish_at(samples, now())
    }

    /// Replace the snapshot; returns the new sequence number
    pub fn publish_at(&self, samples: Vec<OraclePriceSample>, fetched_at: Timestamp) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(OracleSnapshot::from_samples(samples, fetched_at, sequence));
        let count = snapshot.samples.len();

        match self.current.write() {
            Ok(mut current) => *current = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }

        debug!("Published oracle snapshot #{} with {} prices", sequence, count);
        sequence
    }

    pub fn current(&self) -> Arc<OracleSnapshot> {
        self.current
            .read()
            .map(|snapshot| Arc::clone(&snapshot))
            .unwrap_or_default()
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(now())
    }

    /// An empty cache counts as stale
    pub fn is_stale_at(&self, at: Timestamp) -> bool {
        let snapshot = self.current();
        snapshot.sequence == 0 || snapshot.age_ms_at(at) > self.stale_after_ms
    }

    pub fn reference_price(&self, pair: &str, pool_spot: Decimal) -> Option<ReferencePrice> {
        self.reference_price_at(pair, pool_spot, now())
    }

    /// Display annotation for a quote: the oracle price and how far the pool's spot rate is from it
    pub fn reference_price_at(&self, pair: &str, pool_spot: Decimal, at: Timestamp) -> Option<ReferencePrice> {
        let snapshot = self.current();
        let sample = snapshot.get(pair)?;

        let deviation_pct = if sample.price.is_zero() {
            Decimal::ZERO
        } else {
            (pool_spot - sample.price) / sample.price * Decimal::ONE_HUNDRED
        };

        Some(ReferencePrice {
            price: sample.price,
            price_change_percent: sample.price_change_percent,
            sampled_at: sample.sampled_at,
            stale: snapshot.age_ms_at(at) > self.stale_after_ms,
            deviation_pct,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    pub(crate) fn sample(pair: &str, price: Decimal) -> OraclePriceSample {
        OraclePriceSample {
            pair: pair.to_string(),
            price,
            price_change_percent: dec!(1.5),
            sampled_at: now(),
            source: "test".into(),
        }
    }

    #[test]
    fn test_empty_cache_is_stale() {
        let cache = OracleCache::new(Duration::from_secs(10));
        assert!(cache.is_stale());
        assert!(cache.current().is_empty());
        assert!(cache.reference_price("GLD/USDC", dec!(1)).is_none());
    }

    #[test]
    fn test_publish_replaces_whole_snapshot() {
        let cache = OracleCache::new(Duration::from_secs(10));
        cache.publish(vec![sample("GLD/USDC", dec!(0.005)), sample("HBAR/USDC", dec!(0.07))]);
        let held = cache.current();

        let seq = cache.publish(vec![sample("GLD/USDC", dec!(0.006))]);
        assert_eq!(seq, 2);

        // The earlier reader still sees its complete snapshot
        assert_eq!(held.samples.len(), 2);
        assert_eq!(held.sequence, 1);

        let fresh = cache.current();
        assert_eq!(fresh.samples.len(), 1);
        assert!(fresh.get("HBAR/USDC").is_none());
    }

    #[test]
    fn test_staleness_threshold() {
        let cache = OracleCache::new(Duration::from_millis(10_000));
        cache.publish_at(vec![sample("GLD/USDC", dec!(0.005))], 1_000);

        assert!(!cache.is_stale_at(5_000));
        assert!(!cache.is_stale_at(11_000));
        assert!(cache.is_stale_at(11_001));

        let reference = cache.reference_price_at("GLD/USDC", dec!(0.00523), 20_000).unwrap();
        assert!(reference.stale);
        assert_eq!(reference.price, dec!(0.005));
        assert_eq!(reference.deviation_pct, dec!(4.6));
    }
}
