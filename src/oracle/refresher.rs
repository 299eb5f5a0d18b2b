use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::oracle::cache::OracleCache;
use crate::oracle::feed::PriceFeed;
use crate::quote::book::QuoteBook;
use crate::types::{OraclePriceSample, Result, SwapError, Timestamp, now};
use crate::utils::config::OracleConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshStats {
    pub refreshes: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
    pub quotes_purged: u64,
    pub last_success: Option<Timestamp>,
}

/// Polls the price feed on a fixed schedule and publishes into the cache.
///
/// Polls are spaced by `poll_interval` even when a fetch overruns, so a slow
/// feed is never hammered. A failed refresh keeps the previous snapshot,
/// which goes stale on its own once it ages past the threshold.
pub struct OracleRefresher {
    feed: Arc<dyn PriceFeed>,
    cache: Arc<OracleCache>,
    book: Option<Arc<QuoteBook>>,
    config: OracleConfig,
    refreshes: AtomicU64,
    failures: AtomicU64,
    consecutive_failures: AtomicU64,
    quotes_purged: AtomicU64,
    last_success: AtomicU64,
}

impl OracleRefresher {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        cache: Arc<OracleCache>,
        book: Option<Arc<QuoteBook>>,
        config: OracleConfig,
    ) -> Self {
        Self {
            feed,
            cache,
            book,
            config,
            refreshes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            quotes_purged: AtomicU64::new(0),
            last_success: AtomicU64::new(0),
        }
    }

    pub async fn fetch_with_retry(&self) -> Result<Vec<OraclePriceSample>> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            debug!("Oracle fetch attempt {}/{} from {}", attempt + 1, attempts, self.feed.name());

            match self.feed.fetch().await {
                Ok(samples) => return Ok(samples),
                Err(e) => {
                    warn!("Oracle fetch attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);

                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                }
            }
        }

        Err(SwapError::Oracle(format!(
            "Failed to refresh from {} after {} attempts: {}",
            self.feed.name(),
            attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// One refresh; returns how many prices were published
    pub async fn refresh_once(&self) -> Result<usize> {
        match self.fetch_with_retry().await {
            Ok(samples) => {
                let count = samples.len();
                let sequence = self.cache.publish(samples);
                self.refreshes.fetch_add(1, Ordering::Relaxed);
                self.consecutive_failures.store(0, Ordering::Relaxed);
                self.last_success.store(now(), Ordering::Relaxed);
                let stats = self.cache.current().get_stats();
                debug!(
                    "Oracle snapshot #{} published ({} prices, {}ms old)",
                    sequence, stats.price_count, stats.age_ms
                );
                Ok(count)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let streak = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if self.cache.is_stale() {
                    warn!("Oracle prices stale after {} failed refreshes; pool pricing only", streak);
                }
                Err(e)
            }
        }
    }

    /// Refresh, then drop quotes that can no longer be executed
    pub async fn tick(&self) {
        if let Err(e) = self.refresh_once().await {
            error!("Oracle refresh failed: {}", e);
        }

        if let Some(book) = &self.book {
            let purged = book.purge_expired(now());
            self.quotes_purged.fetch_add(purged as u64, Ordering::Relaxed);
        }
    }

    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Oracle refresher started: {} every {:?}",
                self.feed.name(),
                self.config.poll_interval()
            );
            let mut ticker = tokio::time::interval(self.config.poll_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                }
            }

            info!("Oracle refresher stopped");
        })
    }

    pub fn stats(&self) -> RefreshStats {
        let last_success = self.last_success.load(Ordering::Relaxed);
        RefreshStats {
            refreshes: self.refreshes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            quotes_purged: self.quotes_purged.load(Ordering::Relaxed),
            last_success: (last_success > 0).then_some(last_success),
        }
    }
}
