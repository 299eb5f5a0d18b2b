use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::execution::{
    AuditLog, DefaultSwapExecutor, DefaultSwapValidator, InMemoryAuditLog, JsonlAuditLog, SwapExecutor,
};
use crate::oracle::{HttpPriceFeed, OracleCache, OracleRefresher, PriceFeed, RefreshStats};
use crate::pool::{LiquidityPool, PoolRegistry};
use crate::quote::{DefaultQuoteEngine, QuoteBook, QuoteEngine};
use crate::types::{
    ExecuteRequest, ExecutionStats, OracleSnapshot, PoolSnapshot, Quote, QuoteRequest, QuoteResponse,
    Result, SwapError, SwapReceipt, now,
};
use crate::utils::config::{Config, EngineConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub pools: usize,
    pub live_quotes: usize,
    pub execution: ExecutionStats,
    pub oracle: Option<RefreshStats>,
    pub oracle_stale: bool,
}

/// Quote and settle swaps across every registered pool.
///
/// Quoting and execution work as soon as the engine is built; `start` only
/// launches the background oracle refresh and quote expiry loops.
pub struct SwapEngine {
    registry: Arc<PoolRegistry>,
    book: Arc<QuoteBook>,
    quotes: Arc<dyn QuoteEngine>,
    executor: Arc<dyn SwapExecutor>,
    oracle: Arc<OracleCache>,
    refresher: Option<Arc<OracleRefresher>>,
    config: EngineConfig,
    shutdown_sender: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SwapEngine {
    pub fn quote(&self, request: &QuoteRequest) -> Result<Quote> {
        self.quotes.quote(request)
    }

    /// Quote using the configured default slippage tolerance
    pub fn quote_amount(&self, pool_id: &str, from: &str, to: &str, amount_in: Decimal) -> Result<QuoteResponse> {
        let request = QuoteRequest::new(pool_id, from, to, amount_in, self.config.default_max_slippage_bps);
        Ok(QuoteResponse::from(&self.quote(&request)?))
    }

    pub fn issued_quote(&self, quote_id: &str) -> Result<Quote> {
        self.quotes.issued(quote_id)
    }

    pub async fn execute(&self, request: ExecuteRequest) -> Result<SwapReceipt> {
        self.executor.execute(request).await
    }

    /// Execute independent requests concurrently; results keep request order
    pub async fn execute_batch(&self, requests: Vec<ExecuteRequest>) -> Vec<Result<SwapReceipt>> {
        debug!("Executing batch of {} swaps", requests.len());
        join_all(requests.into_iter().map(|request| self.executor.execute(request))).await
    }

    pub fn register_pool(&self, pool: LiquidityPool) -> Result<()> {
        self.registry.register(pool)
    }

    pub fn pool_snapshot(&self, pool_id: &str) -> Result<PoolSnapshot> {
        self.registry.snapshot(pool_id)
    }

    pub fn pools(&self) -> Vec<PoolSnapshot> {
        self.registry.snapshots()
    }

    pub fn oracle_snapshot(&self) -> Arc<OracleSnapshot> {
        self.oracle.current()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            pools: self.registry.len(),
            live_quotes: self.book.len(),
            execution: self.executor.stats(),
            oracle: self.refresher.as_ref().map(|r| r.stats()),
            oracle_stale: self.oracle.is_stale(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Launch background loops; a no-op when already running
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        info!("Starting swap engine with {} pools", self.registry.len());

        self.shutdown_sender.send_replace(false);
        let shutdown = self.shutdown_sender.subscribe();

        match &self.refresher {
            Some(refresher) => {
                // Run one refresh up front so the first quotes carry a reference price
                if let Err(e) = refresher.refresh_once().await {
                    warn!("Initial oracle refresh failed, continuing on pool pricing: {}", e);
                }
                self.tasks.push(refresher.clone().spawn(shutdown));
            }
            None => {
                info!("No price feed configured; quotes use pool pricing only");
                self.tasks
                    .push(spawn_quote_expiry(self.book.clone(), self.config.quote_validity(), shutdown));
            }
        }

        Ok(())
    }

    /// Signal every background loop and wait for it to exit
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping swap engine gracefully...");
        let _ = self.shutdown_sender.send(true);

        for result in join_all(self.tasks.drain(..)).await {
            if let Err(e) = result {
                return Err(SwapError::Execution(format!("Background task failed: {}", e)));
            }
        }

        let stats = self.executor.stats();
        info!(
            "Swap engine stopped: {} settled, {} rejected, {} expired",
            stats.settled, stats.rejected, stats.expired
        );
        Ok(())
    }
}

/// Purges expired quotes when no oracle refresher is running to do it
fn spawn_quote_expiry(book: Arc<QuoteBook>, every: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    book.purge_expired(now());
                }
            }
        }
    })
}

pub struct SwapEngineBuilder {
    config: Option<Config>,
    feed: Option<Arc<dyn PriceFeed>>,
    audit: Option<Arc<dyn AuditLog>>,
    pools: Vec<LiquidityPool>,
}

impl SwapEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            feed: None,
            audit: None,
            pools: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the HTTP feed from config
    pub fn with_price_feed(mut self, feed: Arc<dyn PriceFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Overrides the audit log from config
    pub fn with_audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_pool(mut self, pool: LiquidityPool) -> Self {
        self.pools.push(pool);
        self
    }

    pub async fn build(self) -> Result<SwapEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let registry = Arc::new(PoolRegistry::from_configs(&config.pools)?);
        for pool in self.pools {
            registry.register(pool)?;
        }

        let book = Arc::new(QuoteBook::new());
        let oracle = Arc::new(OracleCache::new(config.oracle.stale_after()));

        let feed: Option<Arc<dyn PriceFeed>> = match (self.feed, &config.oracle.feed_url) {
            (Some(feed), _) => Some(feed),
            (None, Some(url)) if config.oracle.enabled => {
                Some(Arc::new(HttpPriceFeed::new(url.clone(), config.oracle.request_timeout())?))
            }
            _ => None,
        };
        let refresher = feed.map(|feed| {
            Arc::new(OracleRefresher::new(
                feed,
                oracle.clone(),
                Some(book.clone()),
                config.oracle.clone(),
            ))
        });

        let audit: Arc<dyn AuditLog> = match (self.audit, &config.audit.path) {
            (Some(audit), _) => audit,
            (None, Some(path)) => Arc::new(JsonlAuditLog::open(path).await?),
            (None, None) => Arc::new(InMemoryAuditLog::new()),
        };

        let quotes = Arc::new(DefaultQuoteEngine::new(
            registry.clone(),
            book.clone(),
            Some(oracle.clone()),
            config.engine.clone(),
        ));
        let executor = Arc::new(DefaultSwapExecutor::new(
            registry.clone(),
            book.clone(),
            audit,
            Arc::new(DefaultSwapValidator::new()),
            config.engine.clone(),
        ));

        let (shutdown_sender, _) = watch::channel(false);

        Ok(SwapEngine {
            registry,
            book,
            quotes,
            executor,
            oracle,
            refresher,
            config: config.engine,
            shutdown_sender,
            tasks: Vec::new(),
        })
    }
}

impl Default for SwapEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
