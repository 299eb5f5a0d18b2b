use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::execution::audit::AuditLog;
use crate::execution::validator::SwapValidator;
use crate::pool::{PoolHandle, PoolRegistry};
use crate::quote::book::QuoteBook;
use crate::types::{
    ExecuteRequest, ExecutionStats, Quote, QuoteRef, Result, SwapDirection, SwapError, SwapReceipt,
    SwapStatus, now,
};
use crate::utils::config::EngineConfig;
use crate::utils::math::calculate_slippage;

#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn execute(&self, request: ExecuteRequest) -> Result<SwapReceipt>;

    fn stats(&self) -> ExecutionStats;
}

enum Settlement {
    Settled(SwapReceipt),
    Duplicate(SwapReceipt),
}

/// Inputs the settlement task owns outright
struct SettlementJob {
    handle: Arc<PoolHandle>,
    book: Arc<QuoteBook>,
    audit: Arc<dyn AuditLog>,
    validator: Arc<dyn SwapValidator>,
    quote: Quote,
    direction: SwapDirection,
    amount_in: Decimal,
    idempotency_token: String,
    caller: String,
    timeout: std::time::Duration,
}

pub struct DefaultSwapExecutor {
    registry: Arc<PoolRegistry>,
    book: Arc<QuoteBook>,
    audit: Arc<dyn AuditLog>,
    validator: Arc<dyn SwapValidator>,
    config: EngineConfig,
    stats: Mutex<ExecutionStats>,
}

impl DefaultSwapExecutor {
    pub fn new(
        registry: Arc<PoolRegistry>,
        book: Arc<QuoteBook>,
        audit: Arc<dyn AuditLog>,
        validator: Arc<dyn SwapValidator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            book,
            audit,
            validator,
            config,
            stats: Mutex::new(ExecutionStats::new()),
        }
    }

    async fn resolve(&self, quote: &QuoteRef) -> Result<Quote> {
        let resolved = match quote {
            QuoteRef::Issued(quote_id) => self.book.get(quote_id),
            QuoteRef::Provided(quote) => Ok(quote.as_ref().clone()),
        };

        // Settlement appends the receipt before taking the quote out of the book
        if let Some(settled) = self.audit.find_by_quote(quote.quote_id()).await? {
            return Err(SwapError::QuoteAlreadySettled {
                quote_id: settled.quote_id,
                receipt_id: settled.receipt_id,
            });
        }
        resolved
    }

    fn record(&self, status: SwapStatus, amount_in: Decimal) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.record(status, amount_in, now());
        }
    }

    fn record_duplicate(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.duplicates += 1;
        }
    }

    fn replay_duplicate(&self, existing: SwapReceipt, request: &ExecuteRequest) -> Result<SwapReceipt> {
        let token = &request.idempotency_token;
        let existing = replay(existing, request.quote.quote_id(), request.amount_in).inspect_err(|e| {
            warn!("Request {} rejected: {}", token, e);
        })?;
        info!("Duplicate request {}: returning receipt {}", token, existing.receipt_id);
        self.record_duplicate();
        Ok(existing)
    }

    fn transition(&self, from: SwapStatus, to: SwapStatus, token: &str, amount_in: Decimal) -> SwapStatus {
        debug_assert!(from.can_transition_to(to), "{:?} -> {:?}", from, to);
        debug!("Swap {}: {:?} -> {:?}", token, from, to);
        if to.is_terminal() {
            self.record(to, amount_in);
        }
        to
    }

    /// Everything that can be rejected without touching the pool lock
    fn precheck(&self, request: &ExecuteRequest, quote: &Quote) -> Result<(Arc<PoolHandle>, SwapDirection)> {
        self.validator.check_expiry(quote, now())?;
        self.validator.check_balance(request.amount_in, request.caller_balance)?;

        let handle = self.registry.get(&quote.pool_id)?;
        let live = handle.read()?;
        if live.is_halted() {
            return Err(SwapError::PoolHalted { pool_id: live.pool_id.clone() });
        }
        let direction = live.direction(&quote.token_in.symbol, &quote.token_out.symbol)?;

        // Reserves may have moved since the quote was issued
        let amount_out = live.settlable_output(direction, request.amount_in)?;
        self.validator.check_slippage(quote, amount_out)?;

        Ok((handle, direction))
    }
}

/// A stored receipt answers a retried token only if the retry asks for the same swap
fn replay(existing: SwapReceipt, quote_id: &str, amount_in: Decimal) -> Result<SwapReceipt> {
    if existing.quote_id != quote_id || existing.amount_in != amount_in {
        return Err(SwapError::IdempotencyConflict {
            idempotency_token: existing.idempotency_token,
            receipt_id: existing.receipt_id,
        });
    }
    Ok(existing)
}

async fn settle(job: SettlementJob) -> Result<Settlement> {
    let guard = job.handle.lock_for_settlement(job.timeout).await?;

    // A concurrent retry may have settled this token while we waited
    if let Some(existing) = job.audit.find_by_token(&job.idempotency_token).await? {
        return replay(existing, &job.quote.quote_id, job.amount_in).map(Settlement::Duplicate);
    }
    // Or another token may have spent the same quote
    if let Some(settled) = job.audit.find_by_quote(&job.quote.quote_id).await? {
        return Err(SwapError::QuoteAlreadySettled {
            quote_id: settled.quote_id,
            receipt_id: settled.receipt_id,
        });
    }

    let (amount_out, price_impact_pct, new_pool_state) = guard.settle(|pool| {
        if pool.is_halted() {
            return Err(SwapError::PoolHalted { pool_id: pool.pool_id.clone() });
        }

        let amount_out = pool.settlable_output(job.direction, job.amount_in)?;
        if amount_out.is_zero() {
            let token_out = pool.token_out(job.direction);
            return Err(SwapError::AmountTooSmall {
                amount_in: job.amount_in,
                token: token_out.symbol.clone(),
                decimals: token_out.decimals,
            });
        }
        job.validator.check_slippage(&job.quote, amount_out)?;

        let price_impact_pct = pool.price_impact(job.direction, job.amount_in)?;
        let snapshot = pool.apply_settlement(job.direction, job.amount_in, amount_out)?;
        Ok((amount_out, price_impact_pct, snapshot))
    })?;

    if job.amount_in == job.quote.amount_in {
        debug!(
            "Quote {} realized {}% slippage",
            job.quote.quote_id,
            calculate_slippage(job.quote.amount_out, amount_out).round_dp(6)
        );
    }

    let receipt = SwapReceipt {
        receipt_id: Uuid::new_v4().to_string(),
        quote_id: job.quote.quote_id.clone(),
        idempotency_token: job.idempotency_token.clone(),
        caller: job.caller,
        pool_id: guard.pool_id().clone(),
        token_in: job.quote.token_in.clone(),
        token_out: job.quote.token_out.clone(),
        amount_in: job.amount_in,
        amount_out,
        price_impact_pct,
        new_pool_state,
        settled_at: now(),
    };

    // Appended before the lock is released so a same-pool retry sees the token
    if let Err(e) = job.audit.append(&receipt).await {
        error!("Failed to append receipt {} to audit log: {}", receipt.receipt_id, e);
    }
    job.book.take(&receipt.quote_id);

    drop(guard);
    Ok(Settlement::Settled(receipt))
}

#[async_trait]
impl SwapExecutor for DefaultSwapExecutor {
    async fn execute(&self, request: ExecuteRequest) -> Result<SwapReceipt> {
        let token = request.idempotency_token.clone();
        let amount_in = request.amount_in;

        if let Some(existing) = self.audit.find_by_token(&token).await? {
            return self.replay_duplicate(existing, &request);
        }

        let quote = match self.resolve(&request.quote).await {
            Ok(quote) => quote,
            Err(e) => {
                // This token may have spent the quote since the lookup above
                if let Some(existing) = self.audit.find_by_token(&token).await? {
                    return self.replay_duplicate(existing, &request);
                }
                warn!("Request {} rejected: {}", token, e);
                return Err(e);
            }
        };
        let status = SwapStatus::Requested;

        let (handle, direction) = match self.precheck(&request, &quote) {
            Ok(checked) => checked,
            Err(e) => {
                let next = if matches!(e, SwapError::QuoteExpired { .. }) {
                    SwapStatus::Expired
                } else {
                    SwapStatus::Rejected
                };
                self.transition(status, next, &token, amount_in);
                warn!("Swap {} rejected before settlement: {}", token, e);
                return Err(e);
            }
        };
        let status = self.transition(status, SwapStatus::Validated, &token, amount_in);

        let job = SettlementJob {
            handle,
            book: self.book.clone(),
            audit: self.audit.clone(),
            validator: self.validator.clone(),
            quote,
            direction,
            amount_in,
            idempotency_token: token.clone(),
            caller: request.caller,
            timeout: self.config.settlement_timeout(),
        };

        // Spawned so an abandoned caller cannot cancel a settlement mid-mutation
        let outcome = tokio::spawn(settle(job))
            .await
            .map_err(|e| SwapError::Execution(format!("Settlement task for {} failed: {}", token, e)))
            .and_then(|result| result);

        match outcome {
            Ok(Settlement::Settled(receipt)) => {
                self.transition(status, SwapStatus::Settled, &token, receipt.amount_in);
                info!("{}", receipt.summary());
                Ok(receipt)
            }
            Ok(Settlement::Duplicate(existing)) => {
                info!("Request {} settled concurrently as {}", token, existing.receipt_id);
                self.record_duplicate();
                Ok(existing)
            }
            Err(e) => {
                self.transition(status, SwapStatus::Rejected, &token, amount_in);
                if e.is_fatal() {
                    error!("Settlement of {} failed fatally: {}", token, e);
                } else {
                    warn!("Settlement of {} rejected: {}", token, e);
                }
                Err(e)
            }
        }
    }

    fn stats(&self) -> ExecutionStats {
        self.stats.lock().map(|stats| stats.clone()).unwrap_or_default()
    }
}
