use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::pool::model::LiquidityPool;
use crate::types::{PoolId, PoolSnapshot, Result, SwapError};
use crate::utils::config::PoolConfig;

/// One pool plus its settlement lock.
///
/// Readers clone the state under a short read lock. Writers must hold the
/// settlement mutex first, so at most one settlement per pool is in flight.
pub struct PoolHandle {
    pool_id: PoolId,
    state: RwLock<LiquidityPool>,
    settlement: Mutex<()>,
}

impl PoolHandle {
    pub fn new(pool: LiquidityPool) -> Self {
        Self {
            pool_id: pool.pool_id.clone(),
            state: RwLock::new(pool),
            settlement: Mutex::new(()),
        }
    }

    pub fn pool_id(&self) -> &PoolId {
        &self.pool_id
    }

    /// Copy of the live pool for pricing
    pub fn read(&self) -> Result<LiquidityPool> {
        self.state
            .read()
            .map(|pool| pool.clone())
            .map_err(|_| SwapError::InvalidState(format!("Pool {} state lock poisoned", self.pool_id)))
    }

    pub fn snapshot(&self) -> Result<PoolSnapshot> {
        Ok(self.read()?.snapshot())
    }

    /// Wait at most `timeout` for exclusive settlement access
    pub async fn lock_for_settlement(&self, timeout: Duration) -> Result<SettlementGuard<'_>> {
        match tokio::time::timeout(timeout, self.settlement.lock()).await {
            Ok(permit) => {
                debug!("Acquired settlement lock for pool {}", self.pool_id);
                Ok(SettlementGuard { handle: self, _permit: permit })
            }
            Err(_) => {
                warn!("Settlement lock for pool {} not acquired within {:?}", self.pool_id, timeout);
                Err(SwapError::SettlementTimeout {
                    pool_id: self.pool_id.clone(),
                    waited_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

/// Exclusive settlement access to one pool, released on drop
pub struct SettlementGuard<'a> {
    handle: &'a PoolHandle,
    _permit: MutexGuard<'a, ()>,
}

impl SettlementGuard<'_> {
    pub fn pool_id(&self) -> &PoolId {
        &self.handle.pool_id
    }

    /// Run a mutation against the live pool state
    pub fn settle<T>(&self, mutate: impl FnOnce(&mut LiquidityPool) -> Result<T>) -> Result<T> {
        let mut state = self
            .handle
            .state
            .write()
            .map_err(|_| SwapError::InvalidState(format!("Pool {} state lock poisoned", self.handle.pool_id)))?;
        mutate(&mut state)
    }
}

/// Owns every pool the engine can price and settle
pub struct PoolRegistry {
    pools: RwLock<HashMap<PoolId, Arc<PoolHandle>>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_configs(configs: &[PoolConfig]) -> Result<Self> {
        let registry = Self::new();
        for config in configs {
            registry.register(LiquidityPool::from_config(config)?)?;
        }
        Ok(registry)
    }

    pub fn register(&self, pool: LiquidityPool) -> Result<()> {
        let mut pools = self.write_pools()?;
        if pools.contains_key(&pool.pool_id) {
            return Err(SwapError::Config(format!("Pool {} already registered", pool.pool_id)));
        }

        info!(
            "Registered pool {} ({}) reserves {}/{} fee {} bps",
            pool.pool_id, pool.pair, pool.reserve_base, pool.reserve_quote, pool.fee_bps
        );
        pools.insert(pool.pool_id.clone(), Arc::new(PoolHandle::new(pool)));
        Ok(())
    }

    pub fn get(&self, pool_id: &str) -> Result<Arc<PoolHandle>> {
        self.read_pools()?
            .get(pool_id)
            .cloned()
            .ok_or_else(|| SwapError::NotFound(format!("Pool {} not registered", pool_id)))
    }

    pub fn snapshot(&self, pool_id: &str) -> Result<PoolSnapshot> {
        self.get(pool_id)?.snapshot()
    }

    /// Snapshots of every pool, skipping any whose state cannot be read
    pub fn snapshots(&self) -> Vec<PoolSnapshot> {
        let handles: Vec<Arc<PoolHandle>> = match self.read_pools() {
            Ok(pools) => pools.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };
        handles.iter().filter_map(|h| h.snapshot().ok()).collect()
    }

    pub fn pool_ids(&self) -> Vec<PoolId> {
        self.read_pools()
            .map(|pools| pools.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.read_pools().map(|pools| pools.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_pools(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<PoolId, Arc<PoolHandle>>>> {
        self.pools
            .read()
            .map_err(|_| SwapError::InvalidState("Pool registry lock poisoned".into()))
    }

    fn write_pools(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<PoolId, Arc<PoolHandle>>>> {
        self.pools
            .write()
            .map_err(|_| SwapError::InvalidState("Pool registry lock poisoned".into()))
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::pool::model::tests::reference_pool;
    use crate::types::SwapDirection;

    #[test]
    fn test_register_and_get() {
        let registry = PoolRegistry::new();
        registry.register(reference_pool()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.pool_ids(), vec!["gld-usdc".to_string()]);

        let snapshot = registry.snapshot("gld-usdc").unwrap();
        assert_eq!(snapshot.reserve_base, dec!(100000));
        assert!(matches!(registry.get("missing"), Err(SwapError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = PoolRegistry::new();
        registry.register(reference_pool()).unwrap();
        assert!(matches!(registry.register(reference_pool()), Err(SwapError::Config(_))));
    }

    #[tokio::test]
    async fn test_settlement_guard_mutates_state() {
        let handle = PoolHandle::new(reference_pool());
        let guard = handle.lock_for_settlement(Duration::from_millis(100)).await.unwrap();
        let snapshot = guard
            .settle(|pool| pool.apply_settlement(SwapDirection::BaseToQuote, dec!(1000), dec!(5)))
            .unwrap();
        drop(guard);

        assert_eq!(snapshot.reserve_base, dec!(101000));
        assert_eq!(handle.read().unwrap().reserve_quote, dec!(518));
    }

    #[tokio::test]
    async fn test_lock_wait_is_bounded() {
        let handle = PoolHandle::new(reference_pool());
        let _held = handle.lock_for_settlement(Duration::from_millis(100)).await.unwrap();

        let err = handle.lock_for_settlement(Duration::from_millis(20)).await.err().unwrap();
        assert!(matches!(err, SwapError::SettlementTimeout { waited_ms: 20, .. }));
        assert!(err.is_retryable());

        // Readers are never blocked by a held settlement lock
        assert!(handle.read().is_ok());
    }
}
