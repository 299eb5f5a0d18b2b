use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::pool::model::LiquidityPool;
use crate::types::{DEFAULT_FEE_BPS, BPS_DENOMINATOR, PoolId, Result, SwapError, TokenInfo};

/// Engine configuration, one section per component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Quote and settlement settings
    pub engine: EngineConfig,

    /// Price oracle polling
    pub oracle: OracleConfig,

    /// Pools seeded at startup
    pub pools: Vec<PoolConfig>,

    /// Receipt audit log
    pub audit: AuditConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long an issued quote stays executable
    pub quote_validity_ms: u64,

    /// Bound on waiting for a pool's settlement lock
    pub settlement_timeout_ms: u64,

    /// Impact at or above this percentage is `medium`
    pub medium_impact_pct: Decimal,

    /// Impact above this percentage is `high`
    pub high_impact_pct: Decimal,

    /// Slippage tolerance applied when a request does not carry one
    pub default_max_slippage_bps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quote_validity_ms: 15_000,
            settlement_timeout_ms: 2_000,
            medium_impact_pct: Decimal::ONE,
            high_impact_pct: Decimal::from(15),
            default_max_slippage_bps: 50,
        }
    }
}

impl EngineConfig {
    pub fn quote_validity(&self) -> Duration {
        Duration::from_millis(self.quote_validity_ms)
    }

    pub fn settlement_timeout(&self) -> Duration {
        Duration::from_millis(self.settlement_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub enabled: bool,
    pub feed_url: Option<String>,
    pub poll_interval_ms: u64,

    /// Samples older than this are display-only
    pub stale_after_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            feed_url: None,
            poll_interval_ms: 3_000,
            stale_after_ms: 10_000,
            max_retries: 3,
            retry_delay_ms: 250,
            request_timeout_ms: 2_000,
        }
    }
}

impl OracleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

/// Pool configuration.
///
/// `reserve_base * reserve_quote` must not exceed `Decimal::MAX`
/// (79228162514264337593543950335, about 7.9e28); `validate` rejects
/// pools above that ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub id: PoolId,
    pub base: TokenInfo,
    pub quote: TokenInfo,
    pub reserve_base: Decimal,
    pub reserve_quote: Decimal,
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,
}

fn default_fee_bps() -> u32 {
    DEFAULT_FEE_BPS
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// JSON-lines file for receipts; in-memory when unset
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Config {
    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn oracle_config(&self) -> &OracleConfig {
        &self.oracle
    }

    /// Load `config.toml` (optional) layered with `SWAP__*` environment variables
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Load from a config file base name, then apply environment overrides
    pub fn load_from(path: &str) -> Result<Self> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("SWAP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.quote_validity_ms == 0 {
            return Err(SwapError::Config("quote_validity_ms must be positive".into()));
        }

        if self.engine.settlement_timeout_ms == 0 {
            return Err(SwapError::Config("settlement_timeout_ms must be positive".into()));
        }

        if self.engine.medium_impact_pct > self.engine.high_impact_pct {
            return Err(SwapError::Config("medium_impact_pct exceeds high_impact_pct".into()));
        }

        if self.engine.default_max_slippage_bps > BPS_DENOMINATOR {
            return Err(SwapError::Config("default_max_slippage_bps exceeds 10000".into()));
        }

        if self.oracle.enabled {
            if self.oracle.feed_url.is_none() {
                return Err(SwapError::Config("Oracle enabled without feed_url".into()));
            }
            if self.oracle.poll_interval_ms == 0 {
                return Err(SwapError::Config("poll_interval_ms must be positive".into()));
            }
        }

        let mut seen = HashSet::new();
        for pool in &self.pools {
            if !seen.insert(pool.id.as_str()) {
                return Err(SwapError::Config(format!("Duplicate pool id {}", pool.id)));
            }
            if pool.base.symbol == pool.quote.symbol {
                return Err(SwapError::Config(format!("Pool {} pairs {} with itself", pool.id, pool.base)));
            }
            if pool.fee_bps >= BPS_DENOMINATOR {
                return Err(SwapError::Config(format!("Pool {} fee {} bps out of range", pool.id, pool.fee_bps)));
            }
            if pool.reserve_base.is_sign_negative() || pool.reserve_quote.is_sign_negative() {
                return Err(SwapError::Config(format!("Pool {} has negative reserves", pool.id)));
            }
            LiquidityPool::constant_product(&pool.id, pool.reserve_base, pool.reserve_quote)?;
        }

        Ok(())
    }
}
