use std::collections::HashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, now};

/// One oracle price for a "BASE/QUOTE" pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OraclePriceSample {
    pub pair: String,
    pub price: Decimal,
    pub price_change_percent: Decimal,
    pub sampled_at: Timestamp,
    pub source: String,
}

/// Whole set of oracle samples from one successful refresh.
/// Never partially updated: a refresh publishes a new snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSnapshot {
    pub samples: HashMap<String, OraclePriceSample>,
    pub fetched_at: Timestamp,
    pub sequence: u64,
}

impl OracleSnapshot {
    /// Create a new empty snapshot
    pub fn new() -> Self {
        Self {
            samples: HashMap::new(),
            fetched_at: 0,
            sequence: 0,
        }
    }

    pub fn from_samples(samples: Vec<OraclePriceSample>, fetched_at: Timestamp, sequence: u64) -> Self {
        Self {
            samples: samples.into_iter().map(|s| (s.pair.clone(), s)).collect(),
            fetched_at,
            sequence,
        }
    }

    pub fn get(&self, pair: &str) -> Option<&OraclePriceSample> {
        self.samples.get(pair)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn age_ms_at(&self, at: Timestamp) -> u64 {
        at.saturating_sub(self.fetched_at)
    }

    /// Get statistics about the snapshot
    pub fn get_stats(&self) -> SnapshotStats {
        SnapshotStats {
            fetched_at: self.fetched_at,
            sequence: self.sequence,
            price_count: self.samples.len(),
            age_ms: self.age_ms_at(now()),
        }
    }
}

/// Statistics about an oracle snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub fetched_at: Timestamp,
    pub sequence: u64,
    pub price_count: usize,
    pub age_ms: u64,
}

impl Default for OracleSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
