use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::types::{OraclePriceSample, Result, Timestamp, now};

#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Fetch the full current price set
    async fn fetch(&self) -> Result<Vec<OraclePriceSample>>;

    fn name(&self) -> &str;
}

/// Wire format of one feed entry, keyed by "BASE/QUOTE"
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedEntry {
    price: Decimal,
    #[serde(default)]
    price_change_percent: Decimal,
    #[serde(default)]
    sampled_at: Option<Timestamp>,
}

/// Polls a JSON document of the form
/// `{ "GLD/USDC": { "price": 0.00523, "priceChangePercent": 1.2, "sampledAt": 1700000000000 } }`
pub struct HttpPriceFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpPriceFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        info!("Initializing HTTP price feed with endpoint: {}", url);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn fetch(&self) -> Result<Vec<OraclePriceSample>> {
        debug!("Fetching oracle prices from {}", self.url);

        let body: HashMap<String, FeedEntry> = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let received_at = now();
        let mut samples = Vec::with_capacity(body.len());
        for (pair, entry) in body {
            if entry.price <= Decimal::ZERO {
                warn!("Dropping non-positive oracle price for {}: {}", pair, entry.price);
                continue;
            }
            samples.push(OraclePriceSample {
                pair,
                price: entry.price,
                price_change_percent: entry.price_change_percent,
                sampled_at: entry.sampled_at.unwrap_or(received_at),
                source: self.url.clone(),
            });
        }

        debug!("Fetched {} oracle prices", samples.len());
        Ok(samples)
    }

    fn name(&self) -> &str {
        &self.url
    }
}
