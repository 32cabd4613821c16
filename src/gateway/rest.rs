//! REST market-data gateway
//!
//! Fetches last-trade prices from a Kraken-compatible public ticker
//! endpoint. Used in live runs for the price feed; order execution still
//! goes through the paper-trading book.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::gateway::MarketDataGateway;

pub const DEFAULT_BASE_URL: &str = "https://api.kraken.com";

pub struct RestMarketDataGateway {
    client: Client,
    base_url: String,
}

impl RestMarketDataGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn fetch_last_price(&self, instrument: &str) -> EngineResult<f64> {
        let url = format!("{}/0/public/Ticker?pair={}", self.base_url, instrument);
        let response = self.client.get(&url).send().await?;
        let response = response.error_for_status()?;
        let data: serde_json::Value = response.json().await?;

        if let Some(errors) = data.get("error").and_then(|e| e.as_array()) {
            if let Some(first) = errors.first().and_then(|e| e.as_str()) {
                if first.contains("Permission") {
                    return Err(EngineError::Permission(first.to_string()));
                }
                return Err(EngineError::Transient(first.to_string()));
            }
        }

        let last = data
            .get("result")
            .and_then(|r| r.as_object())
            .and_then(|pairs| pairs.values().next())
            .and_then(|ticker| ticker.get("c"))
            .and_then(|c| c.get(0))
            .and_then(|p| p.as_str())
            .ok_or_else(|| {
                EngineError::Transient(format!("malformed ticker response for {instrument}"))
            })?;

        let price: f64 = last
            .parse()
            .map_err(|_| EngineError::Transient(format!("unparseable last price '{last}'")))?;

        debug!("ticker {}: last price {:.6}", instrument, price);
        Ok(price)
    }
}

#[async_trait]
impl MarketDataGateway for RestMarketDataGateway {
    async fn current_price(&self, instrument: &str) -> EngineResult<f64> {
        self.fetch_last_price(instrument).await
    }

    async fn validate_access(&self, instrument: &str) -> EngineResult<()> {
        // A successful ticker read proves the instrument is visible to us.
        self.fetch_last_price(instrument).await.map(|_| ())
    }
}
