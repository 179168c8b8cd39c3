//! Kraken Spot Price Source
//!
//! `GET /0/public/Ticker?pair=...`. Kraken uses its own asset codes (XBT
//! for Bitcoin, XDG for Dogecoin), so symbols go through a static remap
//! before lookup. The result key rarely matches the requested pair, so the
//! first ticker in the result map is taken.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::SpotPriceSource;
use crate::error::{EngineError, Result};

const TICKER_URL: &str = "https://api.kraken.com/0/public/Ticker";

pub struct KrakenSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Option<HashMap<String, Ticker>>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    /// Last trade closed: [price, lot volume]
    c: Vec<Decimal>,
}

impl KrakenSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("market-engine/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: TICKER_URL.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Provider-specific asset codes.
    fn pair(symbol: &str) -> String {
        let asset = match symbol.to_uppercase().as_str() {
            "BTC" => "XBT".to_string(),
            "DOGE" => "XDG".to_string(),
            other => other.to_string(),
        };
        format!("{asset}USD")
    }
}

#[async_trait]
impl SpotPriceSource for KrakenSource {
    fn id(&self) -> &'static str {
        "kraken"
    }

    async fn spot_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("pair", Self::pair(symbol))])
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(EngineError::RateLimited("kraken returned 429".into()));
        }

        let body: TickerResponse = response.error_for_status()?.json().await?;

        // Kraken reports unknown pairs through the error array with HTTP 200.
        if !body.error.is_empty() {
            tracing::debug!(symbol, errors = ?body.error, "kraken pair miss");
            return Ok(None);
        }

        let Some(result) = body.result else {
            return Ok(None);
        };
        let Some(ticker) = result.into_values().next() else {
            return Ok(None);
        };

        match ticker.c.first() {
            Some(price) => Ok(Some(*price)),
            None => Err(EngineError::InvalidResponse {
                source_id: self.id(),
                reason: "ticker without last-trade price".into(),
            }),
        }
    }
}
