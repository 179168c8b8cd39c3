//! Coinbase Spot Price Source
//!
//! `GET /v2/prices/{SYM}-USD/spot`. Amounts arrive as decimal strings.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::SpotPriceSource;
use crate::error::{EngineError, Result};

const SPOT_URL: &str = "https://api.coinbase.com/v2/prices";

pub struct CoinbaseSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SpotResponse {
    data: SpotData,
}

#[derive(Debug, Deserialize)]
struct SpotData {
    amount: Decimal,
}

impl CoinbaseSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("market-engine/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: SPOT_URL.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn product(symbol: &str) -> String {
        format!("{}-USD", symbol.to_uppercase())
    }
}

#[async_trait]
impl SpotPriceSource for CoinbaseSource {
    fn id(&self) -> &'static str {
        "coinbase"
    }

    async fn spot_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        let url = format!("{}/{}/spot", self.base_url, Self::product(symbol));
        let response = self.client.get(&url).send().await?;

        match response.status() {
            // Unknown product: a miss, not an error.
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(EngineError::RateLimited("coinbase returned 429".into()));
            }
            _ => {}
        }

        let body: SpotResponse = response.error_for_status()?.json().await?;
        Ok(Some(body.data.amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_product_format() {
        assert_eq!(CoinbaseSource::product("btc"), "BTC-USD");
        assert_eq!(CoinbaseSource::product("ETH"), "ETH-USD");
    }

    #[test]
    fn test_spot_response_parses_string_amount() {
        let json = r#"{"data":{"base":"BTC","currency":"USD","amount":"97500.12"}}"#;
        let body: SpotResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.data.amount, dec!(97500.12));
    }
}
