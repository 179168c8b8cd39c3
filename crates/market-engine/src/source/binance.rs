//! Binance Spot Price Source
//!
//! `GET /api/v3/ticker/price?symbol={SYM}USDT`. Quotes are against USDT,
//! which is close enough to USD for a 2% consensus tolerance. Unknown
//! symbols come back as HTTP 400.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::SpotPriceSource;
use crate::error::{EngineError, Result};

const TICKER_URL: &str = "https://api.binance.com/api/v3/ticker/price";

pub struct BinanceSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: Decimal,
}

impl BinanceSource {
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

    fn pair(symbol: &str) -> String {
        let asset = match symbol.to_uppercase().as_str() {
            // Binance kept IOTA's historical code.
            "MIOTA" => "IOTA".to_string(),
            other => other.to_string(),
        };
        format!("{asset}USDT")
    }
}

#[async_trait]
impl SpotPriceSource for BinanceSource {
    fn id(&self) -> &'static str {
        "binance"
    }

    async fn spot_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("symbol", Self::pair(symbol))])
            .send()
            .await?;

        match response.status() {
            // Invalid symbol: not listed here, a miss.
            StatusCode::BAD_REQUEST => return Ok(None),
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(EngineError::RateLimited("binance returned 429".into()));
            }
            _ => {}
        }

        let body: TickerPrice = response.error_for_status()?.json().await?;
        Ok(Some(body.price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_remap() {
        assert_eq!(BinanceSource::pair("btc"), "BTCUSDT");
        assert_eq!(BinanceSource::pair("MIOTA"), "IOTAUSDT");
    }

    #[test]
    fn test_ticker_price_parses() {
        let json = r#"{"symbol":"BTCUSDT","price":"97498.01000000"}"#;
        let body: TickerPrice = serde_json::from_str(json).unwrap();
        assert_eq!(body.price, dec!(97498.01));
    }
}
