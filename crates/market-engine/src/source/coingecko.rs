//! CoinGecko Bulk Snapshot Source
//!
//! One `coins/markets` call returns the top 100 assets with price, cap,
//! volume and 7d/30d momentum. This is the most rate-limited endpoint the
//! engine touches, hence the multi-minute cache TTL upstream.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::SnapshotSource;
use crate::error::{EngineError, Result};
use crate::model::AssetSnapshot;

const MARKETS_URL: &str = "https://api.coingecko.com/api/v3/coins/markets";
const PER_PAGE: u32 = 100;

pub struct CoinGeckoSource {
    client: reqwest::Client,
    base_url: String,
}

/// Wire format of one markets row. Everything numeric is optional: the API
/// returns null for assets missing a datapoint, and we coerce to zero with
/// a warning rather than abort the snapshot.
#[derive(Debug, Deserialize)]
struct MarketRow {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    current_price: Option<Decimal>,
    #[serde(default)]
    market_cap: Option<Decimal>,
    #[serde(default)]
    total_volume: Option<Decimal>,
    #[serde(default)]
    price_change_percentage_7d_in_currency: Option<Decimal>,
    #[serde(default)]
    price_change_percentage_30d_in_currency: Option<Decimal>,
}

impl CoinGeckoSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("market-engine/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: MARKETS_URL.into(),
        })
    }

    /// Point the source at a different endpoint (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn coerce(symbol: &str, field: &'static str, value: Option<Decimal>) -> Decimal {
        value.unwrap_or_else(|| {
            tracing::warn!(symbol, field, "missing numeric field coerced to zero");
            Decimal::ZERO
        })
    }
}

#[async_trait]
impl SnapshotSource for CoinGeckoSource {
    fn id(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_top(&self, currency: &str) -> Result<Vec<AssetSnapshot>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("vs_currency", currency),
                ("order", "market_cap_desc"),
                ("per_page", &PER_PAGE.to_string()),
                ("page", "1"),
                ("sparkline", "false"),
                ("price_change_percentage", "7d,30d"),
            ])
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(EngineError::RateLimited("coingecko returned 429".into()));
        }

        let rows: Vec<MarketRow> = response.error_for_status()?.json().await?;
        let fetched_at = Utc::now();

        let mut snapshots = Vec::with_capacity(rows.len());
        for (idx, row) in rows.into_iter().enumerate() {
            let Some(symbol) = row
                .symbol
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
            else {
                tracing::warn!(rank = idx + 1, "markets row without symbol skipped");
                continue;
            };

            snapshots.push(AssetSnapshot {
                name: row.name.unwrap_or_else(|| symbol.clone()),
                rank: idx as u32 + 1,
                price: Self::coerce(&symbol, "current_price", row.current_price),
                market_cap: Self::coerce(&symbol, "market_cap", row.market_cap),
                volume_24h: Self::coerce(&symbol, "total_volume", row.total_volume),
                momentum_7d: Self::coerce(
                    &symbol,
                    "price_change_percentage_7d_in_currency",
                    row.price_change_percentage_7d_in_currency,
                ),
                momentum_30d: Self::coerce(
                    &symbol,
                    "price_change_percentage_30d_in_currency",
                    row.price_change_percentage_30d_in_currency,
                ),
                symbol,
                fetched_at,
            });
        }

        Ok(snapshots)
    }
}
