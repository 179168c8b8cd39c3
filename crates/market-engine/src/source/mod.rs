//! Source Adapters
//!
//! Per-provider fetchers behind two trait seams: one bulk "top-N market
//! snapshot" provider and several single-symbol spot-price providers.
//! Caching and retry live in the engine, not here - adapters only speak
//! HTTP and translate symbols.

mod binance;
mod coinbase;
mod coingecko;
mod kraken;
pub mod mock;

pub use binance::BinanceSource;
pub use coinbase::CoinbaseSource;
pub use coingecko::CoinGeckoSource;
pub use kraken::KrakenSource;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::model::AssetSnapshot;

/// Bulk market snapshot provider: one call, up to 100 rows ordered by
/// market cap.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Stable identifier, used for cache keys and as the quote source id.
    fn id(&self) -> &'static str;

    /// Fetch the top assets quoted in `currency` (e.g. "usd").
    async fn fetch_top(&self, currency: &str) -> Result<Vec<AssetSnapshot>>;
}

/// Single-symbol spot price provider.
///
/// `Ok(None)` means the provider simply does not list the symbol - a miss,
/// not a failure. Each implementation owns its provider-specific symbol
/// remapping.
#[async_trait]
pub trait SpotPriceSource: Send + Sync {
    /// Stable identifier, used for cache keys and as the quote source id.
    fn id(&self) -> &'static str;

    /// Current spot price for `symbol`, if listed.
    async fn spot_price(&self, symbol: &str) -> Result<Option<Decimal>>;
}
