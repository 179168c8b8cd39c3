//! # market-engine
//!
//! Market aggregation, verification and ranking engine for cryptocurrency
//! analyst reports: pulls snapshots from multiple independent price
//! sources, reconciles them into a trustworthy consensus price, scores
//! every asset on momentum/liquidity/risk, and produces a balanced,
//! deterministic ranked selection.
//!
//! ## Pipeline
//!
//! ```text
//! CoinGecko top-100 ──┐
//! Binance spot ───────┤   TTL cache + retry      consensus      scoring
//! Coinbase spot ──────┼──► source adapters ────► verifier ────► engine ──► balanced
//! Kraken spot ────────┘                          (median,       (momentum,  selector
//!                                                 spread,        liquidity, (majors /
//!                                                 tolerance)     risk)       alts)
//! ```
//!
//! ## Design principles
//!
//! - **Trust through agreement** - a price is verified only when at least
//!   two independent sources agree within tolerance; no source is ranked
//!   above another
//! - **Degrade, never abort** - a rate-limited or dead source falls back to
//!   retries, then stale cache, then simply one fewer quote this cycle
//! - **Deterministic output** - the same snapshot, preferences and size
//!   always produce the same ordered list
//!
//! ## Example
//!
//! ```no_run
//! use market_engine::{EngineConfig, MarketEngine, Preferences};
//!
//! # async fn run() -> market_engine::Result<()> {
//! let engine = MarketEngine::with_default_sources(EngineConfig::from_env())?;
//! let report = engine.build_report("usd", 20, &Preferences::default()).await?;
//! for row in &report.rows {
//!     println!("{} score {} risk {}", row.symbol, row.score, row.risk);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod consensus;
pub mod engine;
pub mod error;
pub mod model;
pub mod popularity;
pub mod retry;
pub mod scoring;
pub mod selector;
pub mod source;

pub use cache::{MarketCache, TtlCache};
pub use config::{EngineConfig, SelectorConfig};
pub use engine::MarketEngine;
pub use error::{EngineError, Result};
pub use model::{
    AggregateStats, AssetSnapshot, ConsensusResult, MarketReport, Preferences,
    PriceQuote, RankedSelection, ReportRow, RiskTier, ScoredAsset, VerifiedAsset,
};
pub use popularity::{InterestTracker, NoPopularity, PopularityProvider};
pub use retry::RetryPolicy;
pub use source::{
    BinanceSource, CoinGeckoSource, CoinbaseSource, KrakenSource, SnapshotSource,
    SpotPriceSource,
};
