//! Domain Models
//!
//! Typed records for every stage of the pipeline. Uses `rust_decimal` for
//! all market data - never use f64 for money!

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// One asset at one point in time, as reported by the bulk snapshot source.
/// Immutable once produced; a new fetch cycle produces fresh rows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetSnapshot {
    /// Ticker symbol (e.g., "BTC"), uppercase, unique within a snapshot
    pub symbol: String,

    /// Full name (e.g., "Bitcoin")
    pub name: String,

    /// Position by market capitalization, 1-based
    pub rank: u32,

    /// Bulk-source quote in the requested currency
    pub price: Decimal,

    /// Market capitalization
    pub market_cap: Decimal,

    /// 24-hour traded volume
    pub volume_24h: Decimal,

    /// Signed percentage return over 7 days
    pub momentum_7d: Decimal,

    /// Signed percentage return over 30 days
    pub momentum_30d: Decimal,

    /// When the snapshot was fetched
    pub fetched_at: DateTime<Utc>,
}

/// A single price contributed by one source for one symbol. Transient:
/// exists only while consensus is being computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceQuote {
    pub source_id: &'static str,
    pub price: Decimal,
}

impl PriceQuote {
    pub fn new(source_id: &'static str, price: Decimal) -> Self {
        Self { source_id, price }
    }
}

/// Consensus verdict for one asset's price.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Median of all positive quotes, `None` when no quotes were available
    pub anchor_price: Option<Decimal>,

    /// `(max - min) / anchor * 100`, defined only with two or more quotes
    pub spread_pct: Option<Decimal>,

    /// Quotes within tolerance of the anchor
    pub sources_ok: usize,

    /// `sources_ok >= 2`
    pub verified: bool,
}

/// Risk tier, ordered by ascending risk.
///
/// Derived from market capitalization alone with two fixed thresholds.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

/// Market cap at or above this is LOW risk.
const LOW_RISK_CAP_FLOOR: Decimal = dec!(50_000_000_000);
/// Market cap at or above this (but under the LOW floor) is MEDIUM risk.
const MEDIUM_RISK_CAP_FLOOR: Decimal = dec!(5_000_000_000);

impl RiskTier {
    pub fn from_market_cap(market_cap: Decimal) -> Self {
        if market_cap >= LOW_RISK_CAP_FLOOR {
            RiskTier::Low
        } else if market_cap >= MEDIUM_RISK_CAP_FLOOR {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        };
        f.write_str(s)
    }
}

/// A snapshot row annotated with its consensus verdict; ready for scoring.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifiedAsset {
    pub snapshot: AssetSnapshot,
    pub consensus: ConsensusResult,
}

/// A fully scored asset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoredAsset {
    pub snapshot: AssetSnapshot,
    pub consensus: ConsensusResult,
    pub score: Decimal,
    pub risk: RiskTier,
}

impl ScoredAsset {
    /// Flat record handed to rendering collaborators.
    pub fn to_row(&self) -> ReportRow {
        ReportRow {
            symbol: self.snapshot.symbol.clone(),
            name: self.snapshot.name.clone(),
            score: self.score,
            risk: self.risk,
            momentum_7d: self.snapshot.momentum_7d,
            momentum_30d: self.snapshot.momentum_30d,
            price: self.snapshot.price,
            market_cap: self.snapshot.market_cap,
            volume_24h: self.snapshot.volume_24h,
            sources_ok: self.consensus.sources_ok,
            verified: self.consensus.verified,
        }
    }
}

/// Final ranked output: two cohorts, each sorted by descending score.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RankedSelection {
    pub majors: Vec<ScoredAsset>,
    pub alts: Vec<ScoredAsset>,
}

impl RankedSelection {
    pub fn total(&self) -> usize {
        self.majors.len() + self.alts.len()
    }

    /// Flatten to renderer rows, majors first.
    pub fn into_rows(self) -> Vec<ReportRow> {
        self.majors
            .iter()
            .chain(self.alts.iter())
            .map(ScoredAsset::to_row)
            .collect()
    }
}

/// Aggregate verification statistics for one fetch cycle.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total: usize,
    pub verified_count: usize,
    pub verified_pct: Decimal,
    pub avg_spread_pct: Option<Decimal>,
    pub median_spread_pct: Option<Decimal>,
}

/// Flat per-asset record consumed by rendering collaborators. Field names
/// are stable; no particular serialization format is mandated beyond that.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportRow {
    pub symbol: String,
    pub name: String,
    pub score: Decimal,
    pub risk: RiskTier,
    pub momentum_7d: Decimal,
    pub momentum_30d: Decimal,
    pub price: Decimal,
    pub market_cap: Decimal,
    pub volume_24h: Decimal,
    pub sources_ok: usize,
    pub verified: bool,
}

/// User preferences, supplied by an external preference store. Applied as
/// pre-filters (avoid/memecoin exclusion) and post-score bias (focus).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// Keep only tiers at or below this risk
    #[serde(default)]
    pub risk_preference: Option<RiskTier>,

    /// Symbols excluded before scoring
    #[serde(default)]
    pub avoid_symbols: Vec<String>,

    /// Symbols given a fixed score bias after scoring
    #[serde(default)]
    pub focus_symbols: Vec<String>,

    /// Drop known memecoins before scoring
    #[serde(default)]
    pub exclude_memecoins: bool,
}

/// The complete output of one report build.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketReport {
    pub rows: Vec<ReportRow>,
    pub stats: AggregateStats,
    pub generated_at: DateTime<Utc>,
}
