//! Scoring Engine
//!
//! Converts a verified snapshot row into a dimensionless score and a risk
//! tier. The score is additive: momentum base, trend consistency, drawdown
//! penalty, liquidity bonus, verification adjustment and a bounded
//! popularity boost supplied by an external collaborator.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::model::{RiskTier, ScoredAsset, VerifiedAsset};

/// Short-term momentum weight.
const MOMENTUM_7D_WEIGHT: Decimal = dec!(0.65);
/// Medium-term momentum weight.
const MOMENTUM_30D_WEIGHT: Decimal = dec!(0.35);
/// Liquidity bonus cap, so turnover can't dominate the score.
const LIQUIDITY_CAP: Decimal = dec!(8);
/// Penalty for an unverified price; must outweigh any momentum edge.
const UNVERIFIED_PENALTY: Decimal = dec!(-15);
/// Popularity boost bounds.
const POPULARITY_BOUND: Decimal = dec!(10);

/// Pegged stable assets; priced to hold a fixed value, never ranked.
const STABLE_SYMBOLS: &[&str] = &[
    "USDT", "USDC", "DAI", "BUSD", "TUSD", "USDP", "FDUSD", "USDE", "USDS",
    "PYUSD", "GUSD", "USDD", "FRAX", "LUSD", "EURC", "EURT",
];

/// Commodity-backed tokens; track gold/silver, not crypto fundamentals.
const COMMODITY_SYMBOLS: &[&str] = &["PAXG", "XAUT", "KAU", "KAG"];

/// Known memecoins, excluded only when the user asks for it.
const MEMECOIN_SYMBOLS: &[&str] = &[
    "DOGE", "SHIB", "PEPE", "WIF", "BONK", "FLOKI", "MEME", "BRETT",
    "POPCAT", "MOG", "TURBO", "NEIRO",
];

/// Fixed-value and commodity-backed instruments are outside the ranking
/// universe regardless of preferences.
pub fn is_outside_universe(symbol: &str) -> bool {
    STABLE_SYMBOLS.contains(&symbol) || COMMODITY_SYMBOLS.contains(&symbol)
}

pub fn is_memecoin(symbol: &str) -> bool {
    MEMECOIN_SYMBOLS.contains(&symbol)
}

/// Score one verified row. `popularity_boost` is clamped to ±10 so outside
/// interest can tilt the ranking but never override fundamentals.
pub fn score_asset(asset: VerifiedAsset, popularity_boost: Decimal) -> ScoredAsset {
    let snapshot = &asset.snapshot;
    let m7 = snapshot.momentum_7d;
    let m30 = snapshot.momentum_30d;

    let base = m7 * MOMENTUM_7D_WEIGHT + m30 * MOMENTUM_30D_WEIGHT;

    // A positive week inside a negative month is a rebound in a down-trend,
    // penalized rather than rewarded.
    let consistency = if m7 > Decimal::ZERO && m30 > Decimal::ZERO {
        dec!(6)
    } else if m7 < Decimal::ZERO && m30 < Decimal::ZERO {
        dec!(-4)
    } else if m7 > Decimal::ZERO && m30 < Decimal::ZERO {
        dec!(-2)
    } else {
        Decimal::ZERO
    };

    let drawdown = if m30 < dec!(-50) {
        dec!(-10)
    } else if m30 < dec!(-30) {
        dec!(-5)
    } else {
        Decimal::ZERO
    };

    let liquidity = if snapshot.market_cap > Decimal::ZERO {
        (snapshot.volume_24h / snapshot.market_cap * dec!(150)).min(LIQUIDITY_CAP)
    } else {
        Decimal::ZERO
    };

    let verification = if asset.consensus.verified {
        // +2 per corroborating source beyond the first, capped at +6.
        (dec!(2) * Decimal::from(asset.consensus.sources_ok as u64 - 1)).min(dec!(6))
    } else {
        UNVERIFIED_PENALTY
    };

    let popularity = popularity_boost.clamp(-POPULARITY_BOUND, POPULARITY_BOUND);

    let score = base + consistency + drawdown + liquidity + verification + popularity;
    let risk = RiskTier::from_market_cap(snapshot.market_cap);

    ScoredAsset {
        snapshot: asset.snapshot,
        consensus: asset.consensus,
        score,
        risk,
    }
}
