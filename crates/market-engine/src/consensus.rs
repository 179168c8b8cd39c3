//! Consensus Verifier
//!
//! Reconciles the bulk snapshot price with independent spot quotes into an
//! anchor price, a spread metric and a verification verdict. Deliberately a
//! consensus-by-majority scheme, not a weighted trust model: resilience
//! comes from requiring multiple independent confirmations.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::model::{
    AggregateStats, AssetSnapshot, ConsensusResult, PriceQuote, VerifiedAsset,
};

/// Median of a slice. On an even count the upper-middle element is taken,
/// so the anchor is always one of the actual quotes.
pub fn median(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    Some(sorted[sorted.len() / 2])
}

impl ConsensusResult {
    /// Compute the consensus verdict from a set of quotes.
    ///
    /// Non-positive quotes are discarded up front, so whenever an anchor
    /// exists it is strictly positive and the spread is well defined.
    pub fn compute(quotes: &[PriceQuote], tolerance_pct: Decimal) -> Self {
        let prices: Vec<Decimal> = quotes
            .iter()
            .map(|q| q.price)
            .filter(|p| *p > Decimal::ZERO)
            .collect();

        let Some(anchor) = median(&prices) else {
            return Self::default();
        };

        let spread_pct = if prices.len() >= 2 {
            let max = prices.iter().max().copied().unwrap_or(anchor);
            let min = prices.iter().min().copied().unwrap_or(anchor);
            Some((max - min) / anchor * dec!(100))
        } else {
            None
        };

        let sources_ok = prices
            .iter()
            .filter(|p| ((**p - anchor).abs() / anchor * dec!(100)) <= tolerance_pct)
            .count();

        Self {
            anchor_price: Some(anchor),
            spread_pct,
            sources_ok,
            verified: sources_ok >= 2,
        }
    }
}

/// Annotate every snapshot row with its consensus verdict.
///
/// The bulk price counts as one quote under `bulk_source`; spot quotes are
/// looked up per symbol. Rows with no spot quotes are still returned, just
/// unverified - never silently dropped.
pub fn verify(
    rows: Vec<AssetSnapshot>,
    spot_quotes: &HashMap<String, Vec<PriceQuote>>,
    bulk_source: &'static str,
    tolerance_pct: Decimal,
) -> (Vec<VerifiedAsset>, AggregateStats) {
    let mut verified_rows = Vec::with_capacity(rows.len());
    let mut spreads = Vec::new();
    let mut verified_count = 0;

    for snapshot in rows {
        let mut quotes = vec![PriceQuote::new(bulk_source, snapshot.price)];
        if let Some(extra) = spot_quotes.get(&snapshot.symbol) {
            quotes.extend_from_slice(extra);
        }

        let consensus = ConsensusResult::compute(&quotes, tolerance_pct);
        if consensus.verified {
            verified_count += 1;
        }
        if let Some(spread) = consensus.spread_pct {
            spreads.push(spread);
        }

        verified_rows.push(VerifiedAsset {
            snapshot,
            consensus,
        });
    }

    let total = verified_rows.len();
    let verified_pct = if total > 0 {
        Decimal::from(verified_count as u64) / Decimal::from(total as u64) * dec!(100)
    } else {
        Decimal::ZERO
    };
    let avg_spread_pct = if spreads.is_empty() {
        None
    } else {
        Some(spreads.iter().copied().sum::<Decimal>() / Decimal::from(spreads.len() as u64))
    };

    let stats = AggregateStats {
        total,
        verified_count,
        verified_pct,
        avg_spread_pct,
        median_spread_pct: median(&spreads),
    };

    (verified_rows, stats)
}
