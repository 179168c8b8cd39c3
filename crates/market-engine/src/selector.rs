//! Balanced Selector
//!
//! Partitions scored assets into two cohorts (majors vs. alts) and
//! assembles a requested-size ranked list that keeps the per-cohort
//! proportions, backfilling from the other cohort when one runs short.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::config::SelectorConfig;
use crate::model::{RankedSelection, ScoredAsset};

/// Canonical large-cap symbols. Majors membership is this set union
/// top-10-by-rank; either criterion alone qualifies.
const MAJOR_SYMBOLS: &[&str] = &[
    "BTC", "ETH", "BNB", "SOL", "XRP", "ADA", "TRX", "DOGE", "LTC", "DOT",
    "LINK", "BCH", "AVAX", "XLM",
];

const TOP_RANK_CUTOFF: u32 = 10;

pub fn is_major(asset: &ScoredAsset) -> bool {
    asset.snapshot.rank <= TOP_RANK_CUTOFF
        || MAJOR_SYMBOLS.contains(&asset.snapshot.symbol.as_str())
}

/// Descending score, ties broken by ascending market-cap rank (the larger,
/// more canonical asset wins). This is the one ordering used everywhere,
/// which is what makes repeated `rank()` calls deterministic.
pub fn sort_ranked(assets: &mut [ScoredAsset]) {
    assets.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.snapshot.rank.cmp(&b.snapshot.rank))
    });
}

/// Split into (majors, alts), each sorted for selection.
pub fn split_cohorts(assets: Vec<ScoredAsset>) -> (Vec<ScoredAsset>, Vec<ScoredAsset>) {
    let (mut majors, mut alts): (Vec<_>, Vec<_>) = assets.into_iter().partition(is_major);
    sort_ranked(&mut majors);
    sort_ranked(&mut alts);
    (majors, alts)
}

/// Assemble the final list of at most `n` assets.
///
/// The majors target is a clamped share of `n`; any cohort deficit is
/// backfilled from the other cohort's next-ranked candidates, so the total
/// is always `min(n, majors + alts available)`.
pub fn select(
    mut majors: Vec<ScoredAsset>,
    mut alts: Vec<ScoredAsset>,
    n: usize,
    config: &SelectorConfig,
) -> RankedSelection {
    if n == 0 {
        return RankedSelection::default();
    }
    sort_ranked(&mut majors);
    sort_ranked(&mut alts);

    let majors_target = majors_target(n, config);
    let alts_target = n - majors_target;

    let mut majors_take = majors_target.min(majors.len());
    let mut alts_take = alts_target.min(alts.len());

    // Backfill whichever cohort ran short from the other's tail.
    let mut shortfall = n - majors_take - alts_take;
    let from_alts = shortfall.min(alts.len() - alts_take);
    alts_take += from_alts;
    shortfall -= from_alts;
    majors_take += shortfall.min(majors.len() - majors_take);

    majors.truncate(majors_take);
    alts.truncate(alts_take);

    RankedSelection { majors, alts }
}

fn majors_target(n: usize, config: &SelectorConfig) -> usize {
    let share = (Decimal::from(n as u64) * config.majors_fraction)
        .round()
        .to_usize()
        .unwrap_or(config.majors_floor);
    share
        .max(config.majors_floor)
        .min(config.majors_ceiling)
        .min(n)
}
