//! Popularity Boost
//!
//! External-interest signal consumed by the scoring engine as an opaque
//! additive term. The engine only sees the trait; where the numbers come
//! from (chat mentions, watchlists) is the collaborator's business.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Per-mention boost increment.
const BOOST_PER_MENTION: Decimal = dec!(0.5);
/// Upper bound so interest never dominates fundamentals.
const BOOST_CAP: Decimal = dec!(8);

/// Supplies a small additive score boost per symbol.
pub trait PopularityProvider: Send + Sync {
    fn boost(&self, symbol: &str) -> Decimal;
}

/// Null object: no boost for anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPopularity;

impl PopularityProvider for NoPopularity {
    fn boost(&self, _symbol: &str) -> Decimal {
        Decimal::ZERO
    }
}

/// In-process interest tracker: counts symbol mentions and converts them
/// into a capped boost (0.5 per mention, at most 8).
#[derive(Default)]
pub struct InterestTracker {
    counts: Mutex<HashMap<String, u32>>,
}

impl InterestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one mention of `symbol`.
    pub fn record_mention(&self, symbol: &str) {
        let mut counts = self.lock();
        *counts.entry(symbol.to_uppercase()).or_insert(0) += 1;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PopularityProvider for InterestTracker {
    fn boost(&self, symbol: &str) -> Decimal {
        let counts = self.lock();
        let count = counts.get(symbol).copied().unwrap_or(0);
        (Decimal::from(count) * BOOST_PER_MENTION).min(BOOST_CAP)
    }
}
