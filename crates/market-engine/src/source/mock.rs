//! Mock Sources
//!
//! Test doubles for the snapshot and spot-price seams: fixed data, scripted
//! failures, call counting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use super::{SnapshotSource, SpotPriceSource};
use crate::error::{EngineError, Result};
use crate::model::AssetSnapshot;

/// Build a snapshot row from plain numbers.
pub fn snapshot_row(
    symbol: &str,
    rank: u32,
    price: Decimal,
    market_cap: Decimal,
    volume_24h: Decimal,
    momentum_7d: Decimal,
    momentum_30d: Decimal,
) -> AssetSnapshot {
    AssetSnapshot {
        symbol: symbol.to_uppercase(),
        name: symbol.to_string(),
        rank,
        price,
        market_cap,
        volume_24h,
        momentum_7d,
        momentum_30d,
        fetched_at: Utc::now(),
    }
}

/// Snapshot source returning a fixed set of rows.
pub struct MockSnapshotSource {
    rows: Vec<AssetSnapshot>,
    calls: AtomicUsize,
}

impl MockSnapshotSource {
    pub fn new(rows: Vec<AssetSnapshot>) -> Self {
        Self {
            rows,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for MockSnapshotSource {
    fn id(&self) -> &'static str {
        "mock-bulk"
    }

    async fn fetch_top(&self, _currency: &str) -> Result<Vec<AssetSnapshot>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }
}

/// Snapshot source that always fails with a transient error.
pub struct FailingSnapshotSource;

#[async_trait]
impl SnapshotSource for FailingSnapshotSource {
    fn id(&self) -> &'static str {
        "mock-bulk"
    }

    async fn fetch_top(&self, _currency: &str) -> Result<Vec<AssetSnapshot>> {
        Err(EngineError::RateLimited("simulated 429".into()))
    }
}

/// Spot source with a fixed price table; anything else is a miss.
pub struct MockSpotSource {
    id: &'static str,
    prices: HashMap<String, Decimal>,
    calls: AtomicUsize,
}

impl MockSpotSource {
    pub fn new(id: &'static str, prices: &[(&str, Decimal)]) -> Self {
        Self {
            id,
            prices: prices
                .iter()
                .map(|(s, p)| (s.to_uppercase(), *p))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpotPriceSource for MockSpotSource {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn spot_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.prices.get(symbol).copied())
    }
}

/// Spot source that fails transiently a scripted number of times before
/// answering, for retry-path tests.
pub struct FlakySpotSource {
    id: &'static str,
    fail_first: usize,
    price: Decimal,
    calls: AtomicUsize,
}

impl FlakySpotSource {
    pub fn new(id: &'static str, fail_first: usize, price: Decimal) -> Self {
        Self {
            id,
            fail_first,
            price,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpotPriceSource for FlakySpotSource {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn spot_price(&self, _symbol: &str) -> Result<Option<Decimal>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            Err(EngineError::RateLimited("simulated 429".into()))
        } else {
            Ok(Some(self.price))
        }
    }
}

/// Spot source that stalls longer than any reasonable deadline.
pub struct SlowSpotSource {
    id: &'static str,
    delay: Duration,
    price: Decimal,
}

impl SlowSpotSource {
    pub fn new(id: &'static str, delay: Duration, price: Decimal) -> Self {
        Self { id, delay, price }
    }
}

#[async_trait]
impl SpotPriceSource for SlowSpotSource {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn spot_price(&self, _symbol: &str) -> Result<Option<Decimal>> {
        tokio::time::sleep(self.delay).await;
        Ok(Some(self.price))
    }
}
