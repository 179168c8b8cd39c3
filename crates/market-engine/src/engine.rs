//! Market Engine
//!
//! Wires the pipeline together: cache-aware source adapters feed the
//! consensus verifier, verified rows get scored, and the balanced selector
//! assembles the final ranked report. Everything arrives by dependency
//! injection; the engine owns no global state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::cache::MarketCache;
use crate::config::EngineConfig;
use crate::consensus;
use crate::error::{EngineError, Result};
use crate::model::{
    AggregateStats, AssetSnapshot, MarketReport, Preferences, PriceQuote,
    RankedSelection, VerifiedAsset,
};
use crate::popularity::{NoPopularity, PopularityProvider};
use crate::scoring;
use crate::selector;
use crate::source::{
    BinanceSource, CoinGeckoSource, CoinbaseSource, KrakenSource, SnapshotSource,
    SpotPriceSource,
};

/// Fixed score bias applied to symbols the user asked to focus on.
const FOCUS_BIAS: Decimal = dec!(5);

/// The aggregation, verification and ranking pipeline.
pub struct MarketEngine {
    config: EngineConfig,
    cache: Arc<MarketCache>,
    snapshot_source: Arc<dyn SnapshotSource>,
    spot_sources: Vec<Arc<dyn SpotPriceSource>>,
    popularity: Arc<dyn PopularityProvider>,
}

impl MarketEngine {
    /// Engine with just a bulk source; add spot sources with
    /// [`MarketEngine::with_spot_source`].
    pub fn new(config: EngineConfig, snapshot_source: Arc<dyn SnapshotSource>) -> Self {
        let cache = Arc::new(MarketCache::new(config.cache_max_items));
        Self {
            config,
            cache,
            snapshot_source,
            spot_sources: Vec::new(),
            popularity: Arc::new(NoPopularity),
        }
    }

    /// Engine wired to the real providers: CoinGecko bulk snapshots verified
    /// against Binance, Coinbase and Kraken spot prices.
    pub fn with_default_sources(config: EngineConfig) -> Result<Self> {
        let timeout = config.request_timeout;
        let engine = Self::new(config, Arc::new(CoinGeckoSource::new(timeout)?));
        Ok(engine
            .with_spot_source(Arc::new(BinanceSource::new(timeout)?))
            .with_spot_source(Arc::new(CoinbaseSource::new(timeout)?))
            .with_spot_source(Arc::new(KrakenSource::new(timeout)?)))
    }

    pub fn with_spot_source(mut self, source: Arc<dyn SpotPriceSource>) -> Self {
        self.spot_sources.push(source);
        self
    }

    pub fn with_popularity(mut self, popularity: Arc<dyn PopularityProvider>) -> Self {
        self.popularity = popularity;
        self
    }

    /// Current top-N snapshot: cache first, then the bulk source behind the
    /// retry policy, then the stale cache as last resort.
    pub async fn fetch_market_snapshot(&self, currency: &str) -> Result<Vec<AssetSnapshot>> {
        let key = format!("top:{}", currency.to_lowercase());
        if let Some(rows) = self.cache.snapshots.get(&key) {
            tracing::debug!(currency, rows = rows.len(), "bulk snapshot served from cache");
            return Ok(rows);
        }

        let fetched = self
            .config
            .retry
            .run(|| self.snapshot_source.fetch_top(currency))
            .await;

        match fetched {
            Ok(rows) => {
                self.cache
                    .snapshots
                    .set(key, rows.clone(), self.config.snapshot_ttl);
                Ok(rows)
            }
            Err(err) => {
                if let Some(rows) = self.cache.snapshots.get_stale(&key) {
                    tracing::warn!(
                        source = self.snapshot_source.id(),
                        error = %err,
                        "bulk source down, serving stale snapshot"
                    );
                    return Ok(rows);
                }
                Err(EngineError::SourceUnavailable {
                    source_id: self.snapshot_source.id(),
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Fan out spot-price lookups for every (symbol, source) pair, bounded
    /// by the report deadline. A failed or slow source only means one fewer
    /// quote for that symbol; once the deadline elapses no further adapter
    /// calls are issued and whatever arrived is returned.
    pub async fn collect_quotes(
        &self,
        rows: &[AssetSnapshot],
    ) -> HashMap<String, Vec<PriceQuote>> {
        let lookups = rows.iter().flat_map(|row| {
            self.spot_sources.iter().map(move |source| {
                let symbol = row.symbol.clone();
                async move {
                    let quote = self.spot_quote(source.as_ref(), &symbol).await;
                    (symbol, quote)
                }
            })
        });
        let mut stream =
            futures::stream::iter(lookups).buffer_unordered(self.config.quote_concurrency);

        let deadline = tokio::time::sleep(self.config.report_deadline);
        tokio::pin!(deadline);

        let mut quotes: HashMap<String, Vec<PriceQuote>> = HashMap::new();
        loop {
            tokio::select! {
                () = &mut deadline => {
                    tracing::warn!(
                        collected = quotes.len(),
                        "quote collection deadline elapsed, verifying with partial quotes"
                    );
                    break;
                }
                next = stream.next() => match next {
                    Some((symbol, Some(quote))) => {
                        quotes.entry(symbol).or_default().push(quote);
                    }
                    Some((_, None)) => {}
                    None => break,
                }
            }
        }
        quotes
    }

    /// One cached, retried spot lookup. Returns `None` when the symbol is
    /// not listed there or the source stayed down with nothing stale to
    /// fall back on.
    async fn spot_quote(
        &self,
        source: &dyn SpotPriceSource,
        symbol: &str,
    ) -> Option<PriceQuote> {
        let key = format!("{}:{symbol}", source.id());
        if let Some(price) = self.cache.spot.get(&key) {
            return Some(PriceQuote::new(source.id(), price));
        }

        match self.config.retry.run(|| source.spot_price(symbol)).await {
            Ok(Some(price)) if price > Decimal::ZERO => {
                self.cache.spot.set(key, price, self.config.spot_ttl);
                Some(PriceQuote::new(source.id(), price))
            }
            Ok(_) => None,
            Err(err) => match self.cache.spot.get_stale(&key) {
                Some(price) => {
                    tracing::warn!(
                        source = source.id(),
                        symbol,
                        error = %err,
                        "spot source down, using stale cached price"
                    );
                    Some(PriceQuote::new(source.id(), price))
                }
                None => {
                    tracing::warn!(
                        source = source.id(),
                        symbol,
                        error = %err,
                        "spot source absent for this cycle"
                    );
                    None
                }
            },
        }
    }

    /// Annotate snapshot rows with consensus verdicts and aggregate stats,
    /// at the configured tolerance. The bulk price counts as one quote.
    pub fn verify(
        &self,
        rows: Vec<AssetSnapshot>,
        quotes: &HashMap<String, Vec<PriceQuote>>,
    ) -> (Vec<VerifiedAsset>, AggregateStats) {
        consensus::verify(
            rows,
            quotes,
            self.snapshot_source.id(),
            self.config.tolerance_pct,
        )
    }

    /// Score, filter and select the final ranked list.
    ///
    /// Stable and commodity-backed instruments never enter the universe;
    /// avoided symbols and (on request) memecoins are dropped before
    /// scoring; focus symbols get a fixed post-score bias; a risk
    /// preference keeps only tiers at or below it. An empty result after
    /// filtering is an error, never a silent empty success.
    pub fn rank(
        &self,
        rows: Vec<VerifiedAsset>,
        top_n: usize,
        prefs: &Preferences,
    ) -> Result<RankedSelection> {
        let avoid: HashSet<String> =
            prefs.avoid_symbols.iter().map(|s| s.to_uppercase()).collect();
        let focus: HashSet<String> =
            prefs.focus_symbols.iter().map(|s| s.to_uppercase()).collect();

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let symbol = row.snapshot.symbol.clone();
            if scoring::is_outside_universe(&symbol) || avoid.contains(&symbol) {
                continue;
            }
            if prefs.exclude_memecoins && scoring::is_memecoin(&symbol) {
                continue;
            }

            let boost = self.popularity.boost(&symbol);
            let mut asset = scoring::score_asset(row, boost);
            if focus.contains(&symbol) {
                asset.score += FOCUS_BIAS;
            }
            scored.push(asset);
        }

        if let Some(max_risk) = prefs.risk_preference {
            scored.retain(|asset| asset.risk <= max_risk);
        }
        if scored.is_empty() {
            return Err(EngineError::NoCandidates);
        }

        let (majors, alts) = selector::split_cohorts(scored);
        Ok(selector::select(majors, alts, top_n, &self.config.selector))
    }

    /// The whole pipeline: snapshot, quotes, consensus, scoring, selection.
    pub async fn build_report(
        &self,
        currency: &str,
        top_n: usize,
        prefs: &Preferences,
    ) -> Result<MarketReport> {
        let rows = self.fetch_market_snapshot(currency).await?;
        tracing::info!(currency, rows = rows.len(), "building market report");

        let quotes = self.collect_quotes(&rows).await;
        let (verified, stats) = self.verify(rows, &quotes);
        tracing::info!(
            total = stats.total,
            verified = stats.verified_count,
            "price verification complete"
        );

        let selection = self.rank(verified, top_n, prefs)?;
        Ok(MarketReport {
            rows: selection.into_rows(),
            stats,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::source::mock::{
        snapshot_row, FailingSnapshotSource, FlakySpotSource, MockSnapshotSource,
        MockSpotSource, SlowSpotSource,
    };
    use std::time::Duration;

    fn test_config() -> EngineConfig {
        EngineConfig {
            retry: RetryPolicy::immediate(4),
            report_deadline: Duration::from_millis(500),
            ..EngineConfig::default()
        }
    }

    fn market_rows() -> Vec<AssetSnapshot> {
        vec![
            snapshot_row("BTC", 1, dec!(100), dec!(1_900_000_000_000), dec!(40_000_000_000), dec!(2.0), dec!(5.0)),
            snapshot_row("ETH", 2, dec!(50), dec!(400_000_000_000), dec!(20_000_000_000), dec!(1.0), dec!(3.0)),
            snapshot_row("USDT", 3, dec!(1), dec!(120_000_000_000), dec!(60_000_000_000), dec!(0.01), dec!(0.02)),
            snapshot_row("ALPHA", 20, dec!(10), dec!(8_000_000_000), dec!(900_000_000), dec!(4.0), dec!(6.0)),
            snapshot_row("BETA", 40, dec!(2), dec!(900_000_000), dec!(80_000_000), dec!(9.0), dec!(12.0)),
            snapshot_row("GAMMA", 41, dec!(3), dec!(850_000_000), dec!(70_000_000), dec!(9.0), dec!(12.0)),
        ]
    }

    fn engine_with_quotes() -> MarketEngine {
        MarketEngine::new(
            test_config(),
            Arc::new(MockSnapshotSource::new(market_rows())),
        )
        .with_spot_source(Arc::new(MockSpotSource::new(
            "mock-a",
            &[("BTC", dec!(100.4)), ("ETH", dec!(50.1)), ("ALPHA", dec!(10.05))],
        )))
        .with_spot_source(Arc::new(MockSpotSource::new(
            "mock-b",
            &[("BTC", dec!(99.8)), ("ETH", dec!(49.9))],
        )))
    }

    #[tokio::test]
    async fn test_snapshot_is_cached_between_calls() {
        let source = Arc::new(MockSnapshotSource::new(market_rows()));
        let engine = MarketEngine::new(test_config(), source.clone());

        let first = engine.fetch_market_snapshot("usd").await.unwrap();
        let second = engine.fetch_market_snapshot("usd").await.unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_snapshot_serves_when_source_down() {
        let engine = MarketEngine::new(test_config(), Arc::new(FailingSnapshotSource));
        engine
            .cache
            .snapshots
            .set("top:usd", market_rows(), Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let rows = engine.fetch_market_snapshot("usd").await.unwrap();
        assert_eq!(rows.len(), market_rows().len());
    }

    #[tokio::test]
    async fn test_source_unavailable_without_stale_fallback() {
        let engine = MarketEngine::new(test_config(), Arc::new(FailingSnapshotSource));
        let err = engine.fetch_market_snapshot("usd").await.unwrap_err();
        assert!(matches!(err, EngineError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_retry_then_exactly_one_cached_quote() {
        let flaky = Arc::new(FlakySpotSource::new("flaky", 3, dec!(100.2)));
        let engine = MarketEngine::new(
            test_config(),
            Arc::new(MockSnapshotSource::new(market_rows())),
        )
        .with_spot_source(flaky.clone());

        let rows = vec![market_rows().remove(0)];
        let quotes = engine.collect_quotes(&rows).await;
        assert_eq!(quotes.get("BTC").map(Vec::len), Some(1));
        // 3 simulated 429s then one success, within the 4-attempt schedule
        assert_eq!(flaky.calls(), 4);

        // Second cycle is served from cache, no new adapter calls
        let quotes = engine.collect_quotes(&rows).await;
        assert_eq!(quotes.get("BTC").map(Vec::len), Some(1));
        assert_eq!(flaky.calls(), 4);
    }

    #[tokio::test]
    async fn test_spot_failure_never_aborts_aggregation() {
        let engine = MarketEngine::new(
            test_config(),
            Arc::new(MockSnapshotSource::new(market_rows())),
        )
        .with_spot_source(Arc::new(FlakySpotSource::new("down", 99, dec!(1))))
        .with_spot_source(Arc::new(MockSpotSource::new("up", &[("BTC", dec!(100.1))])));

        let rows = market_rows();
        let quotes = engine.collect_quotes(&rows).await;
        assert_eq!(quotes.get("BTC").map(Vec::len), Some(1));

        let (verified, stats) = engine.verify(rows, &quotes);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.verified_count, 1);
        let btc = verified.iter().find(|v| v.snapshot.symbol == "BTC").unwrap();
        assert!(btc.consensus.verified);
    }

    #[tokio::test]
    async fn test_deadline_degrades_to_partial_quotes() {
        let mut config = test_config();
        config.report_deadline = Duration::from_millis(50);
        let engine = MarketEngine::new(
            config,
            Arc::new(MockSnapshotSource::new(market_rows())),
        )
        .with_spot_source(Arc::new(SlowSpotSource::new(
            "slow",
            Duration::from_secs(30),
            dec!(100),
        )));

        let report = engine
            .build_report("usd", 5, &Preferences::default())
            .await
            .unwrap();

        // No quote arrived in time, so nothing verified - but the report
        // still builds from the bulk snapshot alone.
        assert_eq!(report.stats.verified_count, 0);
        assert!(!report.rows.is_empty());
        assert!(report.rows.iter().all(|r| r.sources_ok == 1 && !r.verified));
    }

    #[tokio::test]
    async fn test_build_report_excludes_stablecoins() {
        let engine = engine_with_quotes();
        let report = engine
            .build_report("usd", 6, &Preferences::default())
            .await
            .unwrap();

        assert!(report.rows.iter().all(|r| r.symbol != "USDT"));
        // USDT is still counted in verification stats, just never ranked
        assert_eq!(report.stats.total, 6);
    }

    #[tokio::test]
    async fn test_rank_is_deterministic() {
        let engine = engine_with_quotes();
        let rows = engine.fetch_market_snapshot("usd").await.unwrap();
        let quotes = engine.collect_quotes(&rows).await;
        let (verified, _) = engine.verify(rows, &quotes);

        let prefs = Preferences::default();
        let first = engine.rank(verified.clone(), 5, &prefs).unwrap();
        let second = engine.rank(verified, 5, &prefs).unwrap();

        let symbols = |sel: &RankedSelection| {
            sel.majors
                .iter()
                .chain(sel.alts.iter())
                .map(|a| a.snapshot.symbol.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(symbols(&first), symbols(&second));

        // BETA and GAMMA have identical inputs; the lower rank must win
        let alt_symbols: Vec<_> =
            first.alts.iter().map(|a| a.snapshot.symbol.as_str()).collect();
        let beta = alt_symbols.iter().position(|s| *s == "BETA").unwrap();
        let gamma = alt_symbols.iter().position(|s| *s == "GAMMA").unwrap();
        assert!(beta < gamma);
    }

    #[tokio::test]
    async fn test_preferences_filter_and_focus() {
        let engine = engine_with_quotes();
        let rows = engine.fetch_market_snapshot("usd").await.unwrap();
        let quotes = engine.collect_quotes(&rows).await;
        let (verified, _) = engine.verify(rows, &quotes);

        let prefs = Preferences {
            avoid_symbols: vec!["beta".into()],
            focus_symbols: vec!["GAMMA".into()],
            ..Preferences::default()
        };
        let selection = engine.rank(verified, 6, &prefs).unwrap();
        let all: Vec<_> = selection
            .majors
            .iter()
            .chain(selection.alts.iter())
            .map(|a| a.snapshot.symbol.as_str())
            .collect();

        assert!(!all.contains(&"BETA"));
        assert!(all.contains(&"GAMMA"));
    }

    #[tokio::test]
    async fn test_risk_preference_keeps_lower_tiers() {
        let engine = engine_with_quotes();
        let rows = engine.fetch_market_snapshot("usd").await.unwrap();
        let quotes = engine.collect_quotes(&rows).await;
        let (verified, _) = engine.verify(rows, &quotes);

        let prefs = Preferences {
            risk_preference: Some(crate::model::RiskTier::Low),
            ..Preferences::default()
        };
        let selection = engine.rank(verified, 10, &prefs).unwrap();
        assert!(selection
            .majors
            .iter()
            .chain(selection.alts.iter())
            .all(|a| a.risk == crate::model::RiskTier::Low));
    }

    #[tokio::test]
    async fn test_no_candidates_after_filters_is_an_error() {
        let engine = MarketEngine::new(
            test_config(),
            Arc::new(MockSnapshotSource::new(vec![snapshot_row(
                "USDT",
                3,
                dec!(1),
                dec!(120_000_000_000),
                dec!(60_000_000_000),
                dec!(0.01),
                dec!(0.02),
            )])),
        );

        let err = engine
            .build_report("usd", 10, &Preferences::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoCandidates));
    }

    #[tokio::test]
    async fn test_popularity_boost_tilts_ranking() {
        use crate::popularity::InterestTracker;

        let tracker = Arc::new(InterestTracker::new());
        for _ in 0..12 {
            tracker.record_mention("GAMMA");
        }

        let engine = engine_with_quotes().with_popularity(tracker);
        let rows = engine.fetch_market_snapshot("usd").await.unwrap();
        let quotes = engine.collect_quotes(&rows).await;
        let (verified, _) = engine.verify(rows, &quotes);
        let selection = engine.rank(verified, 6, &Preferences::default()).unwrap();

        let alt_symbols: Vec<_> =
            selection.alts.iter().map(|a| a.snapshot.symbol.as_str()).collect();
        let beta = alt_symbols.iter().position(|s| *s == "BETA").unwrap();
        let gamma = alt_symbols.iter().position(|s| *s == "GAMMA").unwrap();
        assert!(gamma < beta);
    }
}
