//! Engine Configuration

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::retry::RetryPolicy;

/// Balanced-selector knobs.
#[derive(Clone, Debug)]
pub struct SelectorConfig {
    /// Target share of the final list reserved for majors
    pub majors_fraction: Decimal,

    /// Never fewer majors than this (when available)
    pub majors_floor: usize,

    /// Never more majors than this
    pub majors_ceiling: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            majors_fraction: dec!(0.35),
            majors_floor: 4,
            majors_ceiling: 10,
        }
    }
}

/// Engine configuration
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// TTL for the bulk top-N snapshot (the most rate-limited call)
    pub snapshot_ttl: Duration,

    /// TTL for single-symbol spot prices
    pub spot_ttl: Duration,

    /// Per-cache capacity ceiling
    pub cache_max_items: usize,

    /// Max relative deviation from the anchor for a quote to count (percent)
    pub tolerance_pct: Decimal,

    /// Backoff schedule shared by all adapters
    pub retry: RetryPolicy,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,

    /// Overall budget for the quote-collection phase of a report build.
    /// When it elapses, verification proceeds with whatever quotes arrived.
    pub report_deadline: Duration,

    /// Spot lookups in flight at once during fan-out
    pub quote_concurrency: usize,

    pub selector: SelectorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl: Duration::from_secs(300),
            spot_ttl: Duration::from_secs(60),
            cache_max_items: 512,
            tolerance_pct: dec!(2.0),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(20),
            report_deadline: Duration::from_secs(45),
            quote_concurrency: 8,
            selector: SelectorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden from environment variables where set.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_u64("MARKET_SNAPSHOT_TTL_SECS") {
            config.snapshot_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("MARKET_SPOT_TTL_SECS") {
            config.spot_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("MARKET_REPORT_DEADLINE_SECS") {
            config.report_deadline = Duration::from_secs(secs);
        }
        if let Some(pct) = std::env::var("MARKET_TOLERANCE_PCT")
            .ok()
            .and_then(|v| v.parse::<Decimal>().ok())
        {
            config.tolerance_pct = pct;
        }

        config
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.snapshot_ttl, Duration::from_secs(300));
        assert_eq!(config.spot_ttl, Duration::from_secs(60));
        assert_eq!(config.tolerance_pct, dec!(2.0));
        assert_eq!(config.retry.max_attempts(), 3);
        assert_eq!(config.selector.majors_floor, 4);
    }
}
