//! Error Types

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    /// A data source stayed down through retries and had no stale fallback
    #[error("source {source_id} unavailable: {reason}")]
    SourceUnavailable {
        source_id: &'static str,
        reason: String,
    },

    /// Rate limited by a provider (HTTP 429)
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// A provider answered with a payload we could not make sense of
    #[error("invalid response from {source_id}: {reason}")]
    InvalidResponse {
        source_id: &'static str,
        reason: String,
    },

    /// Nothing left to rank after category and preference filters
    #[error("no candidates remaining after filters")]
    NoCandidates,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether the error is worth retrying with backoff.
    ///
    /// Rate limits, server errors and connection-level failures are
    /// transient; everything else fails the attempt immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::RateLimited(_) => true,
            EngineError::Network(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                e.status().is_some_and(|s| {
                    s.as_u16() == 429 || s.is_server_error()
                })
            }
            _ => false,
        }
    }
}
