//! Price provider trait and structured error types.
//!
//! The PriceProvider trait abstracts over the upstream source (Stooq today)
//! so the cache manager can be driven by a mock in tests.

use crate::domain::PriceRow;
use thiserror::Error;

/// Upstream fetch failures.
///
/// These are recoverable per ticker: a failed fetch never touches the store.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {ticker}")]
    SymbolNotFound { ticker: String },

    #[error("provider returned no rows for '{ticker}'")]
    EmptyResponse { ticker: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for daily price providers.
///
/// Providers know nothing about the cache; they return the full daily
/// history they have for a ticker, ordered by date.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the complete daily OHLCV history for `ticker`.
    fn fetch_raw_history(&self, ticker: &str) -> Result<Vec<PriceRow>, DataError>;
}

/// Progress callback for batch refreshes.
///
/// Callbacks may arrive from worker threads, in any ticker order.
pub trait RefreshProgress: Send + Sync {
    /// Called when a stale ticker starts refreshing.
    fn on_start(&self, ticker: &str);

    /// Called when a ticker refresh finishes. `error` is `None` on success.
    fn on_complete(&self, ticker: &str, error: Option<&str>);

    /// Called once after the merged table has been written.
    fn on_batch_complete(&self, refreshed: usize, failed: usize, skipped: usize);
}

/// Progress reporter that writes through `tracing`.
pub struct LogProgress;

impl RefreshProgress for LogProgress {
    fn on_start(&self, ticker: &str) {
        tracing::info!(ticker, "refreshing");
    }

    fn on_complete(&self, ticker: &str, error: Option<&str>) {
        match error {
            None => tracing::info!(ticker, "refreshed"),
            Some(e) => tracing::warn!(ticker, error = e, "refresh failed"),
        }
    }

    fn on_batch_complete(&self, refreshed: usize, failed: usize, skipped: usize) {
        tracing::info!(refreshed, failed, skipped, "batch refresh complete");
    }
}

/// Progress reporter that discards every event.
pub struct NoProgress;

impl RefreshProgress for NoProgress {
    fn on_start(&self, _ticker: &str) {}

    fn on_complete(&self, _ticker: &str, _error: Option<&str>) {}

    fn on_batch_complete(&self, _refreshed: usize, _failed: usize, _skipped: usize) {}
}
