//! Ticker cache manager: staleness policy, refresh, and merge-back.
//!
//! A ticker's cached history is fresh while its latest stored date is at
//! most `ttl` days before today. Anything else (no rows, or too old) is
//! re-fetched, re-aligned and merged back into the store:
//!
//! - single ticker: the ticker's rows are replaced, other tickers are kept
//! - batch: all refreshed tickers are appended-and-deduped on
//!   (ticker, date) in memory, then written once
//!
//! A failed refresh never discards cached rows. Callers get the old rows back
//! flagged as degraded, or an error when there was nothing cached.

use super::align::{align, AlignError};
use super::canonicalize::canonicalize;
use super::provider::{DataError, NoProgress, PriceProvider, RefreshProgress};
use super::store::{PriceStore, StoreError};
use super::table::PriceTable;
use crate::clock::{Clock, SystemClock};
use crate::domain::{EnrichedRow, OffsetSpec};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Store key for a ticker symbol: trimmed and upper-cased.
///
/// Stooq symbols are case-insensitive, so `aapl.us` and `AAPL.US` name the
/// same cached history.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// Why a single ticker could not be refreshed.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] DataError),

    #[error("fetched history unusable: {0}")]
    Align(#[from] AlignError),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cached data for '{ticker}' and refresh failed: {source}")]
    Upstream {
        ticker: String,
        #[source]
        source: RefreshError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to start fetch workers: {0}")]
    WorkerPool(String),
}

/// Freshness of one ticker's cached rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Nothing cached.
    Missing,
    /// Latest row is within the TTL.
    Fresh { latest: NaiveDate },
    /// Latest row is more than the TTL before today.
    Expired { latest: NaiveDate, age_days: i64 },
}

impl Staleness {
    /// Classify a ticker from the latest date in its cached rows.
    pub fn evaluate(latest: Option<NaiveDate>, today: NaiveDate, ttl_days: u32) -> Self {
        match latest {
            None => Staleness::Missing,
            Some(latest) => {
                let age_days = (today - latest).num_days();
                if age_days > i64::from(ttl_days) {
                    Staleness::Expired { latest, age_days }
                } else {
                    Staleness::Fresh { latest }
                }
            }
        }
    }

    pub fn needs_refresh(&self) -> bool {
        !matches!(self, Staleness::Fresh { .. })
    }
}

/// How the rows returned by [`TickerCacheManager::get_ticker_data`] came about.
#[derive(Debug)]
pub enum CacheStatus {
    /// Served from the store without touching the network.
    Fresh,
    /// Fetched, aligned and written back.
    Refreshed,
    /// Refresh failed; rows are the last cached copy and may be stale.
    Degraded { error: RefreshError },
}

#[derive(Debug)]
pub struct TickerData {
    pub ticker: String,
    pub rows: Vec<EnrichedRow>,
    pub status: CacheStatus,
}

impl TickerData {
    /// True when the rows could not be brought up to date.
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, CacheStatus::Degraded { .. })
    }
}

/// Outcome of a batch refresh.
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// The merged table, every ticker, ordered by (ticker, date).
    pub rows: Vec<EnrichedRow>,
    /// Tickers fetched and merged.
    pub refreshed: Vec<String>,
    /// Tickers that were fresh and left alone.
    pub skipped: Vec<String>,
    /// Tickers whose refresh failed. Their cached rows, if any, are unchanged.
    pub failed: BTreeMap<String, RefreshError>,
}

impl RefreshReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// Rows of one ticker from the merged table.
    pub fn rows_for(&self, ticker: &str) -> Vec<&EnrichedRow> {
        let ticker = normalize_ticker(ticker);
        self.rows.iter().filter(|r| r.ticker() == ticker).collect()
    }
}

/// Settings the manager needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Offset columns computed for every refreshed ticker.
    pub offsets: Vec<OffsetSpec>,
    /// Upper bound on concurrent fetches during a batch refresh.
    pub fetch_concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            offsets: OffsetSpec::defaults(),
            fetch_concurrency: 4,
        }
    }
}

pub struct TickerCacheManager {
    store: Arc<dyn PriceStore>,
    provider: Arc<dyn PriceProvider>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl TickerCacheManager {
    pub fn new(
        store: Arc<dyn PriceStore>,
        provider: Arc<dyn PriceProvider>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            provider,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the wall clock, e.g. with a [`crate::clock::FixedClock`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cached rows for `ticker`, refreshed first if missing or older than
    /// `staleness_ttl_days`.
    ///
    /// Fresh data is returned without any fetch or store write. On a failed
    /// refresh, previously cached rows come back as [`CacheStatus::Degraded`];
    /// with nothing cached the failure is returned as
    /// [`CacheError::Upstream`].
    pub fn get_ticker_data(
        &self,
        ticker: &str,
        staleness_ttl_days: u32,
    ) -> Result<TickerData, CacheError> {
        let ticker = normalize_ticker(ticker);
        let ticker = ticker.as_str();
        let cached = self.store.read_for_ticker(ticker)?;
        let latest = cached.iter().map(EnrichedRow::date).max();
        let staleness = Staleness::evaluate(latest, self.clock.today(), staleness_ttl_days);

        if !staleness.needs_refresh() {
            tracing::debug!(ticker, rows = cached.len(), "serving cached rows");
            return Ok(TickerData {
                ticker: ticker.to_string(),
                rows: cached,
                status: CacheStatus::Fresh,
            });
        }

        tracing::info!(ticker, ?staleness, "cache needs refresh");

        match self.fetch_and_align(ticker) {
            Ok(rows) => {
                let mut table = PriceTable::from_rows(self.store.read_all()?);
                table.replace_ticker(ticker, rows.iter().cloned());
                self.store.write_all(&table.into_rows())?;

                Ok(TickerData {
                    ticker: ticker.to_string(),
                    rows,
                    status: CacheStatus::Refreshed,
                })
            }
            Err(error) if cached.is_empty() => Err(CacheError::Upstream {
                ticker: ticker.to_string(),
                source: error,
            }),
            Err(error) => {
                tracing::warn!(
                    ticker,
                    %error,
                    rows = cached.len(),
                    "refresh failed, serving stale cache"
                );
                Ok(TickerData {
                    ticker: ticker.to_string(),
                    rows: cached,
                    status: CacheStatus::Degraded { error },
                })
            }
        }
    }

    /// Refresh every stale ticker in `tickers` and write the result once.
    ///
    /// Tickers are normalized with [`normalize_ticker`] before deduping.
    pub fn refresh_many(
        &self,
        tickers: &[&str],
        staleness_ttl_days: u32,
    ) -> Result<RefreshReport, CacheError> {
        self.refresh_many_with_progress(tickers, staleness_ttl_days, &NoProgress)
    }

    /// [`Self::refresh_many`] with progress callbacks.
    ///
    /// Staleness is decided against a single bulk read. Stale tickers are
    /// fetched and aligned in parallel; one failing ticker does not stop the
    /// others. Successful results are appended-and-deduped on
    /// (ticker, date), newest row winning, and persisted in one write. When
    /// nothing was refreshed the store is not written at all.
    pub fn refresh_many_with_progress(
        &self,
        tickers: &[&str],
        staleness_ttl_days: u32,
        progress: &dyn RefreshProgress,
    ) -> Result<RefreshReport, CacheError> {
        let mut table = PriceTable::from_rows(self.store.read_all()?);
        let today = self.clock.today();

        let mut seen = HashSet::new();
        let mut stale: Vec<String> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();
        for ticker in tickers.iter().map(|t| normalize_ticker(t)) {
            if !seen.insert(ticker.clone()) {
                continue;
            }
            let staleness = Staleness::evaluate(table.latest_date(&ticker), today, staleness_ttl_days);
            if staleness.needs_refresh() {
                tracing::debug!(ticker = %ticker, ?staleness, "queued for refresh");
                stale.push(ticker);
            } else {
                skipped.push(ticker);
            }
        }

        let outcomes = self.fetch_all(&stale, progress)?;

        let mut refreshed = Vec::new();
        let mut failed = BTreeMap::new();
        for (ticker, outcome) in outcomes {
            match outcome {
                Ok(rows) => {
                    table.upsert(rows);
                    refreshed.push(ticker);
                }
                Err(error) => {
                    failed.insert(ticker, error);
                }
            }
        }

        if !refreshed.is_empty() {
            let rows = table.into_rows();
            self.store.write_all(&rows)?;
            table = PriceTable::from_rows(rows);
        }

        progress.on_batch_complete(refreshed.len(), failed.len(), skipped.len());

        Ok(RefreshReport {
            rows: table.into_rows(),
            refreshed,
            skipped,
            failed,
        })
    }

    /// Fetch and align `tickers` on a private pool, preserving input order.
    fn fetch_all(
        &self,
        tickers: &[String],
        progress: &dyn RefreshProgress,
    ) -> Result<Vec<(String, Result<Vec<EnrichedRow>, RefreshError>)>, CacheError> {
        if tickers.is_empty() {
            return Ok(Vec::new());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.fetch_concurrency.clamp(1, tickers.len()))
            .thread_name(|i| format!("stooqlab-fetch-{i}"))
            .build()
            .map_err(|e| CacheError::WorkerPool(e.to_string()))?;

        Ok(pool.install(|| {
            tickers
                .par_iter()
                .map(|ticker| {
                    progress.on_start(ticker);
                    let outcome = self.fetch_and_align(ticker);
                    let error = outcome.as_ref().err().map(ToString::to_string);
                    progress.on_complete(ticker, error.as_deref());
                    (ticker.clone(), outcome)
                })
                .collect()
        }))
    }

    /// Fetch → canonicalize → align for one ticker.
    fn fetch_and_align(&self, ticker: &str) -> Result<Vec<EnrichedRow>, RefreshError> {
        let raw = self.provider.fetch_raw_history(ticker)?;
        if raw.is_empty() {
            return Err(DataError::EmptyResponse {
                ticker: ticker.to_string(),
            }
            .into());
        }

        let canonical = canonicalize(ticker, raw);
        if canonical.duplicates_dropped > 0 || canonical.insane_rows > 0 {
            tracing::warn!(
                ticker,
                duplicates = canonical.duplicates_dropped,
                insane = canonical.insane_rows,
                "fetched history needed cleanup"
            );
        }

        Ok(align(&canonical.rows, &self.config.offsets)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::data::store::MemoryStore;
    use crate::domain::PriceRow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// Provider serving `days` daily rows ending on `end`, counting calls.
    struct CountingProvider {
        end: NaiveDate,
        days: i64,
        calls: AtomicUsize,
    }

    impl PriceProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn fetch_raw_history(&self, ticker: &str) -> Result<Vec<PriceRow>, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..self.days)
                .map(|i| {
                    let close = 100.0 + i as f64;
                    PriceRow {
                        ticker: ticker.to_string(),
                        date: self.end - chrono::Duration::days(self.days - 1 - i),
                        open: close,
                        high: close,
                        low: close,
                        close,
                        volume: 1.0,
                    }
                })
                .collect())
        }
    }

    #[test]
    fn staleness_boundaries() {
        let today = d("2024-06-20");
        assert_eq!(Staleness::evaluate(None, today, 5), Staleness::Missing);
        assert!(!Staleness::evaluate(Some(d("2024-06-15")), today, 5).needs_refresh());
        assert_eq!(
            Staleness::evaluate(Some(d("2024-06-14")), today, 5),
            Staleness::Expired {
                latest: d("2024-06-14"),
                age_days: 6
            }
        );
        // Dates after today are fresh.
        assert!(!Staleness::evaluate(Some(d("2024-06-25")), today, 0).needs_refresh());
    }

    #[test]
    fn fresh_cache_is_not_refetched() {
        let provider = Arc::new(CountingProvider {
            end: d("2024-06-20"),
            days: 3,
            calls: AtomicUsize::new(0),
        });
        let manager = TickerCacheManager::new(
            Arc::new(MemoryStore::new()),
            provider.clone(),
            CacheConfig::default(),
        )
        .with_clock(Arc::new(FixedClock(d("2024-06-21"))));

        let first = manager.get_ticker_data("AAPL.US", 5).unwrap();
        assert!(matches!(first.status, CacheStatus::Refreshed));
        let second = manager.get_ticker_data("AAPL.US", 5).unwrap();
        assert!(matches!(second.status, CacheStatus::Fresh));

        assert_eq!(first.rows, second.rows);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn normalize_ticker_trims_and_uppercases() {
        assert_eq!(normalize_ticker(" aapl.us "), "AAPL.US");
        assert_eq!(normalize_ticker("BRK-B.US"), "BRK-B.US");
    }

    #[test]
    fn differently_cased_tickers_in_batch_fetch_once() {
        let provider = Arc::new(CountingProvider {
            end: d("2024-06-20"),
            days: 3,
            calls: AtomicUsize::new(0),
        });
        let manager = TickerCacheManager::new(
            Arc::new(MemoryStore::new()),
            provider.clone(),
            CacheConfig::default(),
        )
        .with_clock(Arc::new(FixedClock(d("2024-06-21"))));

        let report = manager.refresh_many(&["msft.us", "MSFT.US"], 5).unwrap();

        assert_eq!(report.refreshed, vec!["MSFT.US"]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.rows_for("msft.us").len(), 3);
    }

    #[test]
    fn duplicate_tickers_in_batch_fetch_once() {
        let provider = Arc::new(CountingProvider {
            end: d("2024-06-20"),
            days: 3,
            calls: AtomicUsize::new(0),
        });
        let manager = TickerCacheManager::new(
            Arc::new(MemoryStore::new()),
            provider.clone(),
            CacheConfig::default(),
        )
        .with_clock(Arc::new(FixedClock(d("2024-06-21"))));

        let report = manager.refresh_many(&["A", "A", "B"], 5).unwrap();

        assert_eq!(report.refreshed, vec!["A", "B"]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.rows.len(), 6);
    }
}
