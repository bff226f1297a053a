//! Stooq daily history provider.
//!
//! Fetches the full daily CSV for a ticker from `stooq.com` and parses it
//! into price rows. Transient failures (timeouts, HTTP 5xx, 429) are retried
//! with exponential backoff.

use super::provider::{DataError, PriceProvider};
use crate::domain::PriceRow;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

const BASE_URL: &str = "https://stooq.com/q/d/l/";

/// Body Stooq serves instead of CSV once the daily quota is used up.
const DAILY_LIMIT_MARKER: &str = "Exceeded the daily hits limit";

/// One CSV record as served by Stooq.
#[derive(Debug, Deserialize)]
struct StooqRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    // Indices and some funds ship without volume.
    #[serde(rename = "Volume", default)]
    volume: Option<f64>,
}

/// Stooq data provider.
pub struct StooqProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl StooqProvider {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Point the provider at a different host (mirrors, local fixtures).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Daily CSV URL for a ticker.
    fn history_url(&self, ticker: &str) -> String {
        format!("{}?s={}&i=d", self.base_url, ticker.to_lowercase())
    }

    /// Execute the HTTP request with retry logic and return the raw body.
    fn fetch_body(&self, ticker: &str) -> Result<String, DataError> {
        let url = self.history_url(ticker);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            tracing::debug!(ticker, %url, attempt, "fetching daily history");

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::SymbolNotFound {
                            ticker: ticker.to_string(),
                        });
                    }

                    if !status.is_success() {
                        last_error = Some(DataError::Other(format!("HTTP {status} for {ticker}")));
                        continue;
                    }

                    return resp.text().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to read response for {ticker}: {e}"
                        ))
                    });
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl PriceProvider for StooqProvider {
    fn name(&self) -> &str {
        "stooq"
    }

    fn fetch_raw_history(&self, ticker: &str) -> Result<Vec<PriceRow>, DataError> {
        let body = self.fetch_body(ticker)?;
        let rows = parse_csv(ticker, &body)?;
        tracing::info!(ticker, rows = rows.len(), "fetched daily history");
        Ok(rows)
    }
}

/// Parse a Stooq daily CSV body into price rows for `ticker`.
///
/// Stooq answers unknown symbols with HTTP 200 and a plain `No data` body,
/// so a missing CSV header means the symbol does not exist.
pub fn parse_csv(ticker: &str, body: &str) -> Result<Vec<PriceRow>, DataError> {
    let trimmed = body.trim_start();
    if trimmed.starts_with(DAILY_LIMIT_MARKER) {
        return Err(DataError::RateLimited {
            retry_after_secs: 24 * 60 * 60,
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(trimmed.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| DataError::ResponseFormatChanged(format!("unreadable header: {e}")))?;
    if !headers.iter().any(|h| h == "Date") || !headers.iter().any(|h| h == "Close") {
        return Err(DataError::SymbolNotFound {
            ticker: ticker.to_string(),
        });
    }

    let mut rows = Vec::new();
    for (line, record) in reader.deserialize::<StooqRecord>().enumerate() {
        let record = record.map_err(|e| {
            DataError::ResponseFormatChanged(format!("bad record at line {}: {e}", line + 2))
        })?;
        let date = NaiveDate::parse_from_str(&record.date, "%Y-%m-%d").map_err(|e| {
            DataError::ResponseFormatChanged(format!("bad date '{}': {e}", record.date))
        })?;

        rows.push(PriceRow {
            ticker: ticker.to_string(),
            date,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume.unwrap_or(0.0),
        });
    }

    if rows.is_empty() {
        return Err(DataError::EmptyResponse {
            ticker: ticker.to_string(),
        });
    }

    Ok(rows)
}
