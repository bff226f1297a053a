//! Price rows, the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV row for a single ticker on a single day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceRow {
    /// Basic OHLC sanity check: high >= low, prices positive and finite.
    pub fn is_sane(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Close price looked up for one offset spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetClose {
    /// Spec name (without the `offset_` prefix).
    pub name: String,
    pub close: Option<f64>,
}

/// A price row augmented with one historical close per offset spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRow {
    pub row: PriceRow,
    pub offsets: Vec<OffsetClose>,
}

impl EnrichedRow {
    pub fn ticker(&self) -> &str {
        &self.row.ticker
    }

    pub fn date(&self) -> NaiveDate {
        self.row.date
    }

    pub fn close(&self) -> f64 {
        self.row.close
    }

    /// Offset close for the spec named `name`.
    ///
    /// Returns `None` both when the spec is unknown and when the offset
    /// reaches before the start of the history.
    pub fn offset(&self, name: &str) -> Option<f64> {
        self.offsets
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.close)
    }

    /// Storage key: one row per (ticker, date).
    pub fn key(&self) -> (String, NaiveDate) {
        (self.row.ticker.clone(), self.row.date)
    }
}
