//! Bump screening: which tickers multiplied in value over an offset window.
//!
//! A bump is `close / offset_close - 1`. With a bump factor of 4, a ticker
//! qualifies on a given offset when it trades at more than 4x the close of
//! the matched historical day.

use crate::domain::{EnrichedRow, OffsetSpec};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct BumpFilter {
    /// Only rows dated after Jan 1 of this year, whose origin date also
    /// falls after this year, are considered.
    pub cutoff_year: i32,
    /// Minimum growth multiple, e.g. 4.0 for "at least 4x".
    pub bump_factor: f64,
    /// Offsets to screen. Each must exist as a column in the rows.
    pub offsets: Vec<OffsetSpec>,
}

impl Default for BumpFilter {
    fn default() -> Self {
        Self {
            cutoff_year: 2020,
            bump_factor: 4.0,
            offsets: vec![OffsetSpec::one(), OffsetSpec::two(), OffsetSpec::five()],
        }
    }
}

/// One qualifying (ticker, offset) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Bump {
    pub ticker: String,
    /// Offset spec name the bump was measured over.
    pub offset: String,
    pub date: NaiveDate,
    pub close: f64,
    pub origin_date: NaiveDate,
    pub origin_value: f64,
    pub bump: f64,
    /// Close on the ticker's latest date after the cutoff.
    pub current_value: f64,
}

/// Screen `rows` (any mix of tickers) for bumps.
///
/// Per offset, only the LAST qualifying row of each ticker in input order is
/// kept; rows read from the store are ascending by date, so that is the most
/// recent one. Output is grouped by offset in filter order, then by ticker.
pub fn find_bumps(rows: &[EnrichedRow], filter: &BumpFilter) -> Vec<Bump> {
    let cutoff = NaiveDate::from_ymd_opt(filter.cutoff_year, 1, 1).unwrap_or(NaiveDate::MIN);
    let recent: Vec<&EnrichedRow> = rows.iter().filter(|r| r.date() > cutoff).collect();

    let mut current: BTreeMap<&str, (NaiveDate, f64)> = BTreeMap::new();
    for row in &recent {
        let entry = current.entry(row.ticker()).or_insert((row.date(), row.close()));
        if row.date() >= entry.0 {
            *entry = (row.date(), row.close());
        }
    }

    let threshold = filter.bump_factor - 1.0;
    let mut bumps = Vec::new();

    for spec in &filter.offsets {
        let mut last_per_ticker: BTreeMap<&str, Bump> = BTreeMap::new();

        for row in &recent {
            let Some(origin_value) = row.offset(&spec.name) else {
                continue;
            };
            let Some(origin_date) = spec.target_date(row.date()) else {
                continue;
            };
            if origin_date.year() <= filter.cutoff_year {
                continue;
            }

            // A zero origin gives an infinite bump, which qualifies.
            let bump = row.close() / origin_value - 1.0;
            if bump.is_nan() || bump <= threshold {
                continue;
            }

            let current_value = current.get(row.ticker()).map_or(row.close(), |&(_, c)| c);
            last_per_ticker.insert(
                row.ticker(),
                Bump {
                    ticker: row.ticker().to_string(),
                    offset: spec.name.clone(),
                    date: row.date(),
                    close: row.close(),
                    origin_date,
                    origin_value,
                    bump,
                    current_value,
                },
            );
        }

        bumps.extend(last_per_ticker.into_values());
    }

    bumps
}
