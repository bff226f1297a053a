//! Canonicalization of fetched history: sort, dedupe, stamp ticker.

use crate::domain::PriceRow;

/// Result of canonicalizing one ticker's fetched rows.
#[derive(Debug)]
pub struct Canonical {
    /// Rows sorted ascending by date, one per date.
    pub rows: Vec<PriceRow>,
    /// Rows dropped because a later row had the same date.
    pub duplicates_dropped: usize,
    /// Rows failing the OHLC sanity check. Kept, only counted.
    pub insane_rows: usize,
}

/// Canonicalize fetched rows for `ticker`.
///
/// Sorting is stable, and on duplicate dates the row that came LAST in the
/// provider's output wins. Every row is stamped with `ticker` so a provider
/// cannot leak rows across tickers.
pub fn canonicalize(ticker: &str, mut rows: Vec<PriceRow>) -> Canonical {
    for row in &mut rows {
        if row.ticker != ticker {
            row.ticker = ticker.to_string();
        }
    }

    rows.sort_by_key(|r| r.date);

    let before = rows.len();
    let mut deduped: Vec<PriceRow> = Vec::with_capacity(before);
    for row in rows {
        match deduped.last_mut() {
            Some(last) if last.date == row.date => *last = row,
            _ => deduped.push(row),
        }
    }

    let insane_rows = deduped.iter().filter(|r| !r.is_sane()).count();

    Canonical {
        duplicates_dropped: before - deduped.len(),
        insane_rows,
        rows: deduped,
    }
}
