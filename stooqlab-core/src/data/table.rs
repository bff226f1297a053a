//! In-memory price table keyed by (ticker, date).
//!
//! Every merge path goes through this table, which is what guarantees one
//! row per (ticker, date) and that touching one ticker never disturbs the
//! rows of another.

use crate::domain::EnrichedRow;
use chrono::NaiveDate;
use std::collections::BTreeMap;

type Key = (String, NaiveDate);

#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    rows: BTreeMap<Key, EnrichedRow>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from rows; on duplicate keys the later row wins.
    pub fn from_rows(rows: impl IntoIterator<Item = EnrichedRow>) -> Self {
        let mut table = Self::new();
        table.upsert(rows);
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append-and-dedupe: insert rows, overwriting existing (ticker, date) keys.
    pub fn upsert(&mut self, rows: impl IntoIterator<Item = EnrichedRow>) {
        for row in rows {
            self.rows.insert(row.key(), row);
        }
    }

    /// Drop every row of `ticker`, then insert `rows`.
    pub fn replace_ticker(&mut self, ticker: &str, rows: impl IntoIterator<Item = EnrichedRow>) {
        self.remove_ticker(ticker);
        self.upsert(rows);
    }

    /// Remove every row of `ticker`, returning how many were removed.
    pub fn remove_ticker(&mut self, ticker: &str) -> usize {
        let keys: Vec<Key> = self
            .ticker_range(ticker)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            self.rows.remove(key);
        }
        keys.len()
    }

    /// Rows of `ticker`, ascending by date.
    pub fn ticker_rows(&self, ticker: &str) -> Vec<EnrichedRow> {
        self.ticker_range(ticker).map(|(_, row)| row.clone()).collect()
    }

    /// Latest date stored for `ticker`.
    pub fn latest_date(&self, ticker: &str) -> Option<NaiveDate> {
        self.ticker_range(ticker).next_back().map(|((_, date), _)| *date)
    }

    /// Distinct tickers, sorted.
    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = Vec::new();
        for (ticker, _) in self.rows.keys() {
            if tickers.last() != Some(ticker) {
                tickers.push(ticker.clone());
            }
        }
        tickers
    }

    /// Iterate all rows ordered by (ticker, date).
    pub fn iter(&self) -> impl Iterator<Item = &EnrichedRow> {
        self.rows.values()
    }

    /// All rows ordered by (ticker, date).
    pub fn into_rows(self) -> Vec<EnrichedRow> {
        self.rows.into_values().collect()
    }

    fn ticker_range(
        &self,
        ticker: &str,
    ) -> std::collections::btree_map::Range<'_, Key, EnrichedRow> {
        let start = (ticker.to_string(), NaiveDate::MIN);
        let end = (ticker.to_string(), NaiveDate::MAX);
        self.rows.range(start..=end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OffsetClose, PriceRow};

    fn row(ticker: &str, date: &str, close: f64) -> EnrichedRow {
        EnrichedRow {
            row: PriceRow {
                ticker: ticker.into(),
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            },
            offsets: vec![OffsetClose {
                name: "one".into(),
                close: None,
            }],
        }
    }

    #[test]
    fn upsert_keeps_newest_on_conflict() {
        let mut table = PriceTable::from_rows(vec![row("A", "2024-01-02", 1.0)]);
        table.upsert(vec![row("A", "2024-01-02", 2.0), row("A", "2024-01-03", 3.0)]);

        let rows = table.ticker_rows("A");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].close(), 2.0);
    }

    #[test]
    fn replace_ticker_leaves_others_untouched() {
        let mut table = PriceTable::from_rows(vec![
            row("A", "2024-01-02", 1.0),
            row("A", "2024-01-03", 1.5),
            row("B", "2024-01-02", 5.0),
        ]);
        let before_b = table.ticker_rows("B");

        table.replace_ticker("A", vec![row("A", "2024-02-01", 9.0)]);

        assert_eq!(table.ticker_rows("A").len(), 1);
        assert_eq!(table.ticker_rows("B"), before_b);
    }

    #[test]
    fn ticker_range_does_not_bleed_into_prefixed_tickers() {
        let table = PriceTable::from_rows(vec![
            row("A", "2024-01-02", 1.0),
            row("AA", "2024-01-02", 2.0),
        ]);
        assert_eq!(table.ticker_rows("A").len(), 1);
        assert_eq!(table.tickers(), vec!["A", "AA"]);
    }

    #[test]
    fn latest_date_per_ticker() {
        let table = PriceTable::from_rows(vec![
            row("A", "2024-01-05", 1.0),
            row("A", "2024-01-02", 1.0),
            row("B", "2024-03-01", 1.0),
        ]);
        assert_eq!(
            table.latest_date("A"),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(table.latest_date("C"), None);
    }
}
