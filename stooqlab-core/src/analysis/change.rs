//! Historical change summary and chart windows for one ticker.

use crate::domain::EnrichedRow;
use chrono::NaiveDate;

/// Approximate trading days per calendar year.
pub const TRADING_DAYS_PER_YEAR: usize = 252;

/// `close - offset_close` for one offset.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetChange {
    pub name: String,
    pub change: Option<f64>,
}

/// Change of the latest close against each offset and the first close.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSummary {
    pub ticker: String,
    pub date: NaiveDate,
    pub close: f64,
    pub changes: Vec<OffsetChange>,
    /// Latest close minus the first close in the history.
    pub max_change: f64,
}

impl ChangeSummary {
    pub fn change(&self, name: &str) -> Option<f64> {
        self.changes
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.change)
    }
}

/// Summarize one ticker's history, ascending by date.
pub fn summarize(rows: &[EnrichedRow]) -> Option<ChangeSummary> {
    let first = rows.first()?;
    let latest = rows.last()?;

    Some(ChangeSummary {
        ticker: latest.ticker().to_string(),
        date: latest.date(),
        close: latest.close(),
        changes: latest
            .offsets
            .iter()
            .map(|o| OffsetChange {
                name: o.name.clone(),
                change: o.close.map(|then| latest.close() - then),
            })
            .collect(),
        max_change: latest.close() - first.close(),
    })
}

/// How much history a chart shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartWindow {
    Max,
    Years(u32),
}

impl ChartWindow {
    pub fn label(&self) -> String {
        match self {
            ChartWindow::Max => "max".to_string(),
            ChartWindow::Years(1) => "1 year".to_string(),
            ChartWindow::Years(n) => format!("{n} years"),
        }
    }
}

/// Tail of `rows` covered by `window`, counting trading days not calendar days.
pub fn window(rows: &[EnrichedRow], window: ChartWindow) -> &[EnrichedRow] {
    match window {
        ChartWindow::Max => rows,
        ChartWindow::Years(years) => {
            let count = (years as usize).saturating_mul(TRADING_DAYS_PER_YEAR);
            &rows[rows.len().saturating_sub(count)..]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OffsetClose, PriceRow};
    use chrono::Duration;

    fn history(count: usize) -> Vec<EnrichedRow> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..count)
            .map(|i| EnrichedRow {
                row: PriceRow {
                    ticker: "AAPL.US".into(),
                    date: start + Duration::days(i as i64),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 10.0 + i as f64,
                    volume: 1.0,
                },
                offsets: vec![
                    OffsetClose {
                        name: "one".into(),
                        close: Some(12.0),
                    },
                    OffsetClose {
                        name: "five".into(),
                        close: None,
                    },
                ],
            })
            .collect()
    }

    #[test]
    fn summary_uses_latest_row() {
        let rows = history(5);
        let summary = summarize(&rows).unwrap();

        assert_eq!(summary.close, 14.0);
        assert_eq!(summary.change("one"), Some(2.0));
        assert_eq!(summary.change("five"), None);
        assert_eq!(summary.max_change, 4.0);
    }

    #[test]
    fn empty_history_has_no_summary() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn window_takes_trading_day_tail() {
        let rows = history(600);
        assert_eq!(window(&rows, ChartWindow::Max).len(), 600);
        assert_eq!(window(&rows, ChartWindow::Years(1)).len(), 252);
        assert_eq!(window(&rows, ChartWindow::Years(5)).len(), 600);
        assert_eq!(
            window(&rows, ChartWindow::Years(1)).last().unwrap().date(),
            rows.last().unwrap().date()
        );
    }

    #[test]
    fn window_labels() {
        assert_eq!(ChartWindow::Max.label(), "max");
        assert_eq!(ChartWindow::Years(1).label(), "1 year");
        assert_eq!(ChartWindow::Years(5).label(), "5 years");
    }
}
