//! Historical offset alignment.
//!
//! For every row of one ticker's history and every offset spec, find the
//! row whose date is nearest to `date - offset` and copy its close onto the
//! current row as `offset_<name>`. Trading calendars are irregular, so the
//! match is approximate: minimum absolute distance in days, earlier date on
//! ties. Targets before the first row of the history have no match.
//!
//! Lookups are binary searches over a date-sorted index of the rows, so one
//! offset costs O(n log n) instead of the O(n²) pairwise distance matrix.

use crate::domain::{EnrichedRow, OffsetClose, OffsetSpec, PriceRow};
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("cannot compute offsets for an empty history")]
    EmptyHistory,
}

/// Rows of one history ordered by date, pointing back into the input slice.
///
/// Equal dates keep their input order, so the first row of a run of
/// duplicates is always the one that appeared first.
#[derive(Debug)]
pub struct DateIndex {
    dates: Vec<NaiveDate>,
    positions: Vec<usize>,
}

impl DateIndex {
    pub fn new(history: &[PriceRow]) -> Self {
        let mut positions: Vec<usize> = (0..history.len()).collect();
        positions.sort_by_key(|&i| (history[i].date, i));
        let dates = positions.iter().map(|&i| history[i].date).collect();
        Self { dates, positions }
    }

    pub fn min_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    /// Input position of the row nearest to `target`.
    ///
    /// Returns `None` for an empty index or a target before the first date.
    pub fn nearest(&self, target: NaiveDate) -> Option<usize> {
        let min = self.min_date()?;
        if target < min {
            return None;
        }

        // First date >= target. `pos >= 1` because target >= min.
        let pos = self.dates.partition_point(|d| *d < target);
        let before = self.first_of_run(pos - 1);

        let sorted = match self.dates.get(pos) {
            None => before,
            Some(after) => {
                let gap_before = (target - self.dates[before]).num_days();
                let gap_after = (*after - target).num_days();
                if gap_after < gap_before {
                    pos
                } else {
                    before
                }
            }
        };

        Some(self.positions[sorted])
    }

    /// Start of the run of equal dates containing sorted slot `slot`.
    fn first_of_run(&self, slot: usize) -> usize {
        let date = self.dates[slot];
        self.dates[..slot].partition_point(|d| *d < date)
    }
}

/// Enrich `history` with one offset close per spec.
///
/// Output has exactly one row per input row, in input order. Each offset
/// value is a close taken from `history` itself.
pub fn align(history: &[PriceRow], offsets: &[OffsetSpec]) -> Result<Vec<EnrichedRow>, AlignError> {
    if history.is_empty() {
        return Err(AlignError::EmptyHistory);
    }

    let index = DateIndex::new(history);
    let columns: Vec<Vec<Option<f64>>> = offsets
        .iter()
        .map(|spec| offset_column(history, &index, spec))
        .collect();

    let enriched = history
        .iter()
        .enumerate()
        .map(|(i, row)| EnrichedRow {
            row: row.clone(),
            offsets: offsets
                .iter()
                .zip(&columns)
                .map(|(spec, column)| OffsetClose {
                    name: spec.name.clone(),
                    close: column[i],
                })
                .collect(),
        })
        .collect();

    Ok(enriched)
}

/// Offset closes for one spec, indexed like `history`.
fn offset_column(history: &[PriceRow], index: &DateIndex, spec: &OffsetSpec) -> Vec<Option<f64>> {
    history
        .iter()
        .map(|row| {
            spec.target_date(row.date)
                .and_then(|target| index.nearest(target))
                .map(|matched| history[matched].close)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration, Weekday};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn row(date: NaiveDate, close: f64) -> PriceRow {
        PriceRow {
            ticker: "T".into(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 100.0,
        }
    }

    /// `count` consecutive calendar days starting at `start`, close = index.
    fn daily(start: &str, count: usize) -> Vec<PriceRow> {
        let start = d(start);
        (0..count)
            .map(|i| row(start + Duration::days(i as i64), i as f64))
            .collect()
    }

    /// `count` consecutive business days (Mon-Fri), close = index.
    fn business_days(start: &str, count: usize) -> Vec<PriceRow> {
        let mut date = d(start);
        let mut rows = Vec::with_capacity(count);
        while rows.len() < count {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                rows.push(row(date, rows.len() as f64));
            }
            date += Duration::days(1);
        }
        rows
    }

    #[test]
    fn empty_history_is_error() {
        assert_eq!(align(&[], &OffsetSpec::defaults()), Err(AlignError::EmptyHistory));
    }

    #[test]
    fn output_matches_input_length_and_order() {
        let history = daily("2020-01-01", 800);
        let out = align(&history, &OffsetSpec::defaults()).unwrap();
        assert_eq!(out.len(), history.len());
        for (input, output) in history.iter().zip(&out) {
            assert_eq!(&output.row, input);
            assert_eq!(output.offsets.len(), 5);
        }
    }

    #[test]
    fn one_year_offset_on_daily_history() {
        let history = daily("2020-01-01", 800);
        let out = align(&history, &[OffsetSpec::years("1y", 1)]).unwrap();

        // 2021-03-15 - 1y = 2020-03-15, which is day 74 of the series.
        let i = history.iter().position(|r| r.date == d("2021-03-15")).unwrap();
        assert_eq!(out[i].offset("1y"), Some(74.0));

        // Anything before 2021-01-01 reaches before the first row.
        for (row, enriched) in history.iter().zip(&out) {
            if row.date < d("2021-01-01") {
                assert_eq!(enriched.offset("1y"), None, "{}", row.date);
            } else {
                assert!(enriched.offset("1y").is_some(), "{}", row.date);
            }
        }
    }

    #[test]
    fn target_equal_to_first_date_matches_first_row() {
        let history = daily("2020-01-01", 400);
        let out = align(&history, &[OffsetSpec::one()]).unwrap();
        let i = history.iter().position(|r| r.date == d("2021-01-01")).unwrap();
        assert_eq!(out[i].offset("one"), Some(0.0));
    }

    #[test]
    fn four_hundred_business_days_scenario() {
        let history = business_days("2022-01-03", 400);
        let out = align(&history, &[OffsetSpec::years("1y", 1)]).unwrap();

        let last = history.last().unwrap();
        let target = last.date - Duration::days(365);
        let expected = history
            .iter()
            .min_by_key(|r| (r.date - target).num_days().abs())
            .unwrap();
        assert_eq!(out.last().unwrap().offset("1y"), Some(expected.close));
    }

    #[test]
    fn weekend_target_picks_nearest_trading_day() {
        // Fri 2023-06-09 and Mon 2023-06-12 trade; target Sun 2023-06-11.
        let history = vec![
            row(d("2023-06-08"), 1.0),
            row(d("2023-06-09"), 2.0),
            row(d("2023-06-12"), 3.0),
            row(d("2024-06-11"), 4.0),
        ];
        let out = align(&history, &[OffsetSpec::one()]).unwrap();
        assert_eq!(out[3].offset("one"), Some(3.0));
    }

    #[test]
    fn equidistant_tie_prefers_earlier_date() {
        // Target 2023-06-10 is exactly one day from both neighbours.
        let history = vec![
            row(d("2023-06-09"), 1.0),
            row(d("2023-06-11"), 2.0),
            row(d("2024-06-10"), 3.0),
        ];
        let out = align(&history, &[OffsetSpec::one()]).unwrap();
        assert_eq!(out[2].offset("one"), Some(1.0));
    }

    #[test]
    fn unsorted_input_keeps_input_order() {
        let mut history = daily("2020-01-01", 500);
        history.reverse();
        let out = align(&history, &[OffsetSpec::one()]).unwrap();

        assert_eq!(out[0].row.date, d("2021-05-14"));
        // 2021-05-14 - 1y = 2020-05-14, day 134.
        assert_eq!(out[0].offset("one"), Some(134.0));
        assert_eq!(out.last().unwrap().offset("one"), None);
    }

    #[test]
    fn offsets_keep_spec_order() {
        let history = daily("2000-01-01", 10);
        let specs = vec![OffsetSpec::twenty(), OffsetSpec::one()];
        let out = align(&history, &specs).unwrap();
        let names: Vec<&str> = out[0].offsets.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["twenty", "one"]);
    }

    #[test]
    fn no_offsets_yields_plain_rows() {
        let history = daily("2020-01-01", 3);
        let out = align(&history, &[]).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| r.offsets.is_empty()));
    }

    #[test]
    fn index_handles_duplicate_dates() {
        let history = vec![
            row(d("2020-01-01"), 1.0),
            row(d("2020-01-05"), 2.0),
            row(d("2020-01-05"), 3.0),
        ];
        let index = DateIndex::new(&history);
        assert_eq!(index.nearest(d("2020-01-06")), Some(1));
        assert_eq!(index.nearest(d("2020-01-04")), Some(1));
        assert_eq!(index.nearest(d("2019-12-31")), None);
    }
}
