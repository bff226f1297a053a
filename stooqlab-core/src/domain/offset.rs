//! Historical lookback specs.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Prefix of every offset column in the store.
pub const OFFSET_COLUMN_PREFIX: &str = "offset_";

/// A named calendar lookback. Offsets always go back in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetSpec {
    pub name: String,
    #[serde(default)]
    pub years: u32,
    #[serde(default)]
    pub months: u32,
    #[serde(default)]
    pub days: u32,
}

impl OffsetSpec {
    pub fn new(name: impl Into<String>, years: u32, months: u32, days: u32) -> Self {
        Self {
            name: name.into(),
            years,
            months,
            days,
        }
    }

    pub fn years(name: impl Into<String>, years: u32) -> Self {
        Self::new(name, years, 0, 0)
    }

    pub fn one() -> Self {
        Self::years("one", 1)
    }

    pub fn two() -> Self {
        Self::years("two", 2)
    }

    pub fn five() -> Self {
        Self::years("five", 5)
    }

    pub fn ten() -> Self {
        Self::years("ten", 10)
    }

    pub fn twenty() -> Self {
        Self::years("twenty", 20)
    }

    /// The full built-in set: 1, 2, 5, 10 and 20 years back.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::one(),
            Self::two(),
            Self::five(),
            Self::ten(),
            Self::twenty(),
        ]
    }

    /// Store column holding this offset's close.
    pub fn column_name(&self) -> String {
        format!("{OFFSET_COLUMN_PREFIX}{}", self.name)
    }

    /// `date` moved back by this offset.
    ///
    /// Years and months are applied together first, clamping the day to the
    /// end of the target month (2024-02-29 minus 1 year is 2023-02-28), then
    /// days. Returns `None` only when the result leaves chrono's date range.
    pub fn target_date(&self, date: NaiveDate) -> Option<NaiveDate> {
        let total_months = self.years.checked_mul(12)?.checked_add(self.months)?;
        date.checked_sub_months(Months::new(total_months))?
            .checked_sub_days(Days::new(u64::from(self.days)))
    }
}

/// Strip the `offset_` prefix from a store column name.
pub fn spec_name_from_column(column: &str) -> Option<&str> {
    column
        .strip_prefix(OFFSET_COLUMN_PREFIX)
        .filter(|name| !name.is_empty())
}
