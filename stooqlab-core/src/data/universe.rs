//! Ticker list: the set of symbols to keep cached.
//!
//! Stored as a CSV file with two columns, `display_name` and `ticker_name`.
//! Entries are keyed by lower-cased display name.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One tracked ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerEntry {
    pub display_name: String,
    pub ticker_name: String,
}

/// The configured ticker list.
#[derive(Debug, Clone, Default)]
pub struct TickerList {
    tickers: BTreeMap<String, TickerEntry>,
}

impl TickerList {
    /// Load a ticker list from a CSV file.
    pub fn from_csv_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_csv(&content)
    }

    /// Parse a ticker list from CSV text.
    ///
    /// Later rows with the same display name replace earlier ones.
    pub fn from_csv(content: &str) -> Result<Self, ConfigError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut list = Self::default();
        for record in reader.deserialize::<TickerEntry>() {
            list.insert(record?);
        }

        if list.is_empty() {
            return Err(ConfigError::EmptyTickerList);
        }
        Ok(list)
    }

    pub fn insert(&mut self, entry: TickerEntry) {
        self.tickers.insert(entry.display_name.to_lowercase(), entry);
    }

    /// Look up by display name, case-insensitively.
    pub fn get(&self, display_name: &str) -> Option<&TickerEntry> {
        self.tickers.get(&display_name.to_lowercase())
    }

    /// Resolve user input that is either a display name or a ticker symbol.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).map(|e| e.ticker_name.as_str()).unwrap_or(name)
    }

    /// Ticker symbols, ordered by display name, without duplicates.
    pub fn ticker_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for entry in self.tickers.values() {
            if !names.contains(&entry.ticker_name.as_str()) {
                names.push(entry.ticker_name.as_str());
            }
        }
        names
    }

    pub fn entries(&self) -> impl Iterator<Item = &TickerEntry> {
        self.tickers.values()
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Built-in list of large US names.
    pub fn default_us() -> Self {
        let mut list = Self::default();
        for (display_name, ticker_name) in [
            ("Apple", "AAPL.US"),
            ("Microsoft", "MSFT.US"),
            ("Amazon", "AMZN.US"),
            ("Alphabet", "GOOGL.US"),
            ("Nvidia", "NVDA.US"),
            ("Meta", "META.US"),
            ("Tesla", "TSLA.US"),
            ("Berkshire Hathaway", "BRK-B.US"),
            ("S&P 500 ETF", "SPY.US"),
            ("Nasdaq 100 ETF", "QQQ.US"),
        ] {
            list.insert(TickerEntry {
                display_name: display_name.to_string(),
                ticker_name: ticker_name.to_string(),
            });
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_and_keys_by_lowercase_name() {
        let list = TickerList::from_csv(
            "display_name,ticker_name\nApple,AAPL.US\nMicrosoft,MSFT.US\n",
        )
        .unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list.get("APPLE").unwrap().ticker_name, "AAPL.US");
        assert_eq!(list.ticker_names(), vec!["AAPL.US", "MSFT.US"]);
    }

    #[test]
    fn duplicate_rows_collapse() {
        let list = TickerList::from_csv(
            "display_name,ticker_name\nApple,AAPL.US\nApple,AAPL.US\n",
        )
        .unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn empty_list_is_error() {
        let err = TickerList::from_csv("display_name,ticker_name\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyTickerList));
    }

    #[test]
    fn missing_column_is_error() {
        let err = TickerList::from_csv("name\nApple\n").unwrap_err();
        assert!(matches!(err, ConfigError::Csv(_)));
    }

    #[test]
    fn resolve_accepts_names_and_symbols() {
        let list = TickerList::default_us();
        assert_eq!(list.resolve("apple"), "AAPL.US");
        assert_eq!(list.resolve("IBM.US"), "IBM.US");
    }
}
