//! Settings file.
//!
//! Every field is optional in TOML; missing fields take the defaults below.
//!
//! ```toml
//! store_path = "/var/lib/stooqlab/ticker.parquet"
//! invalidation_ttl_days = 5
//! ticker_list_path = "tickers.csv"
//! fetch_concurrency = 4
//!
//! [[offsets]]
//! name = "one"
//! years = 1
//! ```

use crate::data::cache::CacheConfig;
use crate::data::universe::TickerList;
use crate::domain::OffsetSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid ticker CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("ticker list is empty")]
    EmptyTickerList,

    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Parquet file holding the enriched price table.
    pub store_path: PathBuf,
    /// How many days the latest cached row may lag today before a refetch.
    pub invalidation_ttl_days: u32,
    /// CSV ticker list; the built-in list is used when unset.
    pub ticker_list_path: Option<PathBuf>,
    /// Offset columns to compute.
    pub offsets: Vec<OffsetSpec>,
    /// Concurrent fetches during a batch refresh.
    pub fetch_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            invalidation_ttl_days: 5,
            ticker_list_path: None,
            offsets: OffsetSpec::defaults(),
            fetch_concurrency: 4,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_concurrency == 0 {
            return Err(ConfigError::Invalid("fetch_concurrency must be at least 1".into()));
        }
        for (i, spec) in self.offsets.iter().enumerate() {
            if spec.name.is_empty() {
                return Err(ConfigError::Invalid(format!("offset #{i} has an empty name")));
            }
            if spec.name.contains(',') {
                return Err(ConfigError::Invalid(format!(
                    "offset name '{}' must not contain a comma",
                    spec.name
                )));
            }
            if spec.years == 0 && spec.months == 0 && spec.days == 0 {
                return Err(ConfigError::Invalid(format!(
                    "offset '{}' has zero length",
                    spec.name
                )));
            }
            if self.offsets[..i].iter().any(|other| other.name == spec.name) {
                return Err(ConfigError::Invalid(format!(
                    "offset '{}' is defined twice",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    /// The configured ticker list, or the built-in one.
    pub fn ticker_list(&self) -> Result<TickerList, ConfigError> {
        match &self.ticker_list_path {
            Some(path) => TickerList::from_csv_file(path),
            None => Ok(TickerList::default_us()),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            offsets: self.offsets.clone(),
            fetch_concurrency: self.fetch_concurrency,
        }
    }
}

/// `<state dir>/stooqlab/data/ticker.parquet`, with `~/.local/state` as the
/// state dir on platforms that lack one.
pub fn default_store_path() -> PathBuf {
    let state_dir = dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
        .unwrap_or_else(|| PathBuf::from("."));
    state_dir.join("stooqlab/data/ticker.parquet")
}
