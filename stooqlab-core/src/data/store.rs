//! Store abstraction for enriched price rows.
//!
//! The logical contract is a single table keyed by (ticker, date) that is
//! always written whole. Implementations may read a single ticker without
//! materializing the full table.

use super::table::PriceTable;
use crate::domain::EnrichedRow;
use std::sync::Mutex;
use thiserror::Error;

/// Persistence failures. A failed write leaves the previous table intact.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("metadata error: {0}")]
    Metadata(String),
}

/// Whole-table store of enriched rows.
pub trait PriceStore: Send + Sync {
    /// Every stored row, ordered by (ticker, date). Empty if nothing is stored.
    fn read_all(&self) -> Result<Vec<EnrichedRow>, StoreError>;

    /// Rows for one ticker, ascending by date. Empty if absent.
    fn read_for_ticker(&self, ticker: &str) -> Result<Vec<EnrichedRow>, StoreError> {
        Ok(PriceTable::from_rows(self.read_all()?).ticker_rows(ticker))
    }

    /// Replace the whole table with `rows`. All or nothing.
    fn write_all(&self, rows: &[EnrichedRow]) -> Result<(), StoreError>;

    /// Wipe the store.
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-process store backed by a keyed table.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<PriceTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<EnrichedRow>) -> Self {
        Self {
            table: Mutex::new(PriceTable::from_rows(rows)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PriceTable> {
        // Writes swap in a fully built table, so a poisoned lock still holds
        // a consistent one.
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PriceStore for MemoryStore {
    fn read_all(&self) -> Result<Vec<EnrichedRow>, StoreError> {
        Ok(self.lock().iter().cloned().collect())
    }

    fn read_for_ticker(&self, ticker: &str) -> Result<Vec<EnrichedRow>, StoreError> {
        Ok(self.lock().ticker_rows(ticker))
    }

    fn write_all(&self, rows: &[EnrichedRow]) -> Result<(), StoreError> {
        let table = PriceTable::from_rows(rows.iter().cloned());
        *self.lock() = table;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.lock() = PriceTable::new();
        Ok(())
    }
}
