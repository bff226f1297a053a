//! Price data: fetching, alignment, storage, and the ticker cache

pub mod align;
pub mod cache;
pub mod canonicalize;
pub mod parquet_store;
pub mod provider;
pub mod stooq;
pub mod store;
pub mod table;
pub mod universe;

pub use align::{align, AlignError, DateIndex};
pub use cache::{
    normalize_ticker, CacheConfig, CacheError, CacheStatus, RefreshError, RefreshReport,
    Staleness, TickerCacheManager, TickerData,
};
pub use canonicalize::{canonicalize, Canonical};
pub use parquet_store::{ParquetStore, StoreMeta, TickerMeta};
pub use provider::{DataError, LogProgress, NoProgress, PriceProvider, RefreshProgress};
pub use stooq::StooqProvider;
pub use store::{MemoryStore, PriceStore, StoreError};
pub use table::PriceTable;
pub use universe::{TickerEntry, TickerList};
