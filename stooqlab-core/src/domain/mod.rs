//! Domain types for stooqlab

pub mod offset;
pub mod price;

pub use offset::{spec_name_from_column, OffsetSpec, OFFSET_COLUMN_PREFIX};
pub use price::{EnrichedRow, OffsetClose, PriceRow};
