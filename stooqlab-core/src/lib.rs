//! stooqlab core: daily price cache with historical offset columns.
//!
//! This crate contains:
//! - Domain types (price rows, enriched rows, offset specs)
//! - Offset alignment: nearest trading day to `date - offset`, by binary search
//! - The ticker cache manager: staleness policy, refresh, merge-back
//! - Stores (in-memory and Parquet) and the Stooq provider
//! - Bump screening and change summaries

pub mod analysis;
pub mod clock;
pub mod config;
pub mod data;
pub mod domain;
