//! Analyses over enriched rows: bump screening and change summaries.

pub mod bump;
pub mod change;

pub use bump::{find_bumps, Bump, BumpFilter};
pub use change::{summarize, window, ChangeSummary, ChartWindow, OffsetChange};
