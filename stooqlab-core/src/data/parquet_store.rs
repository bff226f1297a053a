//! Parquet-backed price store.
//!
//! Layout: one Parquet file holding every ticker, plus a JSON sidecar
//! `{file}.meta.json` with per-ticker date ranges and a content hash.
//!
//! - Writes are atomic (write to .tmp, rename into place); the sidecar is
//!   staged with the table and dropped if it cannot follow it
//! - Single-ticker reads use a lazy scan with a ticker predicate
//! - A missing file reads as an empty table

use super::store::{PriceStore, StoreError};
use super::table::PriceTable;
use crate::domain::{spec_name_from_column, EnrichedRow, OffsetClose, PriceRow};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const BASE_COLUMNS: [&str; 7] = ["ticker", "date", "open", "high", "low", "close", "volume"];

/// Comma-separated offset names each row was aligned with. Separates an
/// offset with no match (null in a listed column) from one never computed.
const COMPUTED_OFFSETS_COLUMN: &str = "computed_offsets";

/// Metadata sidecar describing the last successful write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub row_count: usize,
    pub data_hash: String,
    pub written_at: NaiveDateTime,
    pub tickers: Vec<TickerMeta>,
}

/// Per-ticker summary inside [`StoreMeta`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerMeta {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub row_count: usize,
}

pub struct ParquetStore {
    path: PathBuf,
}

impl ParquetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the Parquet file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn meta_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".meta.json");
        PathBuf::from(name)
    }

    /// Metadata of the last write, if any.
    pub fn meta(&self) -> Option<StoreMeta> {
        let content = fs::read_to_string(self.meta_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Sidecar JSON describing `table`.
    fn meta_json(table: &PriceTable) -> Result<String, StoreError> {
        let tickers = table
            .tickers()
            .into_iter()
            .filter_map(|ticker| {
                let rows = table.ticker_rows(&ticker);
                Some(TickerMeta {
                    start_date: rows.first()?.date(),
                    end_date: rows.last()?.date(),
                    row_count: rows.len(),
                    ticker,
                })
            })
            .collect();

        let rows: Vec<&EnrichedRow> = table.iter().collect();
        let encoded = serde_json::to_vec(&rows)
            .map_err(|e| StoreError::Metadata(format!("hash serialization: {e}")))?;

        let meta = StoreMeta {
            row_count: rows.len(),
            data_hash: blake3::hash(&encoded).to_hex().to_string(),
            written_at: chrono::Local::now().naive_local(),
            tickers,
        };
        serde_json::to_string_pretty(&meta)
            .map_err(|e| StoreError::Metadata(format!("meta serialization: {e}")))
    }
}

impl PriceStore for ParquetStore {
    fn read_all(&self) -> Result<Vec<EnrichedRow>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| StoreError::Parquet(format!("read: {e}")))?;

        dataframe_to_rows(&df)
    }

    fn read_for_ticker(&self, ticker: &str) -> Result<Vec<EnrichedRow>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let df = LazyFrame::scan_parquet(&self.path, Default::default())
            .map_err(|e| StoreError::Parquet(format!("scan: {e}")))?
            .filter(col("ticker").eq(lit(ticker)))
            .sort(["date"], SortMultipleOptions::default())
            .collect()
            .map_err(|e| StoreError::Parquet(format!("filtered read: {e}")))?;

        dataframe_to_rows(&df)
    }

    fn write_all(&self, rows: &[EnrichedRow]) -> Result<(), StoreError> {
        let table = PriceTable::from_rows(rows.iter().cloned());
        let mut df = table_to_dataframe(&table)?;
        let meta_json = Self::meta_json(&table)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("parquet.tmp");
        let meta_path = self.meta_path();
        let meta_tmp_path = meta_path.with_extension("json.tmp");

        // Stage both files. Nothing visible changes until the table rename.
        let file = fs::File::create(&tmp_path)?;
        if let Err(e) = ParquetWriter::new(file).finish(&mut df) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Parquet(format!("write: {e}")));
        }
        if let Err(e) = fs::write(&meta_tmp_path, meta_json) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Io(e));
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            let _ = fs::remove_file(&meta_tmp_path);
            return Err(StoreError::Io(e));
        }

        // The table is committed. A sidecar that cannot be replaced is
        // removed so it never describes an older table.
        if let Err(error) = fs::rename(&meta_tmp_path, &meta_path) {
            let _ = fs::remove_file(&meta_tmp_path);
            let _ = fs::remove_file(&meta_path);
            tracing::warn!(
                path = %meta_path.display(),
                %error,
                "could not update store metadata"
            );
        }

        tracing::debug!(
            path = %self.path.display(),
            rows = table.len(),
            "wrote price table"
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        for path in [self.path.clone(), self.meta_path()] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        tracing::info!(path = %self.path.display(), "cleared price store");
        Ok(())
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    // chrono's default date is 1970-01-01.
    NaiveDate::default()
}

/// Offset names across all rows, in order of first appearance.
fn offset_names(table: &PriceTable) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for row in table.iter() {
        for offset in &row.offsets {
            if !names.contains(&offset.name) {
                names.push(offset.name.clone());
            }
        }
    }
    names
}

/// Convert the table to a Polars DataFrame.
fn table_to_dataframe(table: &PriceTable) -> Result<DataFrame, StoreError> {
    let rows: Vec<&EnrichedRow> = table.iter().collect();
    let epoch = epoch();

    let tickers: Vec<&str> = rows.iter().map(|r| r.ticker()).collect();
    let dates: Vec<i32> = rows
        .iter()
        .map(|r| (r.date() - epoch).num_days() as i32)
        .collect();
    let opens: Vec<f64> = rows.iter().map(|r| r.row.open).collect();
    let highs: Vec<f64> = rows.iter().map(|r| r.row.high).collect();
    let lows: Vec<f64> = rows.iter().map(|r| r.row.low).collect();
    let closes: Vec<f64> = rows.iter().map(|r| r.row.close).collect();
    let volumes: Vec<f64> = rows.iter().map(|r| r.row.volume).collect();
    let computed: Vec<String> = rows
        .iter()
        .map(|r| {
            r.offsets
                .iter()
                .map(|o| o.name.as_str())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();

    let mut columns = vec![
        Column::new("ticker".into(), tickers),
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| StoreError::Parquet(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new(COMPUTED_OFFSETS_COLUMN.into(), computed),
    ];

    for name in offset_names(table) {
        let values: Vec<Option<f64>> = rows.iter().map(|r| r.offset(&name)).collect();
        columns.push(Column::new(format!("offset_{name}").into(), values));
    }

    DataFrame::new(columns).map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

/// Convert a DataFrame back to enriched rows.
fn dataframe_to_rows(df: &DataFrame) -> Result<Vec<EnrichedRow>, StoreError> {
    for name in BASE_COLUMNS {
        if df.column(name).is_err() {
            return Err(StoreError::Schema(format!("missing column '{name}'")));
        }
    }

    let type_err = |name: &str, e: PolarsError| StoreError::Schema(format!("{name} column type: {e}"));
    let column = |name: &str| {
        df.column(name)
            .map_err(|e| StoreError::Schema(format!("column {name}: {e}")))
    };

    let ticker_ca = column("ticker")?.str().map_err(|e| type_err("ticker", e))?;
    let date_ca = column("date")?.date().map_err(|e| type_err("date", e))?;
    let open_ca = column("open")?.f64().map_err(|e| type_err("open", e))?;
    let high_ca = column("high")?.f64().map_err(|e| type_err("high", e))?;
    let low_ca = column("low")?.f64().map_err(|e| type_err("low", e))?;
    let close_ca = column("close")?.f64().map_err(|e| type_err("close", e))?;
    let volume_ca = column("volume")?.f64().map_err(|e| type_err("volume", e))?;

    let mut offset_cols = Vec::new();
    for name in df.get_column_names() {
        if let Some(spec) = spec_name_from_column(name.as_str()) {
            let ca = column(name.as_str())?
                .f64()
                .map_err(|e| type_err(name.as_str(), e))?;
            offset_cols.push((spec.to_string(), ca));
        }
    }
    // Files without the column carry every offset column on every row.
    let computed_ca = match df.column(COMPUTED_OFFSETS_COLUMN) {
        Ok(c) => Some(c.str().map_err(|e| type_err(COMPUTED_OFFSETS_COLUMN, e))?),
        Err(_) => None,
    };

    let epoch = epoch();
    let n = df.height();
    let mut rows = Vec::with_capacity(n);

    for i in 0..n {
        let ticker = ticker_ca
            .get(i)
            .ok_or_else(|| StoreError::Schema(format!("null ticker at row {i}")))?;
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| StoreError::Schema(format!("null date at row {i}")))?;

        rows.push(EnrichedRow {
            row: PriceRow {
                ticker: ticker.to_string(),
                date: epoch + chrono::Duration::days(i64::from(date_days)),
                open: open_ca.get(i).unwrap_or(f64::NAN),
                high: high_ca.get(i).unwrap_or(f64::NAN),
                low: low_ca.get(i).unwrap_or(f64::NAN),
                close: close_ca.get(i).unwrap_or(f64::NAN),
                volume: volume_ca.get(i).unwrap_or(0.0),
            },
            offsets: match computed_ca.and_then(|ca| ca.get(i)) {
                Some(names) => names
                    .split(',')
                    .filter(|name| !name.is_empty())
                    .map(|name| OffsetClose {
                        name: name.to_string(),
                        close: offset_cols
                            .iter()
                            .find(|(col, _)| col == name)
                            .and_then(|(_, ca)| ca.get(i)),
                    })
                    .collect(),
                None => offset_cols
                    .iter()
                    .map(|(name, ca)| OffsetClose {
                        name: name.clone(),
                        close: ca.get(i),
                    })
                    .collect(),
            },
        });
    }

    Ok(rows)
}
