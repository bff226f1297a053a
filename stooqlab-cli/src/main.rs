//! stooqlab CLI: refresh, show, bump, and cache management commands.
//!
//! Commands:
//! - `refresh`: bring every ticker of the list up to date
//! - `show`: one ticker's latest close and change against each offset
//! - `bump`: refresh, then list tickers that multiplied in value
//! - `status`: report what the store holds
//! - `clean`: wipe the store

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use stooqlab_core::analysis::{find_bumps, summarize, window, BumpFilter, ChartWindow};
use stooqlab_core::config::Settings;
use stooqlab_core::data::{
    CacheStatus, LogProgress, ParquetStore, PriceStore, StooqProvider, TickerCacheManager,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stooqlab",
    about = "stooqlab: cached daily prices from Stooq with historical offsets"
)]
struct Cli {
    /// Settings TOML file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ticker list CSV (display_name,ticker_name). Overrides the settings file.
    #[arg(long, global = true)]
    from_csv_file: Option<PathBuf>,

    /// Parquet store path. Overrides the settings file.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Days the latest cached row may lag today before a refetch.
    #[arg(long, global = true)]
    ttl_days: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh every stale ticker of the list.
    Refresh,
    /// Show one ticker's latest close and offset changes.
    Show {
        /// Ticker symbol (e.g. AAPL.US) or display name from the list.
        ticker: String,

        /// Chart window in years. Defaults to the full history.
        #[arg(long)]
        years: Option<u32>,
    },
    /// Refresh, then list tickers whose close multiplied over an offset.
    Bump {
        /// Ignore rows and origins up to this year.
        #[arg(long, default_value_t = 2020)]
        cutoff_year: i32,

        /// Minimum growth multiple.
        #[arg(long, default_value_t = 4.0)]
        factor: f64,
    },
    /// Report store contents from the metadata sidecar.
    Status,
    /// Delete the store and its metadata.
    Clean,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    match cli.command {
        Commands::Refresh => run_refresh(&settings),
        Commands::Show { ticker, years } => run_show(&settings, &ticker, years),
        Commands::Bump {
            cutoff_year,
            factor,
        } => run_bump(&settings, cutoff_year, factor),
        Commands::Status => run_status(&settings),
        Commands::Clean => run_clean(&settings),
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    if let Some(path) = &cli.from_csv_file {
        settings.ticker_list_path = Some(path.clone());
    }
    if let Some(path) = &cli.store {
        settings.store_path = path.clone();
    }
    if let Some(ttl) = cli.ttl_days {
        settings.invalidation_ttl_days = ttl;
    }
    tracing::debug!(?settings, "settings loaded");
    Ok(settings)
}

fn build_manager(settings: &Settings) -> Result<TickerCacheManager> {
    let store = Arc::new(ParquetStore::new(&settings.store_path));
    let provider = Arc::new(StooqProvider::new().context("failed to build HTTP client")?);
    Ok(TickerCacheManager::new(store, provider, settings.cache_config()))
}

fn run_refresh(settings: &Settings) -> Result<()> {
    let list = settings.ticker_list()?;
    let manager = build_manager(settings)?;
    let tickers = list.ticker_names();

    let report =
        manager.refresh_many_with_progress(&tickers, settings.invalidation_ttl_days, &LogProgress)?;

    println!(
        "Refreshed {}, fresh {}, failed {}",
        report.refreshed.len(),
        report.skipped.len(),
        report.failed.len()
    );

    if !report.all_succeeded() {
        for (ticker, err) in &report.failed {
            eprintln!("Error for {ticker}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_show(settings: &Settings, name: &str, years: Option<u32>) -> Result<()> {
    let list = settings.ticker_list()?;
    let ticker = list.resolve(name);
    let manager = build_manager(settings)?;

    let data = manager.get_ticker_data(ticker, settings.invalidation_ttl_days)?;
    if let CacheStatus::Degraded { error } = &data.status {
        println!("WARNING: showing cached data, refresh failed: {error}");
    }

    let Some(summary) = summarize(&data.rows) else {
        bail!("no rows for {ticker}");
    };

    let chart = years.map_or(ChartWindow::Max, ChartWindow::Years);
    let shown = window(&data.rows, chart);

    println!();
    println!("=== {} ===", summary.ticker);
    println!("Date:        {}", summary.date);
    println!("Close:       {:.2}", summary.close);
    println!(
        "History:     {} rows ({} shown for {})",
        data.rows.len(),
        shown.len(),
        chart.label()
    );
    println!();
    println!("{:<10} {:>12}", "Offset", "Change");
    println!("{}", "-".repeat(23));
    for change in &summary.changes {
        match change.change {
            Some(value) => println!("{:<10} {:>12.2}", change.name, value),
            None => println!("{:<10} {:>12}", change.name, "n/a"),
        }
    }
    println!("{:<10} {:>12.2}", "max", summary.max_change);

    Ok(())
}

fn run_bump(settings: &Settings, cutoff_year: i32, factor: f64) -> Result<()> {
    if factor <= 1.0 {
        bail!("--factor must be greater than 1, got {factor}");
    }

    let list = settings.ticker_list()?;
    let manager = build_manager(settings)?;
    let tickers = list.ticker_names();

    let report =
        manager.refresh_many_with_progress(&tickers, settings.invalidation_ttl_days, &LogProgress)?;
    for (ticker, err) in &report.failed {
        eprintln!("WARNING: {ticker} not refreshed: {err}");
    }

    let filter = BumpFilter {
        cutoff_year,
        bump_factor: factor,
        ..BumpFilter::default()
    };
    let bumps = find_bumps(&report.rows, &filter);

    if bumps.is_empty() {
        println!("No ticker grew more than {factor}x after {cutoff_year}.");
        return Ok(());
    }

    println!(
        "{:<10} {:<7} {:<11} {:>10} {:<11} {:>10} {:>8} {:>10}",
        "Ticker", "Offset", "Date", "Close", "Origin", "Origin $", "Bump", "Current"
    );
    println!("{}", "-".repeat(84));
    for b in &bumps {
        println!(
            "{:<10} {:<7} {:<11} {:>10.2} {:<11} {:>10.2} {:>7.1}x {:>10.2}",
            b.ticker,
            b.offset,
            b.date.to_string(),
            b.close,
            b.origin_date.to_string(),
            b.origin_value,
            b.bump + 1.0,
            b.current_value
        );
    }

    Ok(())
}

fn run_status(settings: &Settings) -> Result<()> {
    let store = ParquetStore::new(&settings.store_path);
    let Some(meta) = store.meta() else {
        println!("Store is empty: {}", store.path().display());
        return Ok(());
    };

    println!("Store: {}", store.path().display());
    println!("Written: {}", meta.written_at.format("%Y-%m-%d %H:%M:%S"));
    println!("Rows: {}", meta.row_count);
    println!("Hash: {}", meta.data_hash);
    println!();
    println!("{:<10} {:<25} {:>8}", "Ticker", "Date Range", "Rows");
    println!("{}", "-".repeat(45));
    for t in &meta.tickers {
        println!(
            "{:<10} {:<25} {:>8}",
            t.ticker,
            format!("{} to {}", t.start_date, t.end_date),
            t.row_count
        );
    }

    Ok(())
}

fn run_clean(settings: &Settings) -> Result<()> {
    let store = ParquetStore::new(&settings.store_path);
    store.clear()?;
    println!("Removed: {}", store.path().display());
    Ok(())
}
