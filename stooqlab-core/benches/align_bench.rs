//! Criterion benchmarks for the cache hot paths.
//!
//! Benchmarks:
//! 1. Offset alignment over ~30 years of business days
//! 2. Nearest-date lookup on a prebuilt index
//! 3. Batch merge of refreshed rows into a populated table

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stooqlab_core::data::{align, DateIndex, PriceTable};
use stooqlab_core::domain::{OffsetSpec, PriceRow};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_business_days(ticker: &str, n: usize) -> Vec<PriceRow> {
    let mut date = NaiveDate::from_ymd_opt(1995, 1, 2).unwrap();
    let mut rows = Vec::with_capacity(n);
    while rows.len() < n {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            let close = 100.0 + (rows.len() as f64 * 0.1).sin() * 10.0;
            rows.push(PriceRow {
                ticker: ticker.to_string(),
                date,
                open: close - 0.3,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1_000_000.0,
            });
        }
        date += Duration::days(1);
    }
    rows
}

// ── 1. Alignment ─────────────────────────────────────────────────────

fn bench_align(c: &mut Criterion) {
    let offsets = OffsetSpec::defaults();
    let mut group = c.benchmark_group("align");

    for n in [1_260, 7_500] {
        let history = make_business_days("BENCH.US", n);
        group.bench_with_input(BenchmarkId::new("default_offsets", n), &history, |b, h| {
            b.iter(|| align(black_box(h), black_box(&offsets)))
        });
    }

    group.finish();
}

// ── 2. Lookup ────────────────────────────────────────────────────────

fn bench_nearest(c: &mut Criterion) {
    let history = make_business_days("BENCH.US", 7_500);
    let index = DateIndex::new(&history);
    let targets: Vec<NaiveDate> = history.iter().map(|r| r.date - Duration::days(365)).collect();

    c.bench_function("nearest_7500", |b| {
        b.iter(|| {
            targets
                .iter()
                .filter_map(|t| index.nearest(black_box(*t)))
                .count()
        })
    });
}

// ── 3. Merge ─────────────────────────────────────────────────────────

fn bench_merge(c: &mut Criterion) {
    let offsets = OffsetSpec::defaults();
    let cached: Vec<_> = (0..20)
        .flat_map(|i| align(&make_business_days(&format!("T{i}.US"), 2_500), &offsets).unwrap())
        .collect();
    let fresh = align(&make_business_days("T0.US", 2_520), &offsets).unwrap();

    c.bench_function("upsert_one_ticker_into_20", |b| {
        b.iter(|| {
            let mut table = PriceTable::from_rows(cached.clone());
            table.upsert(black_box(fresh.clone()));
            table.len()
        })
    });
}

criterion_group!(benches, bench_align, bench_nearest, bench_merge);
criterion_main!(benches);
