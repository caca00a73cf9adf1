use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use assetbook_core::Money;
use assetbook_depreciation::{
    plan_rebuild, Asset, DepreciationMethod, LedgerSnapshot, PeriodKey, RunContext,
};
use chrono::{NaiveDate, Utc};

fn asset(method: DepreciationMethod, life: u32) -> Asset {
    Asset::new(
        "FA-BENCH",
        method,
        Money::from_major(250_000_000),
        Money::from_major(5_000_000),
    )
    .with_useful_life(life)
    .with_start_date(NaiveDate::from_ymd_opt(2010, 1, 15).unwrap())
}

fn target() -> PeriodKey {
    PeriodKey::new(2040, 12).unwrap()
}

/// Fresh rebuild with no existing records, by schedule length.
fn bench_fresh_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("fresh_rebuild");
    let ctx = RunContext::new(Utc::now());

    for life in [12u32, 60, 120, 360] {
        group.throughput(Throughput::Elements(u64::from(life)));
        group.bench_with_input(BenchmarkId::new("straight_line", life), &life, |b, &life| {
            let snap = LedgerSnapshot::new(asset(DepreciationMethod::StraightLine, life), vec![]);
            b.iter(|| plan_rebuild(black_box(&snap), target(), &ctx).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("double_declining", life), &life, |b, &life| {
            let snap = LedgerSnapshot::new(asset(DepreciationMethod::DoubleDeclining, life), vec![]);
            b.iter(|| plan_rebuild(black_box(&snap), target(), &ctx).unwrap());
        });
    }

    group.finish();
}

/// Rebuild over a fully persisted history, the common steady-state run.
fn bench_rebuild_over_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild_over_history");
    let ctx = RunContext::new(Utc::now());

    for life in [60u32, 360] {
        let fresh = asset(DepreciationMethod::SumOfYearsDigits, life);
        let first = plan_rebuild(&LedgerSnapshot::new(fresh.clone(), vec![]), target(), &ctx).unwrap();
        let snap = LedgerSnapshot::new(
            fresh.with_accumulated(first.final_state.accumulated),
            first.records,
        );

        group.throughput(Throughput::Elements(u64::from(life)));
        group.bench_with_input(BenchmarkId::new("sum_of_years_digits", life), &snap, |b, snap| {
            b.iter(|| plan_rebuild(black_box(snap), target(), &ctx).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fresh_rebuild, bench_rebuild_over_history);
criterion_main!(benches);
