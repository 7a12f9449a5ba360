//! Performance monitor benchmarks
//!
//! Measures the hot submission path (timer start and complete), the
//! availability check, and dashboard aggregation over a full window.
//!
//! Run with: `cargo bench --bench monitor_bench -p mealwise-core`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use mealwise_core::PerformanceMonitor;
use mealwise_domain::MonitorConfig;

fn bench_submission(c: &mut Criterion) {
    let Ok(monitor) = PerformanceMonitor::new(MonitorConfig::default()) else {
        return;
    };

    let mut group = c.benchmark_group("monitor_submission");

    group.bench_function("timer_complete", |b| {
        b.iter(|| monitor.start_timer("embedding", "ai_inference").complete());
    });

    group.bench_function("timer_fail", |b| {
        b.iter(|| {
            monitor.start_timer("lookup", "nutrition_db").fail("timeout");
            monitor.reset_circuit_breaker("nutrition_db");
        });
    });

    group.bench_function("is_service_available", |b| {
        b.iter(|| black_box(monitor.is_service_available("vector_search")));
    });

    group.finish();
}

fn bench_snapshots(c: &mut Criterion) {
    let Ok(monitor) = PerformanceMonitor::new(MonitorConfig::default()) else {
        return;
    };
    for i in 0..1_000 {
        let service = if i % 2 == 0 { "ai_inference" } else { "vector_search" };
        monitor.start_timer("query_embedding", service).complete();
    }

    c.bench_function("dashboard_data_full_window", |b| {
        b.iter(|| black_box(monitor.dashboard_data()));
    });

    c.bench_function("health_check_full_window", |b| {
        b.iter(|| black_box(monitor.health_check()));
    });
}

criterion_group!(benches, bench_submission, bench_snapshots);
criterion_main!(benches);
