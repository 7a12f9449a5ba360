//! Circuit breaker benchmarks
//!
//! Benchmarks for the breaker's hot paths: availability checks, outcome
//! recording and guarded execution.
//!
//! Run with: `cargo bench --bench resilience_bench -p mealwise-common
//! --features runtime`

use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use mealwise_common::resilience::{
    CircuitBreaker, CircuitBreakerConfigBuilder, MockClock, ResilienceError,
};

fn bench_circuit_breaker_sync_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit_breaker_sync_paths");

    group.bench_function("can_execute_closed", |b| {
        let breaker = CircuitBreaker::with_defaults();
        b.iter(|| black_box(breaker.can_execute()));
    });

    group.bench_function("call_success", |b| {
        let breaker = CircuitBreaker::with_defaults();
        b.iter(|| {
            let result: Result<_, ResilienceError<std::io::Error>> =
                breaker.call(|| Ok::<_, std::io::Error>(()));
            black_box(result.is_ok())
        });
    });

    group.bench_function("fail_to_open_then_recover", |b| {
        let clock = MockClock::new();
        let breaker = CircuitBreakerConfigBuilder::new()
            .clock(clock.clone())
            .failure_threshold(5)
            .recovery_timeout(Duration::from_secs(30))
            .build();
        let Ok(breaker) = breaker else {
            return;
        };

        b.iter(|| {
            for _ in 0..5 {
                breaker.record_failure();
            }
            clock.advance(Duration::from_secs(30));
            black_box(breaker.can_execute())
        });
    });

    group.finish();
}

fn bench_circuit_breaker_async(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Builder::new_current_thread().enable_all().build() else {
        return;
    };
    let breaker = CircuitBreaker::with_defaults();

    c.bench_function("circuit_breaker_execute_async", |b| {
        b.to_async(&runtime).iter(|| async {
            let result = breaker.execute(|| async { Ok::<_, std::io::Error>(1_u32) }).await;
            black_box(result.is_ok())
        });
    });
}

criterion_group!(benches, bench_circuit_breaker_sync_paths, bench_circuit_breaker_async);
criterion_main!(benches);
