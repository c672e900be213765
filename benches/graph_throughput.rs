//! Benchmarks for graph scheduling overhead

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use veda_dag::prelude::*;

fn independent_invokes(c: &mut Criterion) {
    let executor = Executor::with_threads(4).unwrap();
    let mut group = c.benchmark_group("independent_invokes");

    for count in [100, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let futures: Vec<_> = (0..count)
                    .map(|i| executor.invoke(move || Ok(black_box(i * 2))))
                    .collect();
                for future in &futures {
                    future.wait();
                }
            });
        });
    }

    group.finish();
}

fn dependency_chain(c: &mut Criterion) {
    let executor = Executor::with_threads(4).unwrap();
    let mut group = c.benchmark_group("dependency_chain");

    for length in [10, 100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(length), length, |b, &length| {
            b.iter(|| {
                let mut last = executor.invoke(|| Ok(0u64));
                for _ in 0..length {
                    let input = last.clone();
                    last = executor.then(&last, move || Ok(input.get()? + 1));
                }
                black_box(last.get().unwrap())
            });
        });
    }

    group.finish();
}

fn fan_in(c: &mut Criterion) {
    let executor = Executor::with_threads(4).unwrap();

    c.bench_function("when_all_1k", |b| {
        b.iter(|| {
            let inputs: Vec<Arc<Future<u64>>> =
                (0..1_000u64).map(|i| executor.invoke(move || Ok(i))).collect();
            black_box(executor.when_all(inputs).get().unwrap())
        });
    });

    c.bench_function("when_first_1k", |b| {
        b.iter(|| {
            let inputs: Vec<Arc<Future<u64>>> =
                (0..1_000u64).map(|i| executor.invoke(move || Ok(i))).collect();
            black_box(executor.when_first(inputs).get().unwrap())
        });
    });
}

criterion_group!(benches, independent_invokes, dependency_chain, fan_in);
criterion_main!(benches);
