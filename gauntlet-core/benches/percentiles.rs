// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Statistics engine microbenchmarks.
//!
//! Percentile extraction runs once per completed phase over potentially
//! large measurement series; this tracks its cost at various sample counts.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use gauntlet_core::{iqr, percentile};

/// Sample counts to test.
const SAMPLE_COUNTS: &[usize] = &[100, 10_000, 1_000_000];

fn make_samples(n: usize) -> Vec<Duration> {
    // Deterministic spread: latencies cycle through 1..=997 ms.
    (0..n)
        .map(|i| Duration::from_millis((i % 997 + 1) as u64))
        .collect()
}

fn bench_percentile(c: &mut Criterion) {
    let mut group = c.benchmark_group("percentile_nearest_rank");

    for &count in SAMPLE_COUNTS {
        let samples = make_samples(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &samples, |b, samples| {
            b.iter(|| {
                let p50 = percentile(samples, 50);
                let p95 = percentile(samples, 95);
                (p50, p95)
            });
        });
    }

    group.finish();
}

fn bench_iqr(c: &mut Criterion) {
    let mut group = c.benchmark_group("iqr");

    for &count in SAMPLE_COUNTS {
        let samples = make_samples(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &samples, |b, samples| {
            b.iter(|| iqr(samples));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_percentile, bench_iqr);
criterion_main!(benches);
