//! Benchmarks for confpush
//!
//! 1. Configuration diffing (replace and merge) over growing configurations
//! 2. Full transactions against the in-memory mock device
//! 3. Concurrent transactions across many devices

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures::stream::{self, StreamExt};
use tokio::runtime::Runtime;

use confpush::session::common::{config_commands, merge_config_diff, unified_config_diff};
use confpush::session::MockDevice;
use confpush::transaction::{run_transaction, CandidateConfig, LoadMode, RunIntent};

// ============================================================================
// DATA GENERATORS
// ============================================================================

/// Interface-style configuration with `lines` statements
fn generate_config(lines: usize, seed: usize) -> String {
    let mut config = String::with_capacity(lines * 32);
    config.push_str("hostname bench\n");
    for i in 0..lines {
        config.push_str(&format!(
            "interface Ethernet{}\n description uplink-{}\n",
            i,
            (i + seed) % 7
        ));
    }
    config
}

// ============================================================================
// DIFF BENCHMARKS
// ============================================================================

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_diff");

    for size in [10usize, 100, 1000] {
        let running = generate_config(size, 0);
        let candidate = generate_config(size, 1);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("unified", size), &size, |b, _| {
            b.iter(|| unified_config_diff(black_box(&running), black_box(&candidate)))
        });
        group.bench_with_input(BenchmarkId::new("merge", size), &size, |b, _| {
            b.iter(|| merge_config_diff(black_box(&running), black_box(&candidate)))
        });
        group.bench_with_input(BenchmarkId::new("commands", size), &size, |b, _| {
            b.iter(|| config_commands(black_box(&running), black_box(&candidate), true))
        });
    }

    group.finish();
}

// ============================================================================
// TRANSACTION BENCHMARKS
// ============================================================================

fn bench_transaction(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("transaction");

    let running = generate_config(100, 0);
    let candidate = CandidateConfig::new(generate_config(100, 1), LoadMode::Replace);

    for (name, intent) in [
        ("commit", RunIntent::new(false, true, true)),
        ("check_mode", RunIntent::new(true, true, true)),
        ("no_diffs", RunIntent::new(false, true, false)),
    ] {
        group.bench_function(name, |b| {
            b.to_async(&rt).iter(|| async {
                let device = MockDevice::new(running.clone());
                run_transaction(Box::new(device.session("bench")), &candidate, &intent)
                    .await
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_parallel_devices(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("parallel_devices");

    let running = generate_config(50, 0);
    let candidate = CandidateConfig::new(generate_config(50, 1), LoadMode::Merge);
    let intent = RunIntent::new(false, true, true);

    for devices in [10usize, 100] {
        group.throughput(Throughput::Elements(devices as u64));
        group.bench_with_input(BenchmarkId::new("forks_10", devices), &devices, |b, &n| {
            b.to_async(&rt).iter(|| async {
                stream::iter(0..n)
                    .map(|i| {
                        let device = MockDevice::new(running.clone());
                        let candidate = &candidate;
                        let intent = &intent;
                        async move {
                            run_transaction(
                                Box::new(device.session(format!("r{}", i))),
                                candidate,
                                intent,
                            )
                            .await
                        }
                    })
                    .buffer_unordered(10)
                    .collect::<Vec<_>>()
                    .await
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_diff, bench_transaction, bench_parallel_devices);
criterion_main!(benches);
