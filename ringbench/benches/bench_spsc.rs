//! 1P/1C throughput of every queue vendor with Criterion
//!
//! Same workload through the harness for each adapter, so the numbers
//! include barrier and thread start-up like a real suite run.

use criterion::{ criterion_group, criterion_main, BenchmarkId, Criterion, Throughput };

use ringbench::message::{ ConsumeAndStore, ProduceIncremental };
use ringbench::queue::{ BatchedSpsc, CrossbeamArray, QueueAdapter, SimpleSpinSpsc };
use ringbench::{ Benchmark, ThroughputBenchmark, ThroughputConfig };

const RING_SIZE: usize = 64 * 1024;
const TOTAL_EVENTS: usize = 1_000_000;

fn run_once<Q: QueueAdapter<u64>>() -> usize {
    let config = ThroughputConfig::new("criterion_spsc", RING_SIZE).unwrap();
    let mut bench = ThroughputBenchmark::<u64, Q, ProduceIncremental<u64>, ConsumeAndStore<u64>>::new(config).unwrap();
    bench.run(TOTAL_EVENTS).unwrap().total_msg_num
}

fn benchmark_spsc(c: &mut Criterion) {
    let mut group = c.benchmark_group("SPSC throughput (1M u64)");
    group.throughput(Throughput::Elements(TOTAL_EVENTS as u64));
    group.sample_size(20);

    group.bench_function(BenchmarkId::new("vendor", "batched_spsc"), |b| {
        b.iter(run_once::<BatchedSpsc>)
    });

    group.bench_function(BenchmarkId::new("vendor", "spin_spsc"), |b| {
        b.iter(run_once::<SimpleSpinSpsc>)
    });

    group.bench_function(BenchmarkId::new("vendor", "crossbeam"), |b| {
        b.iter(run_once::<CrossbeamArray>)
    });

    group.finish();
}

criterion_group!(benches, benchmark_spsc);
criterion_main!(benches);
