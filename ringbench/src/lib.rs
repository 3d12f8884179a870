//! Batched lock-free SPSC queues and a randomized benchmark engine.
//!
//! - `queue` - `BatchedSpscQueue`, `SimpleSpinSpscQueue` and the adapter traits
//! - `bench` - throughput and round-trip latency harnesses
//! - `scheduler` - randomized trial ordering
//! - `stats` / `report` - percentile summaries and CSV output
//!
//! ```no_run
//! use ringbench::{ ThroughputBenchmark, ThroughputConfig, TrialScheduler };
//! use ringbench::message::{ ConsumeAndStore, ProduceIncremental };
//! use ringbench::queue::BatchedSpsc;
//!
//! # fn main() -> ringbench::Result<()> {
//! let mut scheduler = TrialScheduler::new(100)?;
//! scheduler.register(|| {
//!     let config = ThroughputConfig::new("spsc_u32", 1024)?;
//!     ThroughputBenchmark::<u32, BatchedSpsc, ProduceIncremental<u32>, ConsumeAndStore<u32>>::new(config)
//! })?;
//! let summaries = scheduler.run(1_000_000)?;
//! ringbench::CsvReport::write_all(&mut std::io::stdout(), &summaries)?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod barrier;
pub mod bench;
pub mod constants;
pub mod cpu;
pub mod error;
pub mod message;
pub mod queue;
pub mod report;
pub mod scheduler;
pub mod stats;

pub use backoff::{ Backoff, BusySpin, Pause, Snooze, SpinThenYield };
pub use barrier::{ RendezvousBarrier, Role };
pub use bench::{
    Benchmark,
    BenchmarkKey,
    BenchmarkResult,
    FanOut,
    LatencyBenchmark,
    LatencyConfig,
    ThroughputBenchmark,
    ThroughputConfig,
};
pub use error::{ BenchError, Result };
pub use queue::{ BatchedSpscQueue, QueueAdapter, QueueConfig, QueueConsumer, QueueProducer, SimpleSpinSpscQueue };
pub use report::CsvReport;
pub use scheduler::{ BenchmarkFactory, TrialScheduler };
pub use stats::{ BenchmarkSummary, StatsAggregator };
