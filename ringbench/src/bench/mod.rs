//! Benchmark harnesses.
//!
//! A `Benchmark` runs one trial: it builds fresh queues, launches its
//! workers behind a `RendezvousBarrier`, joins them, checks the message
//! accounting and returns one `BenchmarkResult`.

pub mod latency;
pub mod throughput;

pub use latency::{ LatencyBenchmark, LatencyConfig };
pub use throughput::{ ThroughputBenchmark, ThroughputConfig };

use std::fmt;
use std::thread::ScopedJoinHandle;

use crate::error::{ BenchError, Result };

/// Composite key identifying one benchmark variant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BenchmarkKey {
    pub name: String,
    pub vendor: String,
    pub capacity: usize,
    pub msg_type: String,
    pub producers: usize,
    pub consumers: usize,
}

impl BenchmarkKey {
    pub fn new(
        name: impl Into<String>,
        vendor: impl Into<String>,
        capacity: usize,
        msg_type: impl Into<String>,
        producers: usize,
        consumers: usize
    ) -> Self {
        Self {
            name: name.into(),
            vendor: vendor.into(),
            capacity,
            msg_type: msg_type.into(),
            producers,
            consumers,
        }
    }
}

impl fmt::Display for BenchmarkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} cap={} msg={} {}P/{}C",
            self.name,
            self.vendor,
            self.capacity,
            self.msg_type,
            self.producers,
            self.consumers
        )
    }
}

/// Raw measurement of one trial
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub key: BenchmarkKey,
    /// Messages per second for throughput, nanoseconds per round trip for latency
    pub metric: f64,
    pub total_msg_num: usize,
}

/// How a message reaches the consumers of a throughput run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanOut {
    /// Each message goes to exactly one consumer
    #[default]
    Anycast,
    /// Each message goes to every consumer
    Multicast,
}

/// One benchmark variant. Instances are built fresh for every trial.
pub trait Benchmark {
    fn key(&self) -> BenchmarkKey;

    /// Run one trial over `workload` messages.
    fn run(&mut self, workload: usize) -> Result<BenchmarkResult>;
}

/// Join a scoped worker, turning a panic into `WorkerPanicked`.
pub(crate) fn join_worker<T>(handle: ScopedJoinHandle<'_, T>, role: &'static str) -> Result<T> {
    handle.join().map_err(|_| BenchError::WorkerPanicked { role })
}

/// Reject names that would break a CSV row.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains([',', '\n', '\r', '"']) {
        return Err(crate::config_error!("benchmark name {:?} must be non-empty plain text", name));
    }
    Ok(())
}
