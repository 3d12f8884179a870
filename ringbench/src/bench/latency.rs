//! Round-trip latency harness.
//!
//! `threads` A workers send into the A->B queue and wait for replies on the
//! B->A queue; `threads` B workers echo every message they receive. Only A
//! worker 0 sends the bootstrap message, so a single message circulates
//! before any reply loop exists. The metric is elapsed nanoseconds divided
//! by completed round trips.

use std::marker::PhantomData;
use std::thread;
use std::time::Instant;

use tracing::debug;

use super::{ join_worker, validate_name, Benchmark, BenchmarkKey, BenchmarkResult };
use crate::backoff::SpinThenYield;
use crate::barrier::{ RendezvousBarrier, Role };
use crate::cpu;
use crate::error::{ BenchError, Result };
use crate::message::{ type_label, Message, MessageConsumer, MessageCreator };
use crate::queue::{ validate_capacity, QueueAdapter, QueueConsumer, QueueProducer };

const A_ROLE: &str = "initiator";
const B_ROLE: &str = "echo";

#[derive(Debug, Clone)]
pub struct LatencyConfig {
    pub name: String,
    pub capacity: usize,
    /// Workers per side
    pub threads: usize,
    pub a_cores: Vec<usize>,
    pub b_cores: Vec<usize>,
}

impl LatencyConfig {
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        validate_capacity(capacity)?;
        Ok(Self {
            name,
            capacity,
            threads: 1,
            a_cores: Vec::new(),
            b_cores: Vec::new(),
        })
    }

    pub fn with_threads(mut self, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(crate::config_error!("latency run needs at least one thread per side"));
        }
        self.threads = threads;
        Ok(self)
    }

    pub fn with_a_cores(mut self, cores: Vec<usize>) -> Result<Self> {
        cpu::validate_cores(&cores)?;
        self.a_cores = cores;
        Ok(self)
    }

    pub fn with_b_cores(mut self, cores: Vec<usize>) -> Result<Self> {
        cpu::validate_cores(&cores)?;
        self.b_cores = cores;
        Ok(self)
    }
}

pub struct LatencyBenchmark<T, Q, MC, MS> {
    config: LatencyConfig,
    key: BenchmarkKey,
    _marker: PhantomData<fn() -> (T, Q, MC, MS)>,
}

impl<T, Q, MC, MS> LatencyBenchmark<T, Q, MC, MS>
    where T: Message, Q: QueueAdapter<T>, MC: MessageCreator<T>, MS: MessageConsumer<T>
{
    pub fn new(config: LatencyConfig) -> Result<Self> {
        if !Q::supports(config.threads, config.threads) {
            return Err(
                crate::config_error!("{} cannot serve {} threads per side", Q::VENDOR, config.threads)
            );
        }
        let key = BenchmarkKey::new(
            config.name.clone(),
            Q::VENDOR,
            config.capacity,
            type_label::<T>(),
            config.threads,
            config.threads
        );
        Ok(Self {
            config,
            key,
            _marker: PhantomData,
        })
    }

    pub fn config(&self) -> &LatencyConfig {
        &self.config
    }
}

/// Initiator loop. Returns completed round trips.
fn run_initiator<T, P, C, MC, MS>(idx: usize, rounds: usize, to_b: &mut P, from_b: &mut C, creator: &mut MC, sink: &mut MS) -> usize
    where T: Message, P: QueueProducer<T>, C: QueueConsumer<T>, MC: MessageCreator<T>, MS: MessageConsumer<T>
{
    let mut completed = 0;
    loop {
        if completed > 0 || idx == 0 {
            to_b.produce(creator.next());
        }
        if completed == rounds {
            break;
        }
        let reply = from_b.consume();
        sink.consume(&reply);
        completed += 1;
    }
    completed
}

/// Echo loop. Returns replies sent.
fn run_echo<T, P, C, MC, MS>(rounds: usize, to_a: &mut P, from_a: &mut C, creator: &mut MC, sink: &mut MS) -> usize
    where T: Message, P: QueueProducer<T>, C: QueueConsumer<T>, MC: MessageCreator<T>, MS: MessageConsumer<T>
{
    for _ in 0..rounds {
        let request = from_a.consume();
        sink.consume(&request);
        to_a.produce(creator.next());
    }
    rounds
}

impl<T, Q, MC, MS> Benchmark
    for LatencyBenchmark<T, Q, MC, MS>
    where T: Message, Q: QueueAdapter<T>, MC: MessageCreator<T>, MS: MessageConsumer<T>
{
    fn key(&self) -> BenchmarkKey {
        self.key.clone()
    }

    fn run(&mut self, workload: usize) -> Result<BenchmarkResult> {
        let threads = self.config.threads;
        let rounds = workload / threads;
        if rounds == 0 {
            return Err(crate::config_error!("workload {} is smaller than {} threads", workload, threads));
        }

        let a_to_b = Q::endpoints(self.config.capacity, threads, threads)?;
        let b_to_a = Q::endpoints(self.config.capacity, threads, threads)?;
        debug!(benchmark = %self.key, workload, rounds, "latency trial starting");

        let barrier = RendezvousBarrier::<SpinThenYield>::new(threads, threads);
        let a_cores = &self.config.a_cores;
        let b_cores = &self.config.b_cores;

        let (a_counts, b_counts, end) = thread::scope(|s| {
            let a_handles: Vec<_> = a_to_b.producers
                .into_iter()
                .zip(b_to_a.consumers)
                .enumerate()
                .map(|(idx, (mut to_b, mut from_b))| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        cpu::pin_worker(A_ROLE, idx, a_cores);
                        to_b.start();
                        from_b.join_group();
                        let mut creator = MC::default();
                        let mut sink = MS::default();

                        barrier.arrive_and_wait(Role::Producer);
                        barrier.publish_start();
                        run_initiator(idx, rounds, &mut to_b, &mut from_b, &mut creator, &mut sink)
                    })
                })
                .collect();

            let b_handles: Vec<_> = b_to_a.producers
                .into_iter()
                .zip(a_to_b.consumers)
                .enumerate()
                .map(|(idx, (mut to_a, mut from_a))| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        cpu::pin_worker(B_ROLE, idx, b_cores);
                        to_a.start();
                        from_a.join_group();
                        let mut creator = MC::default();
                        let mut sink = MS::default();

                        barrier.arrive_and_wait(Role::Consumer);
                        run_echo(rounds, &mut to_a, &mut from_a, &mut creator, &mut sink)
                    })
                })
                .collect();

            let a_counts: Vec<Result<usize>> = a_handles
                .into_iter()
                .map(|handle| join_worker(handle, A_ROLE))
                .collect();
            let b_counts: Vec<Result<usize>> = b_handles
                .into_iter()
                .map(|handle| join_worker(handle, B_ROLE))
                .collect();
            (a_counts, b_counts, Instant::now())
        });

        let a_total = a_counts.into_iter().sum::<Result<usize>>()?;
        let b_total = b_counts.into_iter().sum::<Result<usize>>()?;
        if a_total != b_total || a_total != rounds * threads {
            return Err(
                BenchError::invariant(
                    &self.key,
                    format!("initiators completed {a_total} round trips, echo side answered {b_total}")
                )
            );
        }

        let elapsed = barrier
            .elapsed_until(end)
            .ok_or_else(|| BenchError::invariant(&self.key, "start time was never published"))?;
        let metric = (elapsed.as_nanos() as f64) / (a_total as f64);

        debug!(benchmark = %self.key, ?elapsed, ns_per_round_trip = metric, "latency trial finished");
        Ok(BenchmarkResult {
            key: self.key.clone(),
            metric,
            total_msg_num: a_total,
        })
    }
}
