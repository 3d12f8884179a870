//! Throughput harness.
//!
//! `P` producers each publish `workload / P` messages. In anycast mode all
//! workers share one queue and each consumer takes `published / C`
//! messages; the floor division may leave up to `C - 1` messages in the
//! queue, which the harness drains and accounts for after joining. In
//! multicast mode every consumer owns a queue, every producer writes every
//! message into each of them and every consumer takes all `published`.

use std::marker::PhantomData;
use std::thread;
use std::time::Instant;

use tracing::debug;

use super::{ join_worker, validate_name, Benchmark, BenchmarkKey, BenchmarkResult, FanOut };
use crate::backoff::SpinThenYield;
use crate::barrier::{ RendezvousBarrier, Role };
use crate::cpu;
use crate::error::{ BenchError, Result };
use crate::message::{ type_label, Message, MessageConsumer, MessageCreator };
use crate::queue::{ validate_capacity, QueueAdapter, QueueConsumer, QueueProducer };

#[derive(Debug, Clone)]
pub struct ThroughputConfig {
    pub name: String,
    pub capacity: usize,
    pub producers: usize,
    pub consumers: usize,
    pub fan_out: FanOut,
    pub producer_cores: Vec<usize>,
    pub consumer_cores: Vec<usize>,
}

impl ThroughputConfig {
    /// One producer, one consumer, anycast, unpinned.
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        validate_capacity(capacity)?;
        Ok(Self {
            name,
            capacity,
            producers: 1,
            consumers: 1,
            fan_out: FanOut::Anycast,
            producer_cores: Vec::new(),
            consumer_cores: Vec::new(),
        })
    }

    pub fn with_producers(mut self, producers: usize) -> Result<Self> {
        if producers == 0 {
            return Err(crate::config_error!("throughput run needs at least one producer"));
        }
        self.producers = producers;
        Ok(self)
    }

    pub fn with_consumers(mut self, consumers: usize) -> Result<Self> {
        if consumers == 0 {
            return Err(crate::config_error!("throughput run needs at least one consumer"));
        }
        self.consumers = consumers;
        Ok(self)
    }

    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn with_producer_cores(mut self, cores: Vec<usize>) -> Result<Self> {
        cpu::validate_cores(&cores)?;
        self.producer_cores = cores;
        Ok(self)
    }

    pub fn with_consumer_cores(mut self, cores: Vec<usize>) -> Result<Self> {
        cpu::validate_cores(&cores)?;
        self.consumer_cores = cores;
        Ok(self)
    }

    /// Producers and consumers attached to each queue instance
    fn queue_shape(&self) -> (usize, usize) {
        match self.fan_out {
            FanOut::Anycast => (self.producers, self.consumers),
            FanOut::Multicast => (self.producers, 1),
        }
    }
}

/// Throughput benchmark over queue adapter `Q`, creating messages with `MC`
/// and consuming them with `MS`.
pub struct ThroughputBenchmark<T, Q, MC, MS> {
    config: ThroughputConfig,
    key: BenchmarkKey,
    _marker: PhantomData<fn() -> (T, Q, MC, MS)>,
}

impl<T, Q, MC, MS> ThroughputBenchmark<T, Q, MC, MS>
    where T: Message, Q: QueueAdapter<T>, MC: MessageCreator<T>, MS: MessageConsumer<T>
{
    pub fn new(config: ThroughputConfig) -> Result<Self> {
        if config.fan_out == FanOut::Anycast && config.consumers - 1 > config.capacity {
            // the floor-division remainder must fit once every consumer stops
            return Err(
                crate::config_error!(
                    "anycast over {} consumers can leave {} messages queued, more than capacity {}",
                    config.consumers,
                    config.consumers - 1,
                    config.capacity
                )
            );
        }

        let (producers, consumers) = config.queue_shape();
        if !Q::supports(producers, consumers) {
            return Err(
                crate::config_error!(
                    "{} cannot serve {} producers and {} consumers per queue",
                    Q::VENDOR,
                    producers,
                    consumers
                )
            );
        }

        let key = BenchmarkKey::new(
            config.name.clone(),
            Q::VENDOR,
            config.capacity,
            type_label::<T>(),
            config.producers,
            config.consumers
        );
        Ok(Self {
            config,
            key,
            _marker: PhantomData,
        })
    }

    pub fn config(&self) -> &ThroughputConfig {
        &self.config
    }

    /// One producer lane per queue the producer writes to, plus all consumers.
    #[allow(clippy::type_complexity)]
    fn build_queues(&self) -> Result<(Vec<Vec<Q::Producer>>, Vec<Q::Consumer>)> {
        let ThroughputConfig { capacity, producers, consumers, .. } = self.config;
        match self.config.fan_out {
            FanOut::Anycast => {
                let endpoints = Q::endpoints(capacity, producers, consumers)?;
                let lanes = endpoints.producers
                    .into_iter()
                    .map(|producer| vec![producer])
                    .collect();
                Ok((lanes, endpoints.consumers))
            }
            FanOut::Multicast => {
                let mut lanes: Vec<Vec<Q::Producer>> = (0..producers)
                    .map(|_| Vec::with_capacity(consumers))
                    .collect();
                let mut sinks = Vec::with_capacity(consumers);
                for _ in 0..consumers {
                    let endpoints = Q::endpoints(capacity, producers, 1)?;
                    for (lane, producer) in lanes.iter_mut().zip(endpoints.producers) {
                        lane.push(producer);
                    }
                    sinks.extend(endpoints.consumers);
                }
                Ok((lanes, sinks))
            }
        }
    }

    fn violation(&self, message: String) -> BenchError {
        BenchError::invariant(&self.key, message)
    }
}

/// Publish `count` messages into every lane, waiting while a queue is full.
fn produce_share<T, P, MC>(lanes: &mut [P], creator: &mut MC, count: usize) -> usize
    where T: Message, P: QueueProducer<T>, MC: MessageCreator<T>
{
    let mut produced = 0;
    while produced < count {
        let value = creator.next();
        for lane in lanes.iter_mut() {
            lane.produce(value);
        }
        produced += 1;
    }
    produced
}

fn consume_share<T, C, MS>(consumer: &mut C, sink: &mut MS, target: usize) -> usize
    where T: Message, C: QueueConsumer<T>, MS: MessageConsumer<T>
{
    let mut consumed = 0;
    while consumed < target {
        let value = consumer.consume();
        sink.consume(&value);
        consumed += 1;
    }
    consumed
}

impl<T, Q, MC, MS> Benchmark
    for ThroughputBenchmark<T, Q, MC, MS>
    where T: Message, Q: QueueAdapter<T>, MC: MessageCreator<T>, MS: MessageConsumer<T>
{
    fn key(&self) -> BenchmarkKey {
        self.key.clone()
    }

    fn run(&mut self, workload: usize) -> Result<BenchmarkResult> {
        let producers = self.config.producers;
        let consumers = self.config.consumers;
        let per_producer = workload / producers;
        if per_producer == 0 {
            return Err(crate::config_error!("workload {} is smaller than {} producers", workload, producers));
        }
        let published = per_producer * producers;
        let target = match self.config.fan_out {
            FanOut::Anycast => published / consumers,
            FanOut::Multicast => published,
        };

        let (lanes, sinks) = self.build_queues()?;
        debug!(benchmark = %self.key, workload, per_producer, target, "throughput trial starting");

        let barrier = RendezvousBarrier::<SpinThenYield>::new(producers, consumers);
        let producer_cores = &self.config.producer_cores;
        let consumer_cores = &self.config.consumer_cores;

        let (produced, drained, end) = thread::scope(|s| {
            let producer_handles: Vec<_> = lanes
                .into_iter()
                .enumerate()
                .map(|(idx, mut lanes)| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        cpu::pin_worker(Role::Producer.as_str(), idx, producer_cores);
                        lanes.iter_mut().for_each(|lane| lane.start());
                        let mut creator = MC::default();

                        barrier.arrive_and_wait(Role::Producer);
                        barrier.publish_start();
                        produce_share(&mut lanes, &mut creator, per_producer)
                    })
                })
                .collect();

            let consumer_handles: Vec<_> = sinks
                .into_iter()
                .enumerate()
                .map(|(idx, mut consumer)| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        cpu::pin_worker(Role::Consumer.as_str(), idx, consumer_cores);
                        consumer.join_group();
                        let mut sink = MS::default();

                        barrier.arrive_and_wait(Role::Consumer);
                        let consumed = consume_share(&mut consumer, &mut sink, target);
                        (consumed, consumer)
                    })
                })
                .collect();

            let produced: Vec<Result<usize>> = producer_handles
                .into_iter()
                .map(|handle| join_worker(handle, Role::Producer.as_str()))
                .collect();
            let drained: Vec<Result<(usize, Q::Consumer)>> = consumer_handles
                .into_iter()
                .map(|handle| join_worker(handle, Role::Consumer.as_str()))
                .collect();
            (produced, drained, Instant::now())
        });

        let mut produced_total = 0;
        for count in produced {
            produced_total += count?;
        }
        if produced_total != published {
            return Err(self.violation(format!("producers published {produced_total} of {published} messages")));
        }

        let mut consumed_total = 0;
        let mut leftover_total = 0;
        for (idx, outcome) in drained.into_iter().enumerate() {
            let (consumed, mut consumer) = outcome?;
            if consumed != target {
                return Err(self.violation(format!("consumer {idx} took {consumed} of {target} messages")));
            }
            let mut leftover = 0;
            while consumer.try_consume().is_some() {
                leftover += 1;
            }
            if self.config.fan_out == FanOut::Multicast && consumed + leftover != published {
                return Err(
                    self.violation(
                        format!("consumer {idx} queue delivered {} of {published} messages", consumed + leftover)
                    )
                );
            }
            consumed_total += consumed;
            leftover_total += leftover;
        }

        if self.config.fan_out == FanOut::Anycast && (consumed_total + leftover_total != published || leftover_total >= consumers) {
            return Err(
                self.violation(
                    format!(
                        "queue delivered {} messages ({consumed_total} consumed, {leftover_total} left over), {published} published",
                        consumed_total + leftover_total
                    )
                )
            );
        }

        let elapsed = barrier
            .elapsed_until(end)
            .ok_or_else(|| self.violation("start time was never published".to_string()))?;
        let metric = (published as f64) / elapsed.as_secs_f64();

        debug!(benchmark = %self.key, ?elapsed, msgs_per_sec = metric, "throughput trial finished");
        Ok(BenchmarkResult {
            key: self.key.clone(),
            metric,
            total_msg_num: published,
        })
    }
}
