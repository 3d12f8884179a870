//! Stress testing utilities for duration-bound queue runs.

use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use std::thread;
use std::time::{ Duration, Instant };

use ringbench::BatchedSpscQueue;

use crate::verify::SequenceChecker;

/// Configuration for stress tests
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Duration to run the test
    pub duration: Duration,
    /// Ring capacity (power of 2)
    pub capacity: usize,
    /// Items between read-index publications
    pub items_per_batch: usize,
    /// Spin iterations the consumer burns per item (0 = none)
    pub consumer_delay_spins: u32,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(2),
            capacity: 1024,
            items_per_batch: 64,
            consumer_delay_spins: 0,
        }
    }
}

impl StressConfig {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            ..Default::default()
        }
    }

    pub fn with_ring(mut self, capacity: usize, items_per_batch: usize) -> Self {
        self.capacity = capacity;
        self.items_per_batch = items_per_batch;
        self
    }

    pub fn with_consumer_delay(mut self, spins: u32) -> Self {
        self.consumer_delay_spins = spins;
        self
    }
}

/// Metrics collected during stress testing
#[derive(Debug, Clone, Default)]
pub struct StressMetrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub errors: u64,
    pub checkpoints_published: u64,
    pub duration: Duration,
}

impl StressMetrics {
    pub fn send_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.messages_sent as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn receive_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.messages_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Runs one producer and one consumer over a `BatchedSpscQueue` until the
/// configured duration elapses, then drains and verifies ordering.
pub struct StressRunner {
    config: StressConfig,
}

impl StressRunner {
    pub fn new(config: StressConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StressConfig {
        &self.config
    }

    pub fn run_batched_spsc(&self) -> ringbench::Result<StressMetrics> {
        let (mut producer, mut consumer) = BatchedSpscQueue::<u64>::new(
            self.config.capacity,
            self.config.items_per_batch
        )?;
        let running = Arc::new(AtomicBool::new(true));
        let producer_done = Arc::new(AtomicBool::new(false));
        let start = Instant::now();

        let running_prod = running.clone();
        let done_prod = producer_done.clone();
        let writer = thread::spawn(move || {
            let mut written = 0u64;
            while running_prod.load(Ordering::Relaxed) {
                if producer.try_produce(written).is_ok() {
                    written += 1;
                } else {
                    std::hint::spin_loop();
                }
            }
            done_prod.store(true, Ordering::Release);
            written
        });

        let delay = self.config.consumer_delay_spins;
        let reader = thread::spawn(move || {
            let mut checker = SequenceChecker::new();
            loop {
                match consumer.try_consume() {
                    Some(value) => {
                        checker.check(value);
                        for _ in 0..delay {
                            std::hint::spin_loop();
                        }
                    }
                    // every write happened before `producer_done`, so one more look is final
                    None if producer_done.load(Ordering::Acquire) => {
                        match consumer.try_consume() {
                            Some(value) => {
                                checker.check(value);
                            }
                            None => break,
                        }
                    }
                    None => std::hint::spin_loop(),
                }
            }
            (checker, consumer.checkpoints_published())
        });

        thread::sleep(self.config.duration);
        running.store(false, Ordering::Release);

        let written = writer.join().map_err(|_| ringbench::BenchError::WorkerPanicked { role: "producer" })?;
        let (checker, checkpoints) = reader
            .join()
            .map_err(|_| ringbench::BenchError::WorkerPanicked { role: "consumer" })?;

        Ok(StressMetrics {
            messages_sent: written,
            messages_received: checker.received(),
            errors: checker.errors(),
            checkpoints_published: checkpoints,
            duration: start.elapsed(),
        })
    }
}
