//! Bounded queues under test.
//!
//! ## Implementations
//!
//! | Vendor | Type | Producers | Consumers |
//! |--------|------|-----------|-----------|
//! | `batched_spsc` | `BatchedSpscQueue<T>` | 1 | 1 |
//! | `spin_spsc` | `SimpleSpinSpscQueue<T>` | 1 | 1 |
//! | `crossbeam` | `crossbeam::queue::ArrayQueue<T>` | any | any |
//!
//! Harnesses never see a queue type directly. They ask a `QueueAdapter` for
//! a set of producer and consumer endpoints and move each endpoint into the
//! worker thread that owns it. SPSC queues hand out exactly one of each, so
//! the single-producer/single-consumer contract is enforced by ownership.

pub mod batched;
pub mod spin;
pub mod array;

pub use batched::{ BatchedConsumer, BatchedProducer, BatchedSpsc, BatchedSpscQueue };
pub use spin::{ SimpleSpinSpsc, SimpleSpinSpscQueue, SpinConsumer, SpinProducer };
pub use array::{ ArrayConsumer, ArrayProducer, CrossbeamArray };

use crate::backoff::{ Backoff, SpinThenYield };
use crate::constants::DEFAULT_BATCHES_PER_RING;
use crate::error::Result;
use crate::message::Message;

/// Producing side of a queue.
pub trait QueueProducer<T>: Send {
    /// Publish `value`, handing it back when the queue is full.
    fn try_produce(&mut self, value: T) -> std::result::Result<(), T>;

    /// Publish `value`, spinning until the queue accepts it.
    fn produce(&mut self, value: T) {
        let mut pending = value;
        let mut backoff = SpinThenYield::default();
        while let Err(rejected) = self.try_produce(pending) {
            pending = rejected;
            backoff.snooze();
        }
    }

    /// Readiness signal, called once on the worker thread before the start barrier.
    fn start(&mut self) {}
}

/// Consuming side of a queue.
pub trait QueueConsumer<T>: Send {
    /// Take the next value if one is available.
    fn try_consume(&mut self) -> Option<T>;

    /// Take the next value, spinning until one arrives.
    fn consume(&mut self) -> T {
        let mut backoff = SpinThenYield::default();
        loop {
            if let Some(value) = self.try_consume() {
                return value;
            }
            backoff.snooze();
        }
    }

    /// Delivery-group join step, called once on the worker thread before the start barrier.
    fn join_group(&mut self) {}
}

/// Endpoints of one queue instance.
pub struct Endpoints<P, C> {
    pub producers: Vec<P>,
    pub consumers: Vec<C>,
}

/// A queue implementation that can be benchmarked.
pub trait QueueAdapter<T: Message>: 'static {
    /// Vendor tag reported in the benchmark key
    const VENDOR: &'static str;
    /// Most producers one queue instance supports
    const MAX_PRODUCERS: usize;
    /// Most consumers one queue instance supports
    const MAX_CONSUMERS: usize;

    type Producer: QueueProducer<T> + 'static;
    type Consumer: QueueConsumer<T> + 'static;

    /// Build one queue and exactly the requested endpoints.
    fn create(capacity: usize, producers: usize, consumers: usize) -> Result<Endpoints<Self::Producer, Self::Consumer>>;

    /// True when one queue instance can serve these producer/consumer counts.
    fn supports(producers: usize, consumers: usize) -> bool {
        (1..=Self::MAX_PRODUCERS).contains(&producers) && (1..=Self::MAX_CONSUMERS).contains(&consumers)
    }

    /// Validated entry point used by the harnesses.
    fn endpoints(capacity: usize, producers: usize, consumers: usize) -> Result<Endpoints<Self::Producer, Self::Consumer>> {
        validate_capacity(capacity)?;
        if !Self::supports(producers, consumers) {
            return Err(
                crate::config_error!(
                    "{} supports at most {} producers and {} consumers, asked for {}/{}",
                    Self::VENDOR,
                    Self::MAX_PRODUCERS,
                    Self::MAX_CONSUMERS,
                    producers,
                    consumers
                )
            );
        }

        let endpoints = Self::create(capacity, producers, consumers)?;
        if endpoints.producers.len() != producers || endpoints.consumers.len() != consumers {
            return Err(
                crate::config_error!(
                    "{} returned {}/{} endpoints, asked for {}/{}",
                    Self::VENDOR,
                    endpoints.producers.len(),
                    endpoints.consumers.len(),
                    producers,
                    consumers
                )
            );
        }
        Ok(endpoints)
    }
}

/// Ring geometry for the batched queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Number of slots (power of 2)
    pub capacity: usize,
    /// Items consumed between two read-index publications (power of 2, divides capacity)
    pub items_per_batch: usize,
}

impl QueueConfig {
    pub fn new(capacity: usize, items_per_batch: usize) -> Result<Self> {
        validate_capacity(capacity)?;
        if !items_per_batch.is_power_of_two() {
            return Err(crate::config_error!("items per batch {} must be power of 2", items_per_batch));
        }
        if capacity % items_per_batch != 0 {
            return Err(
                crate::config_error!("items per batch {} must divide capacity {}", items_per_batch, capacity)
            );
        }
        Ok(Self { capacity, items_per_batch })
    }

    /// Geometry with `DEFAULT_BATCHES_PER_RING` checkpoints per lap
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        validate_capacity(capacity)?;
        Self::new(capacity, (capacity / DEFAULT_BATCHES_PER_RING).max(1))
    }
}

/// Ring capacities must be a non-zero power of 2.
pub fn validate_capacity(capacity: usize) -> Result<()> {
    if !capacity.is_power_of_two() {
        return Err(crate::config_error!("queue size {} must be power of 2", capacity));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_queue_config_creation() {
        let config = QueueConfig::new(1024, 256).unwrap();
        assert_eq!(config.capacity, 1024);
        assert_eq!(config.items_per_batch, 256);
    }

    #[test]
    fn test_queue_config_invalid() {
        assert!(QueueConfig::new(0, 1).is_err());
        assert!(QueueConfig::new(1000, 8).is_err());
        assert!(QueueConfig::new(1024, 3).is_err());
        assert!(QueueConfig::new(8, 16).is_err());
    }

    #[test]
    fn test_default_batches() {
        assert_eq!(QueueConfig::with_capacity(1024).unwrap().items_per_batch, 256);
        assert_eq!(QueueConfig::with_capacity(2).unwrap().items_per_batch, 1);
        assert!(QueueConfig::with_capacity(12).is_err());
    }

    #[test]
    fn test_spsc_adapters_reject_fan_out() {
        assert!(<BatchedSpsc<SpinThenYield> as QueueAdapter<u32>>::supports(1, 1));
        assert!(!<BatchedSpsc as QueueAdapter<u32>>::supports(2, 1));
        assert!(<BatchedSpsc as QueueAdapter<u32>>::endpoints(64, 1, 2).is_err());
        assert!(<SimpleSpinSpsc as QueueAdapter<u32>>::endpoints(64, 2, 1).is_err());
        assert!(<CrossbeamArray as QueueAdapter<u32>>::endpoints(64, 4, 4).is_ok());
    }

    proptest! {
        #[test]
        fn prop_power_of_two_geometry_is_accepted(cap_exp in 0u32..20, batch_exp in 0u32..20) {
            prop_assume!(batch_exp <= cap_exp);
            let config = QueueConfig::new(1usize << cap_exp, 1usize << batch_exp);
            prop_assert!(config.is_ok());
        }

        #[test]
        fn prop_non_power_of_two_is_rejected(capacity in 1usize..100_000, items_per_batch in 1usize..64) {
            prop_assume!(!capacity.is_power_of_two() || !items_per_batch.is_power_of_two());
            let err = QueueConfig::new(capacity, items_per_batch).unwrap_err();
            prop_assert!(err.is_config_error());
        }
    }
}
