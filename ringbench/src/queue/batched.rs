//! Batched single-producer/single-consumer ring
//!
//! The producer publishes `write_index` after every item. The consumer
//! advances a private read cursor and only publishes `read_index` every
//! `items_per_batch` items, so the producer sees consumer progress in
//! checkpoint-sized steps and the shared read cursor cache line is written
//! once per batch instead of once per item.
//!
//! When at least one staging-buffer worth of items sits contiguously in the
//! ring, `peek` copies the whole run into a private buffer and serves the
//! following peeks from there.
//!
//! ```text
//!   read_index (published)   local_read_index         write_index
//!        |                        |                        |
//!   [ .. | consumed, not yet      | ready to consume       | free .. ]
//!        |   released             |                        |
//! ```
//!
//! Peeked references borrow the consumer mutably, so a reference can never
//! outlive the `skip` that releases its slot.

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::{ size_of, MaybeUninit };
use std::ptr;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Arc;

use crossbeam::utils::CachePadded;

use super::{ Endpoints, QueueAdapter, QueueConfig, QueueConsumer, QueueProducer };
use crate::backoff::{ spin_until, Backoff, SpinThenYield };
use crate::constants::STAGING_BUFFER_BYTES;
use crate::error::Result;
use crate::message::Message;

/// Shared ring state. Handles are created with [`BatchedSpscQueue::new`].
pub struct BatchedSpscQueue<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    items_per_batch: usize,
    /// Next slot the producer writes, published after every item
    write_index: CachePadded<AtomicUsize>,
    /// Consumer progress, published at checkpoints only
    read_index: CachePadded<AtomicUsize>,
}

// Slots are only touched by the unique producer (free region) and the unique
// consumer (ready region); the cursors order the hand-off.
unsafe impl<T: Send> Send for BatchedSpscQueue<T> {}
unsafe impl<T: Send> Sync for BatchedSpscQueue<T> {}

impl<T: Message> BatchedSpscQueue<T> {
    /// Create a ring and its two handles with the default backoff.
    pub fn new(capacity: usize, items_per_batch: usize) -> Result<(BatchedProducer<T>, BatchedConsumer<T>)> {
        Self::with_backoff(capacity, items_per_batch)
    }

    /// Create a ring with `DEFAULT_BATCHES_PER_RING` checkpoints per lap.
    pub fn with_capacity(capacity: usize) -> Result<(BatchedProducer<T>, BatchedConsumer<T>)> {
        Ok(Self::from_config(QueueConfig::with_capacity(capacity)?))
    }

    /// Create a ring whose handles wait with `B`.
    pub fn with_backoff<B: Backoff>(
        capacity: usize,
        items_per_batch: usize
    ) -> Result<(BatchedProducer<T, B>, BatchedConsumer<T, B>)> {
        let config = QueueConfig::new(capacity, items_per_batch)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config<B: Backoff>(config: QueueConfig) -> (BatchedProducer<T, B>, BatchedConsumer<T, B>) {
        let slots = (0..config.capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let shared = Arc::new(Self {
            slots,
            mask: config.capacity - 1,
            items_per_batch: config.items_per_batch,
            write_index: CachePadded::new(AtomicUsize::new(0)),
            read_index: CachePadded::new(AtomicUsize::new(0)),
        });

        let staging_len = staging_len::<T>(config.capacity);
        let staging = (0..staging_len)
            .map(|_| MaybeUninit::uninit())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let producer = BatchedProducer {
            shared: Arc::clone(&shared),
            write_index: 0,
            cached_read_index: 0,
            _backoff: PhantomData,
        };
        let consumer = BatchedConsumer {
            next_checkpoint: config.items_per_batch,
            shared,
            local_read_index: 0,
            cached_write_index: 0,
            staging,
            staged: 0,
            stage_pos: 0,
            checkpoints_published: 0,
            _backoff: PhantomData,
        };
        (producer, consumer)
    }

    #[inline(always)]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    fn slot_ptr(&self, sequence: usize) -> *mut T {
        // UnsafeCell and MaybeUninit are both repr(transparent)
        self.slots[sequence & self.mask].get() as *mut T
    }
}

/// Items the consumer stages at once. Staging is off when this is 0.
fn staging_len<T>(capacity: usize) -> usize {
    let per_buffer = STAGING_BUFFER_BYTES / size_of::<T>().max(1);
    let len = per_buffer.min(capacity);
    if len > 1 { len } else { 0 }
}

/// Producer handle. Exactly one exists per ring.
pub struct BatchedProducer<T, B = SpinThenYield> {
    shared: Arc<BatchedSpscQueue<T>>,
    write_index: usize,
    /// Last `read_index` observed, refreshed only when the ring looks full
    cached_read_index: usize,
    _backoff: PhantomData<fn() -> B>,
}

impl<T: Message, B: Backoff> BatchedProducer<T, B> {
    #[inline]
    fn has_space(&mut self) -> bool {
        let capacity = self.shared.capacity();
        if self.write_index - self.cached_read_index < capacity {
            return true;
        }
        self.cached_read_index = self.shared.read_index.load(Ordering::Acquire);
        self.write_index - self.cached_read_index < capacity
    }

    #[inline]
    fn publish(&mut self, value: T) {
        // SAFETY: has_space() proved the slot lies outside the consumer's
        // unreleased region, and only this handle writes slots.
        unsafe {
            ptr::write(self.shared.slot_ptr(self.write_index), value);
        }
        self.write_index += 1;
        self.shared.write_index.store(self.write_index, Ordering::Release);
    }

    /// Write `value`, spinning while the ring is full.
    pub fn produce(&mut self, value: T) {
        if !self.has_space() {
            let mut backoff = B::default();
            while !self.has_space() {
                backoff.snooze();
            }
        }
        self.publish(value);
    }

    /// Write `value` if a slot is free.
    pub fn try_produce(&mut self, value: T) -> std::result::Result<(), T> {
        if !self.has_space() {
            return Err(value);
        }
        self.publish(value);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Items written so far
    pub fn written(&self) -> usize {
        self.write_index
    }
}

/// Consumer handle. Exactly one exists per ring.
pub struct BatchedConsumer<T, B = SpinThenYield> {
    shared: Arc<BatchedSpscQueue<T>>,
    local_read_index: usize,
    next_checkpoint: usize,
    /// Last `write_index` observed
    cached_write_index: usize,
    staging: Box<[MaybeUninit<T>]>,
    /// Valid items in `staging`
    staged: usize,
    /// Next staged item to serve
    stage_pos: usize,
    checkpoints_published: u64,
    _backoff: PhantomData<fn() -> B>,
}

impl<T: Message, B: Backoff> BatchedConsumer<T, B> {
    /// Reference to the next item, spinning until one is available.
    #[inline]
    pub fn peek(&mut self) -> &T {
        if self.stage_pos < self.staged {
            // SAFETY: positions below `staged` were filled by stage_or_slot()
            return unsafe { self.staging[self.stage_pos].assume_init_ref() };
        }
        if self.cached_write_index <= self.local_read_index {
            let shared = &self.shared;
            let local = self.local_read_index;
            let mut observed = self.cached_write_index;
            spin_until::<B>(|| {
                observed = shared.write_index.load(Ordering::Acquire);
                observed > local
            });
            self.cached_write_index = observed;
        }
        self.stage_or_slot()
    }

    /// Reference to the next item, or `None` when the ring is empty.
    #[inline]
    pub fn try_peek(&mut self) -> Option<&T> {
        if self.stage_pos < self.staged {
            // SAFETY: see peek()
            return Some(unsafe { self.staging[self.stage_pos].assume_init_ref() });
        }
        if self.cached_write_index <= self.local_read_index {
            self.cached_write_index = self.shared.write_index.load(Ordering::Acquire);
            if self.cached_write_index <= self.local_read_index {
                return None;
            }
        }
        Some(self.stage_or_slot())
    }

    /// Serve the item at `local_read_index`, staging a contiguous run when possible.
    /// Requires at least one ready item.
    fn stage_or_slot(&mut self) -> &T {
        self.staged = 0;
        self.stage_pos = 0;

        let ready = self.cached_write_index - self.local_read_index;
        let run = self.staging.len();
        let start = self.local_read_index & self.shared.mask;
        if run > 0 && ready >= run && start + run <= self.shared.capacity() {
            // SAFETY: the run is ready, does not wrap and the producer cannot
            // reuse these slots before read_index passes them.
            unsafe {
                ptr::copy_nonoverlapping(
                    self.shared.slot_ptr(self.local_read_index) as *const T,
                    self.staging.as_mut_ptr() as *mut T,
                    run
                );
            }
            self.staged = run;
            // SAFETY: just copied
            return unsafe { self.staging[0].assume_init_ref() };
        }

        // SAFETY: the slot is ready and stays unreleased until skip()
        unsafe { &*self.shared.slot_ptr(self.local_read_index) }
    }

    /// Release the item returned by the last peek. Does nothing if no item is ready.
    #[inline]
    pub fn skip(&mut self) {
        if self.local_read_index >= self.cached_write_index {
            return;
        }
        if self.stage_pos < self.staged {
            self.stage_pos += 1;
        }
        self.local_read_index += 1;
        if self.local_read_index >= self.next_checkpoint {
            self.shared.read_index.store(self.local_read_index, Ordering::Release);
            self.next_checkpoint += self.shared.items_per_batch;
            self.checkpoints_published += 1;
        }
    }

    /// Copy out the next item if one is available.
    #[inline]
    pub fn try_consume(&mut self) -> Option<T> {
        let value = *self.try_peek()?;
        self.skip();
        Some(value)
    }

    /// Copy out the next item, spinning until one is available.
    #[inline]
    pub fn consume(&mut self) -> T {
        let value = *self.peek();
        self.skip();
        value
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn items_per_batch(&self) -> usize {
        self.shared.items_per_batch
    }

    /// Number of times `read_index` has been published
    pub fn checkpoints_published(&self) -> u64 {
        self.checkpoints_published
    }

    /// Value of `read_index` as the producer currently sees it
    pub fn published_read_index(&self) -> usize {
        self.shared.read_index.load(Ordering::Acquire)
    }

    /// Items released by `skip` so far
    pub fn consumed(&self) -> usize {
        self.local_read_index
    }
}

impl<T: Message, B: Backoff> QueueProducer<T> for BatchedProducer<T, B> {
    #[inline]
    fn try_produce(&mut self, value: T) -> std::result::Result<(), T> {
        BatchedProducer::try_produce(self, value)
    }

    #[inline]
    fn produce(&mut self, value: T) {
        BatchedProducer::produce(self, value)
    }
}

impl<T: Message, B: Backoff> QueueConsumer<T> for BatchedConsumer<T, B> {
    #[inline]
    fn try_consume(&mut self) -> Option<T> {
        BatchedConsumer::try_consume(self)
    }

    #[inline]
    fn consume(&mut self) -> T {
        BatchedConsumer::consume(self)
    }
}

/// Adapter for [`BatchedSpscQueue`] with `DEFAULT_BATCHES_PER_RING` checkpoints per lap.
pub struct BatchedSpsc<B = SpinThenYield>(PhantomData<fn() -> B>);

impl<T: Message, B: Backoff + 'static> QueueAdapter<T> for BatchedSpsc<B> {
    const VENDOR: &'static str = "batched_spsc";
    const MAX_PRODUCERS: usize = 1;
    const MAX_CONSUMERS: usize = 1;

    type Producer = BatchedProducer<T, B>;
    type Consumer = BatchedConsumer<T, B>;

    fn create(capacity: usize, _producers: usize, _consumers: usize) -> Result<Endpoints<Self::Producer, Self::Consumer>> {
        let (producer, consumer) = BatchedSpscQueue::from_config(QueueConfig::with_capacity(capacity)?);
        Ok(Endpoints {
            producers: vec![producer],
            consumers: vec![consumer],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BusySpin;
    use proptest::prelude::*;
    use std::thread;

    #[test]
    fn test_rejects_bad_geometry() {
        assert!(BatchedSpscQueue::<u32>::new(1000, 8).is_err());
        assert!(BatchedSpscQueue::<u32>::new(1024, 3).is_err());
        assert!(BatchedSpscQueue::<u32>::new(4, 8).is_err());
    }

    #[test]
    fn test_try_peek_on_empty_ring() {
        let (_producer, mut consumer) = BatchedSpscQueue::<u64>::new(8, 2).unwrap();
        assert!(consumer.try_peek().is_none());
        assert!(consumer.try_consume().is_none());
        consumer.skip();
        assert_eq!(consumer.consumed(), 0);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let (mut producer, mut consumer) = BatchedSpscQueue::<u64>::new(8, 2).unwrap();
        producer.produce(7);
        producer.produce(8);

        assert_eq!(*consumer.peek(), 7);
        assert_eq!(*consumer.peek(), 7);
        consumer.skip();
        assert_eq!(*consumer.peek(), 8);
    }

    #[test]
    fn test_producer_stalls_until_checkpoint() {
        let (mut producer, mut consumer) = BatchedSpscQueue::<u64>::new(8, 4).unwrap();
        for i in 0..8 {
            producer.try_produce(i).unwrap();
        }
        assert_eq!(producer.try_produce(8), Err(8));

        // three items consumed, no checkpoint yet
        for expected in 0..3 {
            assert_eq!(consumer.try_consume(), Some(expected));
        }
        assert_eq!(consumer.published_read_index(), 0);
        assert_eq!(producer.try_produce(8), Err(8));

        assert_eq!(consumer.try_consume(), Some(3));
        assert_eq!(consumer.published_read_index(), 4);
        assert_eq!(consumer.checkpoints_published(), 1);

        for i in 8..12 {
            producer.try_produce(i).unwrap();
        }
        assert_eq!(producer.try_produce(12), Err(12));
    }

    #[test]
    fn test_staged_run_matches_ring_order() {
        // 64 u32 fill the staging buffer, so the ring drains as two staged runs
        let (mut producer, mut consumer) = BatchedSpscQueue::<u32>::new(128, 32).unwrap();
        for i in 0..128 {
            producer.produce(i);
        }
        for expected in 0..128 {
            assert_eq!(consumer.consume(), expected);
        }
        assert_eq!(consumer.checkpoints_published(), 4);
    }

    #[test]
    fn test_wraparound_across_threads() {
        const ITEMS: u64 = 100_000;
        let (mut producer, mut consumer) = BatchedSpscQueue::<u64>::with_backoff::<BusySpin>(16, 4).unwrap();

        let writer = thread::spawn(move || {
            for i in 0..ITEMS {
                producer.produce(i);
            }
        });

        for expected in 0..ITEMS {
            assert_eq!(*consumer.peek(), expected);
            consumer.skip();
        }
        writer.join().unwrap();
        assert_eq!(consumer.checkpoints_published(), ITEMS / 4);
    }

    #[test]
    fn test_adapter_builds_one_pair() {
        let endpoints = <BatchedSpsc as QueueAdapter<u32>>::endpoints(64, 1, 1).unwrap();
        assert_eq!(endpoints.producers.len(), 1);
        assert_eq!(endpoints.consumers[0].items_per_batch(), 16);
    }

    proptest! {
        #[test]
        fn prop_single_thread_fifo(cap_exp in 1u32..8, batch_exp in 0u32..8, ops in prop::collection::vec(any::<bool>(), 1..400)) {
            prop_assume!(batch_exp <= cap_exp);
            let capacity = 1usize << cap_exp;
            let (mut producer, mut consumer) = BatchedSpscQueue::<u32>::new(capacity, 1 << batch_exp).unwrap();

            let mut next_in = 0u32;
            let mut next_out = 0u32;
            for push in ops {
                if push {
                    if producer.try_produce(next_in).is_ok() {
                        next_in += 1;
                    }
                } else if let Some(value) = consumer.try_consume() {
                    prop_assert_eq!(value, next_out);
                    next_out += 1;
                }
                prop_assert!(next_in - next_out <= capacity as u32);
            }
            while let Some(value) = consumer.try_consume() {
                prop_assert_eq!(value, next_out);
                next_out += 1;
            }
            prop_assert_eq!(next_out, next_in);
        }
    }
}
