//! Single-producer/single-consumer ring with one busy flag per slot.
//!
//! Baseline for the batched ring: no shared cursors at all. The producer
//! waits for its slot to be clear, writes it and raises the flag. The
//! consumer waits for the flag, reads and clears it.

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;

use super::{ validate_capacity, Endpoints, QueueAdapter, QueueConsumer, QueueProducer };
use crate::backoff::{ spin_until, Backoff, SpinThenYield };
use crate::error::Result;
use crate::message::Message;

struct Node<T> {
    payload: UnsafeCell<MaybeUninit<T>>,
    busy: AtomicBool,
}

/// Shared slot array. Handles are created with [`SimpleSpinSpscQueue::new`].
pub struct SimpleSpinSpscQueue<T> {
    nodes: Box<[Node<T>]>,
    mask: usize,
}

// A payload is written only while its flag is clear and read only while it
// is set, each side by its unique handle.
unsafe impl<T: Send> Send for SimpleSpinSpscQueue<T> {}
unsafe impl<T: Send> Sync for SimpleSpinSpscQueue<T> {}

impl<T: Message> SimpleSpinSpscQueue<T> {
    pub fn new(capacity: usize) -> Result<(SpinProducer<T>, SpinConsumer<T>)> {
        Self::with_backoff(capacity)
    }

    pub fn with_backoff<B: Backoff>(capacity: usize) -> Result<(SpinProducer<T, B>, SpinConsumer<T, B>)> {
        validate_capacity(capacity)?;
        let nodes = (0..capacity)
            .map(|_| Node {
                payload: UnsafeCell::new(MaybeUninit::uninit()),
                busy: AtomicBool::new(false),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let shared = Arc::new(Self { nodes, mask: capacity - 1 });

        Ok((
            SpinProducer {
                shared: Arc::clone(&shared),
                write_idx: 0,
                _backoff: PhantomData,
            },
            SpinConsumer {
                shared,
                read_idx: 0,
                _backoff: PhantomData,
            },
        ))
    }
}

pub struct SpinProducer<T, B = SpinThenYield> {
    shared: Arc<SimpleSpinSpscQueue<T>>,
    write_idx: usize,
    _backoff: PhantomData<fn() -> B>,
}

impl<T: Message, B: Backoff> SpinProducer<T, B> {
    #[inline]
    fn fill(&mut self, value: T) {
        let node = &self.shared.nodes[self.write_idx];
        // SAFETY: the flag is clear, so the consumer is done with this slot
        unsafe {
            ptr::write(node.payload.get() as *mut T, value);
        }
        node.busy.store(true, Ordering::Release);
        self.write_idx = (self.write_idx + 1) & self.shared.mask;
    }

    pub fn produce(&mut self, value: T) {
        let node = &self.shared.nodes[self.write_idx];
        spin_until::<B>(|| !node.busy.load(Ordering::Acquire));
        self.fill(value);
    }

    pub fn try_produce(&mut self, value: T) -> std::result::Result<(), T> {
        if self.shared.nodes[self.write_idx].busy.load(Ordering::Acquire) {
            return Err(value);
        }
        self.fill(value);
        Ok(())
    }
}

pub struct SpinConsumer<T, B = SpinThenYield> {
    shared: Arc<SimpleSpinSpscQueue<T>>,
    read_idx: usize,
    _backoff: PhantomData<fn() -> B>,
}

impl<T: Message, B: Backoff> SpinConsumer<T, B> {
    #[inline]
    fn payload(&self) -> &T {
        // SAFETY: callers observed the flag set with Acquire
        unsafe { &*(self.shared.nodes[self.read_idx].payload.get() as *const T) }
    }

    pub fn peek(&mut self) -> &T {
        let node = &self.shared.nodes[self.read_idx];
        spin_until::<B>(|| node.busy.load(Ordering::Acquire));
        self.payload()
    }

    pub fn try_peek(&mut self) -> Option<&T> {
        if !self.shared.nodes[self.read_idx].busy.load(Ordering::Acquire) {
            return None;
        }
        Some(self.payload())
    }

    /// Release the peeked slot. Does nothing on an empty slot.
    pub fn skip(&mut self) {
        let node = &self.shared.nodes[self.read_idx];
        if !node.busy.load(Ordering::Relaxed) {
            return;
        }
        node.busy.store(false, Ordering::Release);
        self.read_idx = (self.read_idx + 1) & self.shared.mask;
    }

    pub fn try_consume(&mut self) -> Option<T> {
        let value = *self.try_peek()?;
        self.skip();
        Some(value)
    }

    pub fn consume(&mut self) -> T {
        let value = *self.peek();
        self.skip();
        value
    }
}

impl<T: Message, B: Backoff> QueueProducer<T> for SpinProducer<T, B> {
    fn try_produce(&mut self, value: T) -> std::result::Result<(), T> {
        SpinProducer::try_produce(self, value)
    }

    fn produce(&mut self, value: T) {
        SpinProducer::produce(self, value)
    }
}

impl<T: Message, B: Backoff> QueueConsumer<T> for SpinConsumer<T, B> {
    fn try_consume(&mut self) -> Option<T> {
        SpinConsumer::try_consume(self)
    }

    fn consume(&mut self) -> T {
        SpinConsumer::consume(self)
    }
}

/// Adapter for [`SimpleSpinSpscQueue`].
pub struct SimpleSpinSpsc<B = SpinThenYield>(PhantomData<fn() -> B>);

impl<T: Message, B: Backoff + 'static> QueueAdapter<T> for SimpleSpinSpsc<B> {
    const VENDOR: &'static str = "spin_spsc";
    const MAX_PRODUCERS: usize = 1;
    const MAX_CONSUMERS: usize = 1;

    type Producer = SpinProducer<T, B>;
    type Consumer = SpinConsumer<T, B>;

    fn create(capacity: usize, _producers: usize, _consumers: usize) -> Result<Endpoints<Self::Producer, Self::Consumer>> {
        let (producer, consumer) = SimpleSpinSpscQueue::with_backoff(capacity)?;
        Ok(Endpoints {
            producers: vec![producer],
            consumers: vec![consumer],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_full_and_empty() {
        let (mut producer, mut consumer) = SimpleSpinSpscQueue::<u32>::new(2).unwrap();
        assert!(consumer.try_consume().is_none());

        producer.try_produce(1).unwrap();
        producer.try_produce(2).unwrap();
        assert_eq!(producer.try_produce(3), Err(3));

        assert_eq!(consumer.try_peek(), Some(&1));
        consumer.skip();
        producer.try_produce(3).unwrap();
        assert_eq!(consumer.try_consume(), Some(2));
        assert_eq!(consumer.try_consume(), Some(3));
        assert!(consumer.try_consume().is_none());
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        let err = SimpleSpinSpscQueue::<u32>::new(6).err().unwrap();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_cross_thread_order() {
        const ITEMS: u32 = 50_000;
        let (mut producer, mut consumer) = SimpleSpinSpscQueue::<u32>::new(64).unwrap();

        let writer = thread::spawn(move || {
            for i in 0..ITEMS {
                producer.produce(i);
            }
        });
        for expected in 0..ITEMS {
            assert_eq!(consumer.consume(), expected);
        }
        writer.join().unwrap();
    }
}
