//! Fault-injecting queue adapter.
//!
//! `FaultyQueue<F>` is a bounded MPMC queue behind a `parking_lot::Mutex`.
//! Before each message is enqueued the fault policy `F` may delay the
//! producer or ask for the message to be enqueued more than once, which is
//! exactly the kind of broken subject the harness invariants must catch.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };

use ringbench::message::Message;
use ringbench::queue::{ Endpoints, QueueAdapter, QueueConsumer, QueueProducer };
use ringbench::Result;

/// What goes wrong on the producing side
pub trait Fault: Default + Send + 'static {
    /// Vendor tag of the faulty queue
    const NAME: &'static str;

    /// Copies of the next message to enqueue (normally 1)
    fn copies(&mut self) -> usize;

    /// Called before every enqueue attempt
    fn before_produce(&mut self) {}
}

/// Well-behaved queue, the control case
#[derive(Debug, Default)]
pub struct NoFault;

impl Fault for NoFault {
    const NAME: &'static str = "locked_deque";

    fn copies(&mut self) -> usize {
        1
    }
}

/// Enqueues every `N`th message twice.
#[derive(Debug, Default)]
pub struct DuplicateEvery<const N: usize> {
    produced: usize,
}

impl<const N: usize> Fault for DuplicateEvery<N> {
    const NAME: &'static str = "duplicating_deque";

    fn copies(&mut self) -> usize {
        self.produced += 1;
        if N > 0 && self.produced % N == 0 { 2 } else { 1 }
    }
}

/// Random short stalls before enqueueing; delivery stays correct.
#[derive(Debug)]
pub struct Jitter {
    rng: StdRng,
}

impl Default for Jitter {
    fn default() -> Self {
        Self { rng: StdRng::from_entropy() }
    }
}

impl Fault for Jitter {
    const NAME: &'static str = "jittery_deque";

    fn copies(&mut self) -> usize {
        1
    }

    fn before_produce(&mut self) {
        match self.rng.gen_range(0..100) {
            0 => std::thread::yield_now(),
            1..=9 => {
                for _ in 0..self.rng.gen_range(1..64) {
                    std::hint::spin_loop();
                }
            }
            _ => {}
        }
    }
}

struct Shared<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

pub struct FaultyProducer<T, F> {
    shared: Arc<Shared<T>>,
    fault: F,
    /// Copies decided for a message that was rejected as full
    pending_copies: Option<usize>,
}

pub struct FaultyConsumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Message, F: Fault> QueueProducer<T> for FaultyProducer<T, F> {
    fn try_produce(&mut self, value: T) -> std::result::Result<(), T> {
        self.fault.before_produce();
        let copies = match self.pending_copies {
            Some(copies) => copies,
            None => self.fault.copies(),
        };

        let mut items = self.shared.items.lock();
        if items.len() + copies > self.shared.capacity {
            self.pending_copies = Some(copies);
            return Err(value);
        }
        items.extend(std::iter::repeat(value).take(copies));
        self.pending_copies = None;
        Ok(())
    }
}

impl<T: Message> QueueConsumer<T> for FaultyConsumer<T> {
    fn try_consume(&mut self) -> Option<T> {
        self.shared.items.lock().pop_front()
    }
}

/// Adapter over the mutex-guarded queue with fault policy `F`.
pub struct FaultyQueue<F = NoFault>(PhantomData<fn() -> F>);

impl<T: Message, F: Fault> QueueAdapter<T> for FaultyQueue<F> {
    const VENDOR: &'static str = F::NAME;
    const MAX_PRODUCERS: usize = usize::MAX;
    const MAX_CONSUMERS: usize = usize::MAX;

    type Producer = FaultyProducer<T, F>;
    type Consumer = FaultyConsumer<T>;

    fn create(capacity: usize, producers: usize, consumers: usize) -> Result<Endpoints<Self::Producer, Self::Consumer>> {
        // one spare slot per producer so a duplicate never wedges a full queue
        let shared = Arc::new(Shared {
            items: Mutex::new(VecDeque::with_capacity(capacity + producers)),
            capacity: capacity + producers,
        });
        Ok(Endpoints {
            producers: (0..producers)
                .map(|_| FaultyProducer {
                    shared: Arc::clone(&shared),
                    fault: F::default(),
                    pending_copies: None,
                })
                .collect(),
            consumers: (0..consumers)
                .map(|_| FaultyConsumer { shared: Arc::clone(&shared) })
                .collect(),
        })
    }
}
