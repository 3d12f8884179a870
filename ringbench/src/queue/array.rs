//! Multi-producer/multi-consumer reference queue.
//!
//! Wraps `crossbeam::queue::ArrayQueue`. Every endpoint shares the same
//! queue, so consumers compete for messages (anycast delivery).

use std::marker::PhantomData;
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use super::{ Endpoints, QueueAdapter, QueueConsumer, QueueProducer };
use crate::backoff::{ Backoff, SpinThenYield };
use crate::error::Result;
use crate::message::Message;

pub struct ArrayProducer<T, B = SpinThenYield> {
    queue: Arc<ArrayQueue<T>>,
    _backoff: PhantomData<fn() -> B>,
}

pub struct ArrayConsumer<T, B = SpinThenYield> {
    queue: Arc<ArrayQueue<T>>,
    _backoff: PhantomData<fn() -> B>,
}

impl<T: Message, B: Backoff> QueueProducer<T> for ArrayProducer<T, B> {
    #[inline]
    fn try_produce(&mut self, value: T) -> std::result::Result<(), T> {
        self.queue.push(value)
    }

    fn produce(&mut self, value: T) {
        let mut pending = value;
        let mut backoff = B::default();
        while let Err(rejected) = self.queue.push(pending) {
            pending = rejected;
            backoff.snooze();
        }
    }
}

impl<T: Message, B: Backoff> QueueConsumer<T> for ArrayConsumer<T, B> {
    #[inline]
    fn try_consume(&mut self) -> Option<T> {
        self.queue.pop()
    }

    fn consume(&mut self) -> T {
        let mut backoff = B::default();
        loop {
            if let Some(value) = self.queue.pop() {
                return value;
            }
            backoff.snooze();
        }
    }
}

/// Adapter for `crossbeam::queue::ArrayQueue`.
pub struct CrossbeamArray<B = SpinThenYield>(PhantomData<fn() -> B>);

impl<T: Message, B: Backoff + 'static> QueueAdapter<T> for CrossbeamArray<B> {
    const VENDOR: &'static str = "crossbeam";
    const MAX_PRODUCERS: usize = usize::MAX;
    const MAX_CONSUMERS: usize = usize::MAX;

    type Producer = ArrayProducer<T, B>;
    type Consumer = ArrayConsumer<T, B>;

    fn create(capacity: usize, producers: usize, consumers: usize) -> Result<Endpoints<Self::Producer, Self::Consumer>> {
        let queue = Arc::new(ArrayQueue::new(capacity));
        Ok(Endpoints {
            producers: (0..producers)
                .map(|_| ArrayProducer {
                    queue: Arc::clone(&queue),
                    _backoff: PhantomData,
                })
                .collect(),
            consumers: (0..consumers)
                .map(|_| ArrayConsumer {
                    queue: Arc::clone(&queue),
                    _backoff: PhantomData,
                })
                .collect(),
        })
    }
}
