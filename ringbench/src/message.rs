//! Message types and the per-thread factories that create and sink them.
//!
//! Every worker builds its own creator or consumer with `Default`, so
//! factories carry per-thread state (a counter, the last value seen) without
//! any sharing.

use std::hint::black_box;

/// Anything that can travel through a queue under test
pub trait Message: Copy + Send + 'static {}

impl<T: Copy + Send + 'static> Message for T {}

/// Yields the next message to publish.
pub trait MessageCreator<T>: Default + Send {
    fn next(&mut self) -> T;
}

/// Observes every message a worker receives.
pub trait MessageConsumer<T>: Default + Send {
    fn consume(&mut self, value: &T);
}

/// Short type name used in benchmark keys, e.g. `u32` or `OrderBook`
pub fn type_label<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Integers that can count upwards
pub trait Counter: Message + Default {
    fn successor(self) -> Self;
}

macro_rules! impl_counter {
    ($($ty:ty),*) => {
        $(
            impl Counter for $ty {
                #[inline(always)]
                fn successor(self) -> Self {
                    self.wrapping_add(1)
                }
            }
        )*
    };
}

impl_counter!(u8, u16, u32, u64, usize);

/// Yields 0, 1, 2, ... per thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProduceIncremental<T> {
    next: T,
}

impl<T: Counter> MessageCreator<T> for ProduceIncremental<T> {
    #[inline]
    fn next(&mut self) -> T {
        let value = self.next;
        self.next = value.successor();
        value
    }
}

/// Yields `T::default()` forever.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProduceSameValue<T> {
    value: T,
}

impl<T: Message + Default> MessageCreator<T> for ProduceSameValue<T> {
    #[inline]
    fn next(&mut self) -> T {
        self.value
    }
}

/// Keeps the last received value so the read cannot be optimised away.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsumeAndStore<T> {
    last: T,
}

impl<T> ConsumeAndStore<T> {
    pub fn last(&self) -> &T {
        &self.last
    }
}

impl<T: Message + Default> MessageConsumer<T> for ConsumeAndStore<T> {
    #[inline]
    fn consume(&mut self, value: &T) {
        self.last = black_box(*value);
    }
}

/// Depth of each side of an [`OrderBook`]
pub const BOOK_DEPTH: usize = 20;

/// Fixed-size order book snapshot, a large `Copy` payload.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OrderBook {
    pub seq: u64,
    pub bid_prices: [u32; BOOK_DEPTH],
    pub bid_sizes: [u32; BOOK_DEPTH],
    pub ask_prices: [u32; BOOK_DEPTH],
    pub ask_sizes: [u32; BOOK_DEPTH],
}

/// Yields order books with an increasing sequence number, everything else zeroed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProduceFreshOrderBook {
    seq: u64,
}

impl MessageCreator<OrderBook> for ProduceFreshOrderBook {
    #[inline]
    fn next(&mut self) -> OrderBook {
        let book = OrderBook {
            seq: self.seq,
            ..OrderBook::default()
        };
        self.seq += 1;
        book
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_labels() {
        assert_eq!(type_label::<u32>(), "u32");
        assert_eq!(type_label::<OrderBook>(), "OrderBook");
    }

    #[test]
    fn test_incremental_counts_per_instance() {
        let mut a = ProduceIncremental::<u32>::default();
        let mut b = ProduceIncremental::<u32>::default();
        assert_eq!(a.next(), 0);
        assert_eq!(a.next(), 1);
        assert_eq!(b.next(), 0);
    }

    #[test]
    fn test_same_value() {
        let mut creator = ProduceSameValue::<u64>::default();
        assert_eq!(creator.next(), creator.next());
    }

    #[test]
    fn test_fresh_order_books() {
        let mut creator = ProduceFreshOrderBook::default();
        let first = creator.next();
        let second = creator.next();
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert_eq!(second.ask_sizes, [0; BOOK_DEPTH]);
    }

    #[test]
    fn test_consume_and_store_keeps_last() {
        let mut sink = ConsumeAndStore::<u32>::default();
        sink.consume(&4);
        sink.consume(&9);
        assert_eq!(*sink.last(), 9);
    }
}
