//! Start barrier shared by all workers of one trial.
//!
//! Each worker finishes its setup, arrives under its role and then spins
//! until every producer and every consumer has arrived. The first worker
//! allowed to record the start time wins a compare-and-swap on a sentinel,
//! so the timed window opens exactly once.

use std::marker::PhantomData;
use std::sync::atomic::{ AtomicU64, AtomicUsize, Ordering };
use std::time::{ Duration, Instant };

use crossbeam::utils::CachePadded;

use crate::backoff::{ spin_until, Backoff, SpinThenYield };
use crate::constants::START_UNSET;

/// Which side of the barrier a worker counts towards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::Consumer => "consumer",
        }
    }
}

pub struct RendezvousBarrier<B = SpinThenYield> {
    producers_expected: usize,
    consumers_expected: usize,
    producers_ready: CachePadded<AtomicUsize>,
    consumers_ready: CachePadded<AtomicUsize>,
    /// Start time as nanoseconds after `epoch`, `START_UNSET` until published
    start_ns: CachePadded<AtomicU64>,
    epoch: Instant,
    _backoff: PhantomData<fn() -> B>,
}

impl<B: Backoff> RendezvousBarrier<B> {
    pub fn new(producers: usize, consumers: usize) -> Self {
        Self {
            producers_expected: producers,
            consumers_expected: consumers,
            producers_ready: CachePadded::new(AtomicUsize::new(0)),
            consumers_ready: CachePadded::new(AtomicUsize::new(0)),
            start_ns: CachePadded::new(AtomicU64::new(START_UNSET)),
            epoch: Instant::now(),
            _backoff: PhantomData,
        }
    }

    /// Count the calling worker as ready.
    pub fn arrive(&self, role: Role) {
        let counter = match role {
            Role::Producer => &self.producers_ready,
            Role::Consumer => &self.consumers_ready,
        };
        counter.fetch_add(1, Ordering::AcqRel);
    }

    /// True once every expected worker has arrived
    pub fn is_open(&self) -> bool {
        self.producers_ready.load(Ordering::Acquire) >= self.producers_expected &&
            self.consumers_ready.load(Ordering::Acquire) >= self.consumers_expected
    }

    /// Spin until every expected worker has arrived.
    pub fn wait(&self) {
        spin_until::<B>(|| self.is_open());
    }

    pub fn arrive_and_wait(&self, role: Role) {
        self.arrive(role);
        self.wait();
    }

    /// Record "now" as the start time unless another worker already did.
    /// Returns true for the single winning caller.
    pub fn publish_start(&self) -> bool {
        let now = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(START_UNSET - 1);
        self.start_ns
            .compare_exchange(START_UNSET, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Published start time, if any
    pub fn start(&self) -> Option<Instant> {
        match self.start_ns.load(Ordering::Acquire) {
            START_UNSET => None,
            ns => Some(self.epoch + Duration::from_nanos(ns)),
        }
    }

    /// Time from the published start to `end`, at least one nanosecond.
    pub fn elapsed_until(&self, end: Instant) -> Option<Duration> {
        self.start().map(|start| end.saturating_duration_since(start).max(Duration::from_nanos(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BusySpin;
    use std::thread;

    #[test]
    fn test_opens_only_when_both_roles_arrive() {
        let barrier = RendezvousBarrier::<BusySpin>::new(1, 2);
        barrier.arrive(Role::Producer);
        barrier.arrive(Role::Consumer);
        assert!(!barrier.is_open());
        barrier.arrive(Role::Consumer);
        assert!(barrier.is_open());
    }

    #[test]
    fn test_start_is_published_once() {
        let barrier = RendezvousBarrier::<BusySpin>::new(1, 1);
        assert!(barrier.start().is_none());
        assert!(barrier.publish_start());
        let first = barrier.start().unwrap();
        assert!(!barrier.publish_start());
        assert_eq!(barrier.start(), Some(first));
    }

    #[test]
    fn test_single_winner_across_threads() {
        let barrier = RendezvousBarrier::<SpinThenYield>::new(4, 4);
        let winners = AtomicUsize::new(0);

        thread::scope(|s| {
            for i in 0..8 {
                let role = if i % 2 == 0 { Role::Producer } else { Role::Consumer };
                let barrier = &barrier;
                let winners = &winners;
                s.spawn(move || {
                    barrier.arrive_and_wait(role);
                    if barrier.publish_start() {
                        winners.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::Relaxed), 1);
        let elapsed = barrier.elapsed_until(Instant::now()).unwrap();
        assert!(elapsed >= Duration::from_nanos(1));
    }
}
