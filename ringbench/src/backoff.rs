//! Backoff strategies for spinning threads
//!
//! Every wait in ringbench is a busy-wait: a full queue, an empty queue, the
//! start barrier and the round-trip reply. A `Backoff` decides what a thread
//! does between two failed attempts. Each wait site creates a fresh value
//! with `Default`, calls `snooze()` after every miss and drops it once the
//! condition holds.
//!
//! | Strategy | Between attempts |
//! |----------|------------------|
//! | `BusySpin` | one spin-loop hint |
//! | `Pause<N>` | N spin-loop hints |
//! | `SpinThenYield` | growing spin bursts, then `yield_now` |
//! | `Snooze` | `crossbeam::utils::Backoff::snooze` |

use std::thread;

/// Policy for waiting between failed attempts of a spin loop
pub trait Backoff: Default + Send {
    /// Wait once after a failed attempt
    fn snooze(&mut self);

    /// Forget accumulated state, as if no attempt had failed yet
    fn reset(&mut self);
}

/// Tight spin - lowest latency, burns the core.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusySpin;

impl Backoff for BusySpin {
    #[inline(always)]
    fn snooze(&mut self) {
        std::hint::spin_loop();
    }

    #[inline(always)]
    fn reset(&mut self) {}
}

/// Fixed number of CPU pause hints per failed attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pause<const N: u32>;

impl<const N: u32> Backoff for Pause<N> {
    #[inline(always)]
    fn snooze(&mut self) {
        for _ in 0..N {
            std::hint::spin_loop();
        }
    }

    #[inline(always)]
    fn reset(&mut self) {}
}

/// Spin with exponentially growing bursts, then yield the CPU.
///
/// Mirrors a yielding wait strategy: the first `spin_limit` misses stay on
/// the core, later misses hand the time slice back to the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct SpinThenYield {
    step: u32,
    spin_limit: u32,
}

impl SpinThenYield {
    /// Default number of spinning steps before yielding
    pub const SPIN_LIMIT: u32 = 6;

    pub fn with_spin_limit(spin_limit: u32) -> Self {
        Self {
            step: 0,
            spin_limit,
        }
    }

    /// True once the strategy has started yielding
    pub fn is_yielding(&self) -> bool {
        self.step > self.spin_limit
    }
}

impl Default for SpinThenYield {
    fn default() -> Self {
        Self::with_spin_limit(Self::SPIN_LIMIT)
    }
}

impl Backoff for SpinThenYield {
    #[inline]
    fn snooze(&mut self) {
        if self.step <= self.spin_limit {
            for _ in 0..1u32 << self.step.min(10) {
                std::hint::spin_loop();
            }
            self.step += 1;
        } else {
            thread::yield_now();
        }
    }

    #[inline]
    fn reset(&mut self) {
        self.step = 0;
    }
}

/// Delegates to crossbeam's adaptive backoff.
#[derive(Debug, Default)]
pub struct Snooze(crossbeam::utils::Backoff);

impl Backoff for Snooze {
    #[inline]
    fn snooze(&mut self) {
        self.0.snooze();
    }

    #[inline]
    fn reset(&mut self) {
        self.0.reset();
    }
}

/// Spin on `ready` until it returns true, snoozing with `B` in between.
#[inline]
pub fn spin_until<B: Backoff>(mut ready: impl FnMut() -> bool) {
    if ready() {
        return;
    }
    let mut backoff = B::default();
    while !ready() {
        backoff.snooze();
    }
}
