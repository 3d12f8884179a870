//! Ringbench Constants
//!
//! Sizes and thresholds shared by the queues and the benchmark engine.

use static_assertions::const_assert;

/// Cache line size for alignment (64 bytes on most CPUs)
pub const CACHE_LINE_SIZE: usize = 64;

/// Bytes the batched consumer copies into its staging buffer in one go
pub const STAGING_BUFFER_BYTES: usize = 256;

/// Default number of checkpoints per ring lap when no batch size is given
pub const DEFAULT_BATCHES_PER_RING: usize = 4;

/// Percentile estimates below this sample size are unreliable
pub const MIN_ITERATIONS: usize = 100;

/// Percentiles reported for every benchmark key, in percent
pub const PERCENTILES: [usize; 4] = [50, 75, 90, 99];

/// Sentinel for "start timestamp not yet published"
pub const START_UNSET: u64 = u64::MAX;

const_assert!(CACHE_LINE_SIZE.is_power_of_two());
const_assert!(STAGING_BUFFER_BYTES % CACHE_LINE_SIZE == 0);
const_assert!(DEFAULT_BATCHES_PER_RING.is_power_of_two());
