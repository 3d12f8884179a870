//! # ringbench-test-support
//!
//! Testing infrastructure for ringbench.
//!
//! ## Components
//!
//! - **SequenceChecker** - verifies a consumer sees 0, 1, 2, ... in order
//! - **FaultyQueue** - mutex-guarded queue adapter with pluggable faults
//!   (duplicated messages, scheduling jitter) to exercise the run invariants
//! - **StressRunner** - duration-bound SPSC runs with ordering checks

pub mod chaos;
pub mod stress;
pub mod verify;

pub use chaos::{ DuplicateEvery, Fault, FaultyQueue, Jitter, NoFault };
pub use stress::{ StressConfig, StressMetrics, StressRunner };
pub use verify::SequenceChecker;
