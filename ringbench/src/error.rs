//! Error types for ringbench.

use thiserror::Error;

use crate::bench::BenchmarkKey;

/// Result type alias for ringbench operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Main error type for ringbench
#[derive(Error, Debug)]
pub enum BenchError {
    /// I/O errors while writing reports
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration parameter, raised before any worker starts
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Produced/consumed message accounting did not add up.
    /// The subject queue dropped or duplicated messages, so any timing
    /// collected alongside it is meaningless.
    #[error("benchmark [{benchmark}] violated a run invariant: {message}")]
    RunInvariantViolation {
        /// Rendered composite key of the offending benchmark
        benchmark: String,
        /// What did not add up
        message: String,
    },

    /// A producer or consumer worker panicked
    #[error("{role} worker thread panicked")]
    WorkerPanicked {
        /// Role of the worker that panicked
        role: &'static str,
    },

    /// CPU affinity errors
    #[error("CPU affinity error: {message}")]
    CpuAffinity {
        /// Error message describing the affinity issue
        message: String,
    },
}

impl BenchError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a new run invariant violation for the given benchmark
    pub fn invariant(key: &BenchmarkKey, message: impl Into<String>) -> Self {
        Self::RunInvariantViolation {
            benchmark: key.to_string(),
            message: message.into(),
        }
    }

    /// Create a new CPU affinity error
    pub fn cpu_affinity(message: impl Into<String>) -> Self {
        Self::CpuAffinity {
            message: message.into(),
        }
    }

    /// Check if this error came from validating configuration
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// Check if this error signals an incorrect subject queue
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::RunInvariantViolation { .. })
    }
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::BenchError::config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::BenchmarkKey;

    #[test]
    fn test_error_creation() {
        let err = BenchError::config("test message");
        assert!(err.is_config_error());
        assert!(!err.is_invariant_violation());
    }

    #[test]
    fn test_invariant_names_the_benchmark() {
        let key = BenchmarkKey::new("spsc_u32", "batched_spsc", 1024, "u32", 1, 1);
        let err = BenchError::invariant(&key, "consumed 9 of 10");
        assert!(err.is_invariant_violation());

        let rendered = err.to_string();
        assert!(rendered.contains("spsc_u32"));
        assert!(rendered.contains("batched_spsc"));
        assert!(rendered.contains("consumed 9 of 10"));
    }

    #[test]
    fn test_error_macros() {
        let err = config_error!("capacity {} is not a power of two", 1000);
        assert!(matches!(err, BenchError::InvalidConfig { .. }));
        assert!(err.to_string().contains("1000"));
    }
}
