//! Error types for sparlin
//!
//! The syncfree core itself is infallible by design: its only failure mode is
//! a deadlock caused by caller misuse (dependencies that are not strictly
//! descending, or a GPU launch that exceeds concurrent residency), which
//! manifests as a hang rather than an error value. The taxonomy below covers
//! the fallible surroundings: allocation, host/device transfers, kernel
//! loading and launching, and vendor status codes.

use thiserror::Error;

/// Result type alias using sparlin's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sparlin operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Index out of bounds
    #[error("Index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Length of the array
        len: usize,
    },

    /// Out of memory
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),

    /// CUDA driver error (translated from cudarc)
    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] cudarc::driver::DriverError),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }
}
