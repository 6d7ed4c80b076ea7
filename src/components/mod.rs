//! Backend-independent kernel components
//!
//! These are the building blocks that dependency-ordered sparse kernels
//! (triangular solves, incomplete factorizations, approximate-inverse
//! generation) are assembled from:
//!
//! - [`memory`] - acquire/release status-word protocol
//! - [`syncfree`] - atomic work distributor + spin-wait dependency scheduler
//! - [`reduction`] - subgroup/group reductions and grid-wide accumulation
//! - [`fill_array`] - flat fill pass (resets status arrays between launches)
//!
//! The modules here are the CPU rendition; the CUDA backend carries the same
//! protocol in `src/runtime/cuda/kernels/*.cuh` with identical semantics.

pub mod fill_array;
pub mod memory;
pub mod reduction;
pub mod syncfree;
