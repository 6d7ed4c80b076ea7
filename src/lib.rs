//! # sparlin
//!
//! **Syncfree scheduling and reduction kernels for sparse linear algebra.**
//!
//! sparlin provides the reusable concurrency core that sparse triangular and
//! incomplete-factorization kernels are built on: a single-launch, device-side
//! work distributor plus a spin-wait dependency protocol ("syncfree"
//! scheduling), and the group-level reduction primitives that compose with it.
//! The same API is exposed for the CPU backend and, behind the `cuda` feature,
//! for NVIDIA GPUs.
//!
//! ## Why syncfree?
//!
//! Classical level scheduling analyzes the dependency DAG on the host and
//! launches one kernel per level. Syncfree scheduling runs the whole DAG in a
//! single launch: each unit of work spin-waits on per-item completion flags
//! written by its predecessors, so no host round-trips or global barriers are
//! needed between dependency levels.
//!
//! ## Quick Start
//!
//! ```rust
//! use sparlin::prelude::*;
//! use sparlin::components::syncfree::SyncfreeStorage;
//! use sparlin::runtime::cpu::launch_syncfree;
//!
//! let device = CpuDevice::new();
//! let client = CpuRuntime::default_client(&device);
//!
//! // A chain of 8 work items, each waiting on its predecessor.
//! let mut status = Array::<CpuRuntime, i32>::new(&client);
//! let storage = SyncfreeStorage::new(&mut status, 8);
//! launch_syncfree::<64, 8, _>(&storage, 8, |sched| {
//!     let work_id = sched.work_id();
//!     if work_id > 0 {
//!         sched.wait(work_id - 1);
//!     }
//!     // ... per-item work goes here ...
//!     sched.mark_ready();
//! });
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): Multi-threaded CPU grid loops
//! - `cuda`: NVIDIA CUDA backend

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod array;
pub mod components;
pub mod error;
pub mod runtime;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::array::Array;
    pub use crate::error::{Error, Result};
    pub use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
    pub use crate::runtime::{Device, Runtime, RuntimeClient};

    #[cfg(feature = "cuda")]
    pub use crate::runtime::cuda::CudaRuntime;
}

/// Default runtime based on enabled features
///
/// - With `cuda` feature: `CudaRuntime`
/// - Otherwise: `CpuRuntime`
#[cfg(feature = "cuda")]
pub type DefaultRuntime = runtime::cuda::CudaRuntime;

/// Default runtime based on enabled features
#[cfg(not(feature = "cuda"))]
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
