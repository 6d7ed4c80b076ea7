//! CPU runtime implementation
//!
//! The CPU backend runs the same kernel components as the GPU backends, with
//! execution groups mapped to OS threads. It is the reference rendition of
//! the syncfree protocol and the one exercised by the test suite.

mod client;
mod device;
mod launch;
mod runtime;

pub use client::{CpuAllocator, CpuClient};
pub use device::CpuDevice;
pub use launch::{launch_syncfree, max_concurrent_groups};
pub use runtime::CpuRuntime;
