//! CUDA kernel launchers
//!
//! - `loader` - PTX loading, per-device module caching, launch configs
//! - `reduction` - grid-wide add-reduction launchers and the two-pass driver
//! - `syncfree` - launchers for syncfree-scheduled kernels, with the
//!   occupancy check the protocol's liveness depends on
//!
//! The device-side building blocks live next to this module: `memory.cuh`
//! (acquire/release status words), `syncfree.cuh` (distributor + scheduler,
//! for downstream kernels to include), `reduction.cu` and `syncfree.cu`
//! (the kernels compiled to PTX by build.rs).

pub mod loader;
mod reduction;
mod syncfree;

pub use reduction::*;
pub use syncfree::*;

pub(crate) use loader::{get_kernel_function, get_or_load_module, launch_config};

use crate::error::Error;

/// Module name for reduction kernels
pub const REDUCTION_MODULE: &str = "reduction";

/// Module name for syncfree kernels
pub const SYNCFREE_MODULE: &str = "syncfree";

/// Create a launch error
#[inline]
pub(crate) fn launch_error(kernel_name: &str, e: impl std::fmt::Debug) -> Error {
    Error::Internal(format!("CUDA {} launch failed: {:?}", kernel_name, e))
}
