//! Launchers for syncfree-scheduled kernels
//!
//! Downstream numerical kernels include `syncfree.cuh` and write their own
//! launchers in this shape. The chain-sum launchers here drive the built-in
//! protocol-validation kernels.

use cudarc::driver::PushKernelArg;
use cudarc::driver::safe::{CudaContext, CudaStream};
use std::sync::Arc;

use super::{SYNCFREE_MODULE, get_kernel_function, get_or_load_module, launch_config, launch_error};
use crate::error::{Error, Result};
use crate::runtime::cuda::CudaDevice;

/// Block size of the chain kernels (must match syncfree.cu)
const CHAIN_BLOCK_SIZE: u32 = 256;

/// Subgroup size of the chain kernels (must match syncfree.cu)
const CHAIN_SUBGROUP_SIZE: u32 = 32;

/// Check a syncfree launch against the device's concurrent-residency bound.
///
/// `wait` spins without yielding, so a launch that creates more groups than
/// can be resident at once can deadlock: a waiting group occupies an
/// execution slot while its unscheduled predecessor starves. That failure
/// manifests as a hang, never as a wrong answer, so the bound is enforced
/// here as an error before the launch.
pub fn check_syncfree_occupancy(
    device: &CudaDevice,
    num_groups: usize,
    block_size: usize,
) -> Result<()> {
    let bound = device
        .max_resident_groups(block_size)
        .map_err(|e| Error::Backend(e.to_string()))?;
    if num_groups > bound {
        return Err(Error::invalid_argument(
            "num_work_items",
            format!(
                "syncfree launch needs {} concurrently resident groups but the \
                 device supports at most {}; a larger launch can spin-deadlock",
                num_groups, bound
            ),
        ));
    }
    Ok(())
}

macro_rules! chain_sum_launcher {
    ($fn_name:ident, $kernel:literal) => {
        /// Launch the syncfree chain-sum validation kernel.
        ///
        /// `status` must point to `num_items + 1` zero-filled words (flags
        /// plus trailing counter). Work item `w` waits on `w - 1`, adds
        /// `source[w]` to the running sum, and marks itself ready.
        ///
        /// # Safety
        ///
        /// Caller must ensure all pointers are valid device pointers with
        /// correct sizes.
        pub unsafe fn $fn_name(
            context: &Arc<CudaContext>,
            stream: &CudaStream,
            device: &CudaDevice,
            status: u64,
            source: u64,
            running: u64,
            num_items: i32,
        ) -> Result<()> {
            let items_per_group = (CHAIN_BLOCK_SIZE / CHAIN_SUBGROUP_SIZE) as u32;
            let grid = (num_items as u32).div_ceil(items_per_group);
            check_syncfree_occupancy(device, grid as usize, CHAIN_BLOCK_SIZE as usize)?;

            let module = get_or_load_module(context, device.index(), SYNCFREE_MODULE)?;
            let func = get_kernel_function(&module, $kernel)?;
            let cfg = launch_config((grid, 1, 1), (CHAIN_BLOCK_SIZE, 1, 1), 0);

            let mut builder = stream.launch_builder(&func);
            builder.arg(&status);
            builder.arg(&source);
            builder.arg(&running);
            builder.arg(&num_items);
            // SAFETY: pointers are valid device pointers (ensured by caller)
            unsafe { builder.launch(cfg) }.map_err(|e| launch_error($kernel, e))?;
            Ok(())
        }
    };
}

chain_sum_launcher!(launch_syncfree_chain_sum_f32, "syncfree_chain_sum_f32");
chain_sum_launcher!(launch_syncfree_chain_sum_f64, "syncfree_chain_sum_f64");
