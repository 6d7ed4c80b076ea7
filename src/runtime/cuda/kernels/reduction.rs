//! Grid-wide add-reduction launchers and the two-pass host driver

use cudarc::driver::PushKernelArg;
use cudarc::driver::safe::{CudaContext, CudaStream};
use std::sync::Arc;

use super::{REDUCTION_MODULE, get_kernel_function, get_or_load_module, launch_config, launch_error};
use crate::array::Array;
use crate::error::{Error, Result};
use crate::runtime::RuntimeClient;
use crate::runtime::cuda::{CudaClient, CudaRuntime};

/// Block size of the reduction kernels (must match reduction.cu)
const REDUCE_BLOCK_SIZE: u32 = 512;

macro_rules! reduce_add_launcher {
    ($fn_name:ident, $kernel:literal) => {
        /// Launch one pass of the grid-wide add reduction.
        ///
        /// Writes one partial per block into `result`; `grid` blocks are
        /// launched, so `result` must hold at least `grid` elements.
        ///
        /// # Safety
        ///
        /// Caller must ensure all pointers are valid device pointers with
        /// correct sizes.
        pub unsafe fn $fn_name(
            context: &Arc<CudaContext>,
            stream: &CudaStream,
            device_index: usize,
            size: i32,
            source: u64,
            result: u64,
            grid: u32,
        ) -> Result<()> {
            let module = get_or_load_module(context, device_index, REDUCTION_MODULE)?;
            let func = get_kernel_function(&module, $kernel)?;
            let cfg = launch_config((grid, 1, 1), (REDUCE_BLOCK_SIZE, 1, 1), 0);

            let mut builder = stream.launch_builder(&func);
            builder.arg(&size);
            builder.arg(&source);
            builder.arg(&result);
            // SAFETY: pointers are valid device pointers (ensured by caller)
            unsafe { builder.launch(cfg) }.map_err(|e| launch_error($kernel, e))?;
            Ok(())
        }
    };
}

reduce_add_launcher!(launch_reduce_add_f32, "reduce_add_f32");
reduce_add_launcher!(launch_reduce_add_f64, "reduce_add_f64");
reduce_add_launcher!(launch_reduce_add_i32, "reduce_add_i32");
reduce_add_launcher!(launch_reduce_add_init_f32, "reduce_add_init_f32");
reduce_add_launcher!(launch_reduce_add_init_f64, "reduce_add_init_f64");
reduce_add_launcher!(launch_reduce_add_init_i32, "reduce_add_init_i32");

macro_rules! reduce_add_driver {
    ($fn_name:ident, $launcher:ident, $ty:ty) => {
        /// Sum an arbitrary-length device array.
        ///
        /// Runs the two-level reduction: one grid-wide pass into per-block
        /// partials when the input exceeds one block, then a single-block
        /// pass that leaves the scalar in a one-element array read back to
        /// the host.
        pub fn $fn_name(client: &CudaClient, source: &Array<CudaRuntime, $ty>) -> Result<$ty> {
            let size = source.len();
            if size == 0 {
                return Ok(<$ty>::default());
            }
            let size_i32 = i32::try_from(size).map_err(|_| {
                Error::invalid_argument("source", "array too large for i32 indexing")
            })?;
            let device_index = client.device().index();

            let block = REDUCE_BLOCK_SIZE as usize;
            let mut partials_handle = source.handle();
            let mut partials_len = size_i32;

            let block_results;
            if size > block {
                let n = size.div_ceil(block);
                let grid = n.min(block) as u32;
                block_results = Array::<CudaRuntime, $ty>::with_len(client, grid as usize);
                // SAFETY: handles come from live arrays sized above
                unsafe {
                    $launcher(
                        client.context(),
                        client.stream(),
                        device_index,
                        size_i32,
                        source.handle(),
                        block_results.handle(),
                        grid,
                    )?;
                }
                partials_handle = block_results.handle();
                partials_len = grid as i32;
            }

            let result = Array::<CudaRuntime, $ty>::with_len(client, 1);
            // SAFETY: handles come from live arrays sized above
            unsafe {
                $launcher(
                    client.context(),
                    client.stream(),
                    device_index,
                    partials_len,
                    partials_handle,
                    result.handle(),
                    1,
                )?;
            }

            let mut answer = [<$ty>::default()];
            result.copy_to_host(&mut answer);
            Ok(answer[0])
        }
    };
}

reduce_add_driver!(reduce_add_array_f32, launch_reduce_add_f32, f32);
reduce_add_driver!(reduce_add_array_f64, launch_reduce_add_f64, f64);
reduce_add_driver!(reduce_add_array_i32, launch_reduce_add_i32, i32);

macro_rules! reduce_add_init_driver {
    ($fn_name:ident, $launcher:ident, $init_launcher:ident, $ty:ty) => {
        /// Sum an arbitrary-length device array on top of `initial_value`.
        ///
        /// Same two-level scheme as the plain driver, except the final pass
        /// uses the accumulating kernel over a result slot seeded with the
        /// initial value.
        pub fn $fn_name(
            client: &CudaClient,
            source: &Array<CudaRuntime, $ty>,
            initial_value: $ty,
        ) -> Result<$ty> {
            let size = source.len();
            if size == 0 {
                return Ok(initial_value);
            }
            let size_i32 = i32::try_from(size).map_err(|_| {
                Error::invalid_argument("source", "array too large for i32 indexing")
            })?;
            let device_index = client.device().index();

            let block = REDUCE_BLOCK_SIZE as usize;
            let mut partials_handle = source.handle();
            let mut partials_len = size_i32;

            let block_results;
            if size > block {
                let n = size.div_ceil(block);
                let grid = n.min(block) as u32;
                block_results = Array::<CudaRuntime, $ty>::with_len(client, grid as usize);
                // SAFETY: handles come from live arrays sized above
                unsafe {
                    $launcher(
                        client.context(),
                        client.stream(),
                        device_index,
                        size_i32,
                        source.handle(),
                        block_results.handle(),
                        grid,
                    )?;
                }
                partials_handle = block_results.handle();
                partials_len = grid as i32;
            }

            let result = Array::<CudaRuntime, $ty>::from_slice(client, &[initial_value]);
            // SAFETY: handles come from live arrays sized above
            unsafe {
                $init_launcher(
                    client.context(),
                    client.stream(),
                    device_index,
                    partials_len,
                    partials_handle,
                    result.handle(),
                    1,
                )?;
            }

            let mut answer = [<$ty>::default()];
            result.copy_to_host(&mut answer);
            Ok(answer[0])
        }
    };
}

reduce_add_init_driver!(
    reduce_add_array_with_initial_value_f32,
    launch_reduce_add_f32,
    launch_reduce_add_init_f32,
    f32
);
reduce_add_init_driver!(
    reduce_add_array_with_initial_value_f64,
    launch_reduce_add_f64,
    launch_reduce_add_init_f64,
    f64
);
reduce_add_init_driver!(
    reduce_add_array_with_initial_value_i32,
    launch_reduce_add_i32,
    launch_reduce_add_init_i32,
    i32
);
