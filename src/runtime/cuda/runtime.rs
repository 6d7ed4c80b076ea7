//! CUDA runtime adapter

use super::client::{CudaAllocator, CudaClient, CudaRawHandle};
use super::device::CudaDevice;
use super::get_or_create_client;
use crate::runtime::{Allocator, Runtime, RuntimeClient};

/// CUDA runtime
///
/// Implements the generic Runtime trait for the CUDA backend.
#[derive(Clone, Debug, Default)]
pub struct CudaRuntime;

impl Runtime for CudaRuntime {
    type Device = CudaDevice;
    type Client = CudaClient;
    type Allocator = CudaAllocator;
    type RawHandle = CudaRawHandle;

    fn name() -> &'static str {
        "cuda"
    }

    fn allocate(size_bytes: usize, device: &Self::Device) -> u64 {
        let client = get_or_create_client(device);
        client.allocator().allocate(size_bytes)
    }

    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device) {
        let client = get_or_create_client(device);
        client.allocator().deallocate(ptr, size_bytes);
    }

    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) {
        if src.is_empty() || dst == 0 {
            return;
        }

        let client = get_or_create_client(device);

        unsafe {
            let result = cudarc::driver::sys::cuMemcpyHtoDAsync_v2(
                dst,
                src.as_ptr() as *const std::ffi::c_void,
                src.len(),
                client.stream.cu_stream(),
            );

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                panic!(
                    "CUDA host-to-device copy failed: {} bytes ({:?})",
                    src.len(),
                    result
                );
            }
        }

        // Synchronize so the host buffer can be released by the caller.
        client.synchronize();
    }

    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) {
        if dst.is_empty() || src == 0 {
            return;
        }

        let client = get_or_create_client(device);

        unsafe {
            let result = cudarc::driver::sys::cuMemcpyDtoHAsync_v2(
                dst.as_mut_ptr() as *mut std::ffi::c_void,
                src,
                dst.len(),
                client.stream.cu_stream(),
            );

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                panic!(
                    "CUDA device-to-host copy failed: {} bytes ({:?})",
                    dst.len(),
                    result
                );
            }
        }

        // Synchronize so the data is visible on the host.
        client.synchronize();
    }

    fn default_device() -> Self::Device {
        CudaDevice::new(0)
    }

    fn default_client(device: &Self::Device) -> Self::Client {
        get_or_create_client(device)
    }

    fn raw_handle(client: &Self::Client) -> &Self::RawHandle {
        &client.raw_handle
    }
}
