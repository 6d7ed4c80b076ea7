//! CUDA client implementation
//!
//! CudaClient owns the stream and context for direct cudarc access.
//!
//! # Thread Safety
//!
//! `CudaClient` is `Clone` and can be shared across threads. The underlying
//! CUDA context and stream are reference-counted via `Arc`. All launches must
//! go through `self.stream()` for correct ordering - this matters doubly for
//! syncfree kernels, where the status-array reset must precede the scheduled
//! kernel on the same stream.

use cudarc::driver::safe::{CudaContext, CudaStream};
use std::sync::Arc;

use super::CudaRuntime;
use super::device::{CudaDevice, CudaError};
use crate::runtime::{Allocator, RuntimeClient};

/// CUDA runtime client
///
/// Owns CUDA context and stream for kernel launches.
#[derive(Clone)]
pub struct CudaClient {
    /// GPU device index
    pub(crate) device: CudaDevice,

    /// CUDA context for this device (owns GPU context)
    pub(crate) context: Arc<CudaContext>,

    /// Stream on which all kernels launch
    pub(crate) stream: Arc<CudaStream>,

    /// Allocator for memory management
    pub(crate) allocator: CudaAllocator,

    /// Raw handle for custom kernel launching
    pub(crate) raw_handle: CudaRawHandle,
}

impl std::fmt::Debug for CudaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaClient")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl CudaClient {
    /// Create a client (context + stream) for a device.
    pub fn new(device: CudaDevice) -> Result<Self, CudaError> {
        let context = CudaContext::new(device.index).map_err(|e| {
            CudaError::Device(format!(
                "Failed to create CUDA context for device {}: {:?}",
                device.index, e
            ))
        })?;
        let stream = context.new_stream().map_err(|e| {
            CudaError::Device(format!(
                "Failed to create CUDA stream for device {}: {:?}",
                device.index, e
            ))
        })?;
        let allocator = CudaAllocator {
            stream: stream.clone(),
        };
        let raw_handle = CudaRawHandle {
            context: context.clone(),
            stream: stream.clone(),
        };
        Ok(Self {
            device,
            context,
            stream,
            allocator,
            raw_handle,
        })
    }

    /// The context this client's launches run in.
    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }

    /// The stream all launches are ordered on.
    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }
}

impl RuntimeClient<CudaRuntime> for CudaClient {
    fn device(&self) -> &CudaDevice {
        &self.device
    }

    fn synchronize(&self) {
        if let Err(e) = self.stream.synchronize() {
            eprintln!("[sparlin::cuda] stream synchronize failed: {:?}", e);
        }
    }

    fn allocator(&self) -> &CudaAllocator {
        &self.allocator
    }
}

/// Raw context/stream pair, the escape hatch for downstream kernels that
/// instantiate the syncfree scheduler in their own device code.
#[derive(Clone)]
pub struct CudaRawHandle {
    /// CUDA context
    pub context: Arc<CudaContext>,
    /// Launch stream
    pub stream: Arc<CudaStream>,
}

/// CUDA allocator using stream-ordered allocation.
///
/// Uses `cuMemAllocAsync` / `cuMemFreeAsync` so allocation and release order
/// with kernel execution on the associated stream.
///
/// # Panics
///
/// `allocate` panics if CUDA memory allocation fails; GPU OOM is treated as
/// unrecoverable.
#[derive(Clone)]
pub struct CudaAllocator {
    stream: Arc<CudaStream>,
}

impl Allocator for CudaAllocator {
    fn allocate(&self, size_bytes: usize) -> u64 {
        if size_bytes == 0 {
            return 0;
        }

        unsafe {
            let mut ptr: u64 = 0;
            let result = cudarc::driver::sys::cuMemAllocAsync(
                &mut ptr,
                size_bytes,
                self.stream.cu_stream(),
            );

            if result == cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                return ptr;
            }

            // First attempt failed - sync the stream to flush pending frees,
            // then retry once.
            let _ = self.stream.synchronize();
            let result = cudarc::driver::sys::cuMemAllocAsync(
                &mut ptr,
                size_bytes,
                self.stream.cu_stream(),
            );

            if result == cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                return ptr;
            }

            panic!(
                "Out of memory: failed to allocate {} bytes on CUDA device ({:?})",
                size_bytes, result
            );
        }
    }

    fn deallocate(&self, ptr: u64, _size_bytes: usize) {
        if ptr == 0 {
            return;
        }

        unsafe {
            let result = cudarc::driver::sys::cuMemFreeAsync(ptr, self.stream.cu_stream());

            // Deallocation failures are typically benign (context teardown);
            // log instead of panicking.
            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                super::log_cuda_memory_error("cuMemFreeAsync", ptr, result);
            }
        }
    }
}
