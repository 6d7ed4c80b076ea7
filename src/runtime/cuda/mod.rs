//! CUDA runtime implementation
//!
//! GPU acceleration via NVIDIA CUDA using cudarc. The syncfree protocol and
//! the reduction primitives live in device code (`kernels/*.cuh`, compiled to
//! PTX by build.rs); this module provides the host side: device and client
//! management, flat memory, and type-safe kernel launchers.
//!
//! # Panics
//!
//! Allocation and transfer failures panic (CUDA OOM is typically
//! unrecoverable); kernel loading and launching return `Result`.

mod client;
mod device;
pub mod kernels;
mod runtime;

pub use client::{CudaAllocator, CudaClient, CudaRawHandle};
pub use device::{CudaDevice, CudaError};
pub use runtime::CudaRuntime;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

/// Global client cache: device index -> cached CudaClient
///
/// Caches CudaClient instances per device to avoid creating new CUDA
/// contexts and streams on every launch.
static CLIENT_CACHE: OnceLock<Mutex<HashMap<usize, CudaClient>>> = OnceLock::new();

/// Safely lock the client cache, recovering from poisoned mutex.
///
/// Cache operations are idempotent, so recovering the guard after a panic in
/// another thread is sound.
#[inline]
fn lock_client_cache(
    cache: &Mutex<HashMap<usize, CudaClient>>,
) -> MutexGuard<'_, HashMap<usize, CudaClient>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Get or create a cached CudaClient for a device.
pub(crate) fn get_or_create_client(device: &CudaDevice) -> CudaClient {
    let cache = CLIENT_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = lock_client_cache(cache);

    if let Some(client) = guard.get(&device.index) {
        return client.clone();
    }

    let client = CudaClient::new(device.clone()).expect("Failed to create CUDA client");
    guard.insert(device.index, client.clone());

    client
}

/// Check whether at least one CUDA device is usable.
pub fn is_cuda_available() -> bool {
    cudarc::driver::safe::CudaContext::device_count()
        .map(|count| count > 0)
        .unwrap_or(false)
}

/// Log a CUDA memory operation failure.
///
/// Uses stderr with a consistent prefix for easy filtering.
#[cold]
#[inline(never)]
pub(crate) fn log_cuda_memory_error(
    operation: &str,
    ptr: u64,
    result: cudarc::driver::sys::CUresult,
) {
    eprintln!(
        "[sparlin::cuda] {} failed for ptr 0x{:x}: {:?}",
        operation, ptr, result
    );
}
