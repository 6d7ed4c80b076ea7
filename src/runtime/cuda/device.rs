//! CUDA device implementation
//!
//! Device abstraction plus the residency query the syncfree launch bound is
//! checked against.

use thiserror::Error;

use crate::runtime::Device;

/// Errors raised by the CUDA device and client layer.
///
/// Vendor status codes are folded into these categories; codes that do not
/// map to a known condition surface as [`CudaError::Unknown`].
#[derive(Error, Debug)]
pub enum CudaError {
    /// Device query or selection failed
    #[error("CUDA device error: {0}")]
    Device(String),

    /// Stream or context synchronization failed
    #[error("CUDA sync error: {0}")]
    Sync(String),

    /// Kernel module loading or launching failed
    #[error("CUDA launch error: {0}")]
    Launch(String),

    /// Unrecognized vendor status code
    #[error("Unknown CUDA error: {0}")]
    Unknown(String),
}

/// CUDA device using cudarc
///
/// Represents a single GPU and answers the occupancy queries the syncfree
/// launchers need.
#[derive(Clone, Debug)]
pub struct CudaDevice {
    /// Index of the GPU device (0, 1, 2, ...)
    pub(crate) index: usize,
}

impl CudaDevice {
    /// Create a new CUDA device
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    /// Index of this device (0, 1, 2, ...)
    pub fn index(&self) -> usize {
        self.index
    }

    fn attribute(
        &self,
        attr: cudarc::driver::sys::CUdevice_attribute,
    ) -> Result<i32, CudaError> {
        let device = cudarc::driver::result::device::get(self.index as i32).map_err(|e| {
            CudaError::Device(format!("Failed to get CUDA device {}: {:?}", self.index, e))
        })?;
        unsafe { cudarc::driver::result::device::get_attribute(device, attr) }
            .map_err(|e| CudaError::Device(format!("Failed to query {:?}: {:?}", attr, e)))
    }

    /// Get the compute capability of this CUDA device
    ///
    /// Returns (major, minor) version numbers (e.g., (8, 6) for sm_86).
    /// The syncfree protocol requires independent thread scheduling, i.e.
    /// compute capability 7.0 or newer.
    pub fn compute_capability(&self) -> Result<(u32, u32), CudaError> {
        use cudarc::driver::sys::CUdevice_attribute::*;
        let major = self.attribute(CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR)? as u32;
        let minor = self.attribute(CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR)? as u32;
        Ok((major, minor))
    }

    /// Upper bound on execution groups of `block_size` threads that can be
    /// resident at once.
    ///
    /// This is the liveness bound for syncfree launches: `wait` spins without
    /// yielding, so a launch must not create more groups than can run
    /// concurrently, or a waiting group can starve the unscheduled group it
    /// depends on. The estimate is conservative (threads only; it ignores
    /// register and shared-memory pressure, which can only lower the true
    /// bound - callers wanting an exact figure should use the occupancy API
    /// for their specific kernel).
    pub fn max_resident_groups(&self, block_size: usize) -> Result<usize, CudaError> {
        use cudarc::driver::sys::CUdevice_attribute::*;
        let sm_count = self.attribute(CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT)? as usize;
        let threads_per_sm =
            self.attribute(CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_MULTIPROCESSOR)? as usize;
        Ok(sm_count * (threads_per_sm / block_size.max(1)))
    }

    /// Get memory information for this device
    ///
    /// Returns (free_bytes, total_bytes) for the device's global memory.
    pub fn memory_info(&self) -> Result<(u64, u64), CudaError> {
        let (free, total) = cudarc::driver::result::mem_get_info().map_err(|e| {
            CudaError::Device(format!(
                "Failed to get memory info for device {}: {:?}",
                self.index, e
            ))
        })?;
        Ok((free as u64, total as u64))
    }

    /// Synchronize all operations on this device
    pub fn sync(&self) -> Result<(), CudaError> {
        cudarc::driver::result::ctx::synchronize().map_err(|e| {
            CudaError::Sync(format!(
                "Failed to synchronize CUDA context for device {}: {:?}",
                self.index, e
            ))
        })
    }
}

impl Device for CudaDevice {
    fn id(&self) -> usize {
        self.index
    }

    fn name(&self) -> String {
        format!("cuda:{}", self.index)
    }
}
