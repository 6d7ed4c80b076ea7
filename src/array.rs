//! Flat device arrays
//!
//! `Array<R, T>` is the memory collaborator the kernel components operate on:
//! a flat, typed allocation on one device, with `resize_and_reset` semantics
//! matching what the syncfree status array needs (resizing never preserves
//! contents; the caller runs a fill pass before each launch).

use std::marker::PhantomData;

use crate::runtime::{Allocator, Runtime, RuntimeClient};

/// A flat, typed array owned by one runtime device.
///
/// The backing allocation is identified by an opaque `u64` handle (a raw
/// pointer for the CPU backend, a device pointer for CUDA), which is what the
/// kernel launchers consume.
pub struct Array<R: Runtime, T: Copy + 'static> {
    client: R::Client,
    handle: u64,
    len: usize,
    _marker: PhantomData<T>,
}

impl<R: Runtime, T: Copy + 'static> Array<R, T> {
    /// Create an empty array associated with a client.
    pub fn new(client: &R::Client) -> Self {
        Self {
            client: client.clone(),
            handle: 0,
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Create an array of `len` elements. Contents are unspecified until the
    /// first fill or copy.
    pub fn with_len(client: &R::Client, len: usize) -> Self {
        let mut array = Self::new(client);
        array.resize_and_reset(len);
        array
    }

    /// Create an array initialized from a host slice.
    pub fn from_slice(client: &R::Client, data: &[T]) -> Self {
        let mut array = Self::with_len(client, data.len());
        array.copy_from_host(data);
        array
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Opaque handle to the backing allocation (0 when empty).
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// The client this array was allocated through.
    pub fn client(&self) -> &R::Client {
        &self.client
    }

    /// Resize to `len` elements, discarding any previous contents.
    ///
    /// A no-op when the length already matches; otherwise the old allocation
    /// is released and a fresh one is made. Contents after a resize are
    /// unspecified, so callers run their fill pass afterwards (the syncfree
    /// storage constructor does exactly that).
    pub fn resize_and_reset(&mut self, len: usize) {
        if len == self.len {
            return;
        }
        self.release();
        if len > 0 {
            self.handle = self.client.allocator().allocate(len * std::mem::size_of::<T>());
        }
        self.len = len;
    }

    /// Copy `data` from the host into the array. Lengths must match.
    pub fn copy_from_host(&mut self, data: &[T]) {
        assert_eq!(data.len(), self.len, "host slice length mismatch");
        if self.len == 0 {
            return;
        }
        // SAFETY: T is Copy ('plain old data' for every T used here), so its
        // bytes can be transferred verbatim.
        let bytes = unsafe {
            std::slice::from_raw_parts(data.as_ptr() as *const u8, std::mem::size_of_val(data))
        };
        R::copy_to_device(bytes, self.handle, self.client.device());
    }

    /// Copy the array into `out` on the host. Lengths must match.
    pub fn copy_to_host(&self, out: &mut [T]) {
        assert_eq!(out.len(), self.len, "host slice length mismatch");
        if self.len == 0 {
            return;
        }
        // SAFETY: same representation argument as in `copy_from_host`.
        let bytes = unsafe {
            std::slice::from_raw_parts_mut(
                out.as_mut_ptr() as *mut u8,
                std::mem::size_of_val(out),
            )
        };
        R::copy_from_device(self.handle, bytes, self.client.device());
    }

    /// Read the array back into a freshly allocated `Vec`.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Default,
    {
        let mut out = vec![T::default(); self.len];
        self.copy_to_host(&mut out);
        out
    }

    fn release(&mut self) {
        if self.handle != 0 {
            self.client
                .allocator()
                .deallocate(self.handle, self.len * std::mem::size_of::<T>());
            self.handle = 0;
        }
        self.len = 0;
    }
}

impl<R: Runtime, T: Copy + 'static> Drop for Array<R, T> {
    fn drop(&mut self) {
        self.release();
    }
}

// The handle is exclusively owned by this array; cross-thread access goes
// through the backends' own synchronization.
unsafe impl<R: Runtime, T: Copy + Send + 'static> Send for Array<R, T> {}
unsafe impl<R: Runtime, T: Copy + Sync + 'static> Sync for Array<R, T> {}

mod cpu_access {
    use super::Array;
    use crate::runtime::cpu::CpuRuntime;
    use std::sync::atomic::AtomicI32;

    impl<T: Copy + 'static> Array<CpuRuntime, T> {
        /// Borrow the CPU allocation as a host slice.
        pub fn as_slice(&self) -> &[T] {
            if self.len == 0 {
                return &[];
            }
            // SAFETY: the handle is a live, aligned host allocation of
            // exactly `len` elements, exclusively owned by this array.
            unsafe { std::slice::from_raw_parts(self.handle as *const T, self.len) }
        }

        /// Borrow the CPU allocation as a mutable host slice.
        pub fn as_mut_slice(&mut self) -> &mut [T] {
            if self.len == 0 {
                return &mut [];
            }
            // SAFETY: as `as_slice`, plus `&mut self` guarantees uniqueness.
            unsafe { std::slice::from_raw_parts_mut(self.handle as *mut T, self.len) }
        }
    }

    impl Array<CpuRuntime, i32> {
        /// Reinterpret the allocation as atomic status words.
        ///
        /// This is the seam between the flat-array collaborator and the
        /// status-word protocol: the scheduler only ever touches status
        /// memory through acquire/release atomics.
        pub fn as_atomic_words(&self) -> &[AtomicI32] {
            if self.len == 0 {
                return &[];
            }
            // SAFETY: AtomicI32 has the same size and alignment as i32, and
            // all concurrent access goes through atomic operations.
            unsafe { std::slice::from_raw_parts(self.handle as *const AtomicI32, self.len) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    fn client() -> <CpuRuntime as Runtime>::Client {
        CpuRuntime::default_client(&CpuDevice::new())
    }

    #[test]
    fn round_trip_through_device() {
        let client = client();
        let array = Array::<CpuRuntime, f64>::from_slice(&client, &[1.0, 2.5, -3.0]);
        assert_eq!(array.to_vec(), vec![1.0, 2.5, -3.0]);
    }

    #[test]
    fn resize_discards_and_reallocates() {
        let client = client();
        let mut array = Array::<CpuRuntime, i32>::from_slice(&client, &[7; 16]);
        array.resize_and_reset(4);
        assert_eq!(array.len(), 4);
        array.resize_and_reset(0);
        assert!(array.is_empty());
        assert_eq!(array.handle(), 0);
    }
}
