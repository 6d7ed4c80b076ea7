//! Status-word memory protocol
//!
//! Completion flags in the syncfree protocol are plain integers published
//! with release stores and observed with acquire loads. Acquire/release is
//! the exact strength required: a relaxed load may observe a stale `PENDING`
//! indefinitely on architectures with non-coherent caches, while a stronger
//! fence buys nothing the protocol needs.
//!
//! Two scopes exist, mirroring the device memory hierarchy:
//!
//! - *global*: the status array shared by all execution groups
//! - *shared*: the group-local mirror, visible only within one group
//!
//! On the CPU both map to [`AtomicI32`]; keeping them as separate entry
//! points preserves the protocol's two-tier structure (and the GPU backends
//! genuinely distinguish the scopes).

use std::sync::atomic::{AtomicI32, Ordering};

/// A single completion flag.
pub type StatusWord = i32;

/// Work item not yet finished.
pub const PENDING: StatusWord = 0;

/// Work item finished; its results are visible to acquire loads.
pub const READY: StatusWord = 1;

/// Acquire-load a status word from the global status array.
#[inline]
pub fn load_acquire(word: &AtomicI32) -> StatusWord {
    word.load(Ordering::Acquire)
}

/// Release-store a status word into the global status array.
#[inline]
pub fn store_release(word: &AtomicI32, value: StatusWord) {
    word.store(value, Ordering::Release)
}

/// Acquire-load a status word from a group-local mirror.
#[inline]
pub fn load_acquire_shared(word: &AtomicI32) -> StatusWord {
    word.load(Ordering::Acquire)
}

/// Release-store a status word into a group-local mirror.
#[inline]
pub fn store_release_shared(word: &AtomicI32, value: StatusWord) {
    word.store(value, Ordering::Release)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_store_is_observed_by_acquire_load() {
        let word = AtomicI32::new(PENDING);
        assert_eq!(load_acquire(&word), PENDING);
        store_release(&word, READY);
        assert_eq!(load_acquire(&word), READY);
        assert_eq!(load_acquire_shared(&word), READY);
    }
}
