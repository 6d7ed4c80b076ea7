//! Syncfree scheduling
//!
//! A single-launch replacement for level scheduling: instead of analyzing the
//! dependency DAG on the host and launching one kernel per level, every
//! execution group draws a globally unique work id from an atomic counter and
//! spin-waits on per-item completion flags written by its predecessors.
//!
//! # Protocol
//!
//! The caller owns a status array of `N + 1` words: one flag per work item
//! plus a trailing slot used as the work counter. [`SyncfreeStorage::new`]
//! resets the whole array to `PENDING` before a launch. During the launch
//! each flag transitions `PENDING -> READY` exactly once and is never reset.
//!
//! Work ids are issued in order of arrival at the counter, which decouples
//! logical work order from whatever order the platform happens to schedule
//! groups in. Correctness then only requires the caller's dependency indices
//! to be strictly smaller than the waiter's own work id; out-of-order or
//! self dependencies deadlock (the protocol does not detect cycles).
//!
//! # Liveness
//!
//! `wait` is a busy spin with no cancellation and no timeout. On GPUs this
//! requires every group with an unfinished predecessor to be concurrently
//! resident, so launches must stay within the device's occupancy bound (see
//! the CUDA launchers). The CPU executor is immune: the OS preempts spinning
//! threads, and the monotonic distributor guarantees the smallest unfinished
//! work item can always run.

use std::sync::atomic::{AtomicI32, Ordering};

use smallvec::SmallVec;

use super::memory::{
    PENDING, READY, StatusWord, load_acquire, load_acquire_shared, store_release,
    store_release_shared,
};
use crate::array::Array;
use crate::runtime::cpu::CpuRuntime;

/// Number of work items an execution group services.
pub const fn local_dependency_count(block_size: usize, subgroup_size: usize) -> usize {
    block_size / subgroup_size
}

/// Status array plus work counter, borrowed from a caller-owned [`Array`].
///
/// Layout matches the protocol: `num_elements` flags followed by one counter
/// slot. The borrow lasts for one launch; afterwards the caller can read the
/// array back (all flags `READY`, counter equal to the number of groups that
/// ran - observable for diagnostics, not required for correctness).
#[derive(Clone, Copy)]
pub struct SyncfreeStorage<'a> {
    status: &'a [AtomicI32],
    counter: &'a AtomicI32,
}

impl<'a> SyncfreeStorage<'a> {
    /// Size the backing array to `num_elements + 1` words and reset every
    /// word to `PENDING` through the fill pass.
    pub fn new(
        status_array: &'a mut Array<CpuRuntime, StatusWord>,
        num_elements: usize,
    ) -> Self {
        status_array.resize_and_reset(num_elements + 1);
        super::fill_array::fill_array(status_array.as_mut_slice(), PENDING);
        let words = status_array.as_atomic_words();
        let (status, counter) = words.split_at(num_elements);
        Self {
            status,
            counter: &counter[0],
        }
    }

    /// Build storage directly over a slice of `num_elements + 1` atomic
    /// words. The caller is responsible for the reset-to-`PENDING` pass.
    pub fn from_words(words: &'a [AtomicI32]) -> Self {
        assert!(!words.is_empty(), "status array needs a counter slot");
        let (status, counter) = words.split_at(words.len() - 1);
        Self {
            status,
            counter: &counter[0],
        }
    }

    /// Number of work items this storage covers.
    pub fn num_work_items(&self) -> usize {
        self.status.len()
    }

    /// Whether `item`'s results are published (acquire read of its flag).
    ///
    /// This is the view downstream kernels consume after a launch.
    pub fn ready(&self, item: i64) -> bool {
        load_acquire(&self.status[item as usize]) == READY
    }

    /// Current counter value, i.e. the number of groups issued so far.
    pub fn groups_issued(&self) -> StatusWord {
        self.counter.load(Ordering::Relaxed)
    }

    /// Draw the next block offset from the work counter.
    ///
    /// Exactly one representative per execution group calls this once. Only
    /// uniqueness and monotonicity matter here, so a relaxed increment is
    /// sufficient; publication of results goes through the status flags.
    pub fn grab_block_offset(&self, block_size: usize) -> i64 {
        self.counter.fetch_add(1, Ordering::Relaxed) as i64 * block_size as i64
    }

    pub(crate) fn status(&self) -> &'a [AtomicI32] {
        self.status
    }
}

/// Group-local mirror of the status flags for the work items this group
/// services, giving same-group dependency checks without global traffic.
///
/// Arena-style storage scoped to one execution group: created when the group
/// starts, dropped when it retires. Capacity is `block_size / subgroup_size`.
pub struct SharedStorage<const BLOCK_SIZE: usize, const SUBGROUP_SIZE: usize> {
    status: SmallVec<[AtomicI32; 16]>,
}

impl<const BLOCK_SIZE: usize, const SUBGROUP_SIZE: usize> SharedStorage<BLOCK_SIZE, SUBGROUP_SIZE> {
    /// Create a mirror with every slot `PENDING`.
    pub fn new() -> Self {
        assert!(
            SUBGROUP_SIZE > 0 && BLOCK_SIZE % SUBGROUP_SIZE == 0,
            "subgroup size must evenly divide block size"
        );
        let count = local_dependency_count(BLOCK_SIZE, SUBGROUP_SIZE);
        Self {
            status: (0..count).map(|_| AtomicI32::new(PENDING)).collect(),
        }
    }
}

impl<const BLOCK_SIZE: usize, const SUBGROUP_SIZE: usize> Default
    for SharedStorage<BLOCK_SIZE, SUBGROUP_SIZE>
{
    fn default() -> Self {
        Self::new()
    }
}

/// Per-subgroup scheduling context.
///
/// One scheduler exists per (execution group, subgroup) pair; its work id is
/// computed once from the group's block offset and cached for the lifetime of
/// the subgroup. `BLOCK_SIZE` and `SUBGROUP_SIZE` are compile-time launch
/// parameters; the subgroup size must evenly divide the block size.
pub struct SyncfreeScheduler<'a, const BLOCK_SIZE: usize, const SUBGROUP_SIZE: usize> {
    global: SyncfreeStorage<'a>,
    local: &'a SharedStorage<BLOCK_SIZE, SUBGROUP_SIZE>,
    work_id: i64,
    block_id: i64,
}

impl<'a, const BLOCK_SIZE: usize, const SUBGROUP_SIZE: usize>
    SyncfreeScheduler<'a, BLOCK_SIZE, SUBGROUP_SIZE>
{
    /// Build the scheduler for one subgroup of a group that drew
    /// `block_offset` from the distributor.
    ///
    /// Called by the backend executors (see `runtime::cpu::launch_syncfree`);
    /// kernels receive the scheduler ready-made.
    pub fn new(
        global: SyncfreeStorage<'a>,
        local: &'a SharedStorage<BLOCK_SIZE, SUBGROUP_SIZE>,
        block_offset: i64,
        local_subgroup: usize,
    ) -> Self {
        debug_assert!(local_subgroup < local_dependency_count(BLOCK_SIZE, SUBGROUP_SIZE));
        let block_id = block_offset / BLOCK_SIZE as i64;
        let work_id = (block_offset + (local_subgroup * SUBGROUP_SIZE) as i64) / SUBGROUP_SIZE as i64;
        Self {
            global,
            local,
            work_id,
            block_id,
        }
    }

    /// The globally unique work id this subgroup services.
    pub fn work_id(&self) -> i64 {
        self.work_id
    }

    /// The logical block id of the owning execution group.
    pub fn block_id(&self) -> i64 {
        self.block_id
    }

    /// Spin until `dependency` is `READY`.
    ///
    /// Same-group dependencies are polled on the shared mirror, everything
    /// else on the global array. The designated lane polls; the subgroup then
    /// synchronizes so every lane observes the same outcome (on the CPU the
    /// subgroup runs on a single thread, so the barrier is implicit).
    ///
    /// `dependency` must be strictly smaller than this subgroup's own work
    /// id; anything else deadlocks.
    pub fn wait(&self, dependency: i64) {
        debug_assert!(dependency < self.work_id, "dependency must precede waiter");
        let deps_per_block = local_dependency_count(BLOCK_SIZE, SUBGROUP_SIZE) as i64;
        let dep_block = dependency / deps_per_block;
        let dep_local = (dependency % deps_per_block) as usize;
        let mut spins = 0u32;
        if dep_block == self.block_id {
            // wait for a local dependency
            while load_acquire_shared(&self.local.status[dep_local]) != READY {
                relax(&mut spins);
            }
        } else {
            // wait for a global dependency
            while load_acquire(&self.global.status()[dependency as usize]) != READY {
                relax(&mut spins);
            }
        }
    }

    /// Single non-blocking probe of `dependency`'s flag.
    ///
    /// Unlike [`wait`](Self::wait) there is no synchronization barrier after
    /// the read. Use the result for control flow only (skip-ahead, work
    /// stealing); feeding it into values read by multiple lanes risks
    /// undefined divergence, since different lanes may observe different
    /// answers.
    pub fn peek(&self, dependency: i64) -> bool {
        debug_assert!(dependency < self.work_id, "dependency must precede waiter");
        let deps_per_block = local_dependency_count(BLOCK_SIZE, SUBGROUP_SIZE) as i64;
        let dep_block = dependency / deps_per_block;
        let dep_local = (dependency % deps_per_block) as usize;
        if dep_block == self.block_id {
            load_acquire_shared(&self.local.status[dep_local]) == READY
        } else {
            load_acquire(&self.global.status()[dependency as usize]) == READY
        }
    }

    /// Publish this work item as finished.
    ///
    /// The subgroup synchronizes first so all lanes' result writes precede
    /// the flag stores; the designated lane then release-stores `READY` into
    /// the shared mirror (for same-group dependents) and the global array
    /// (for everyone else). Must be called exactly once per work item.
    pub fn mark_ready(&self) {
        let deps_per_block = local_dependency_count(BLOCK_SIZE, SUBGROUP_SIZE) as i64;
        let sh_id = (self.work_id % deps_per_block) as usize;
        // notify local subgroups
        store_release_shared(&self.local.status[sh_id], READY);
        // notify other blocks
        store_release(&self.global.status()[self.work_id as usize], READY);
    }
}

/// Spin-wait pacing: a handful of `spin_loop` hints, then a scheduler hint.
///
/// The yield keeps oversubscribed hosts moving without turning the wait into
/// a blocking one; the protocol still only ever observes the status flags.
#[inline]
fn relax(spins: &mut u32) {
    *spins = spins.wrapping_add(1);
    if *spins % 64 == 0 {
        std::thread::yield_now();
    } else {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::runtime::cpu::CpuDevice;

    #[test]
    fn storage_layout_and_reset() {
        let device = CpuDevice::new();
        let client = CpuRuntime::default_client(&device);
        let mut array = Array::<CpuRuntime, StatusWord>::from_slice(&client, &[9, 9, 9]);
        let storage = SyncfreeStorage::new(&mut array, 8);
        assert_eq!(storage.num_work_items(), 8);
        assert_eq!(storage.groups_issued(), 0);
        for item in 0..8 {
            assert!(!storage.ready(item));
        }
    }

    #[test]
    fn work_id_derivation() {
        let words: Vec<AtomicI32> = (0..9).map(|_| AtomicI32::new(PENDING)).collect();
        let storage = SyncfreeStorage::from_words(&words);
        let local = SharedStorage::<64, 16>::new();

        // Second group to arrive at the counter gets offset 64.
        assert_eq!(storage.grab_block_offset(64), 0);
        let offset = storage.grab_block_offset(64);
        assert_eq!(offset, 64);

        let sched = SyncfreeScheduler::<64, 16>::new(storage, &local, offset, 1);
        assert_eq!(sched.block_id(), 1);
        // 4 work items per block, second block, second subgroup.
        assert_eq!(sched.work_id(), 5);
    }

    #[test]
    fn mark_ready_publishes_globally_and_locally() {
        let words: Vec<AtomicI32> = (0..5).map(|_| AtomicI32::new(PENDING)).collect();
        let storage = SyncfreeStorage::from_words(&words);
        let local = SharedStorage::<32, 8>::new();
        let offset = storage.grab_block_offset(32);

        let first = SyncfreeScheduler::<32, 8>::new(storage, &local, offset, 0);
        let second = SyncfreeScheduler::<32, 8>::new(storage, &local, offset, 1);

        assert!(!second.peek(0));
        first.mark_ready();
        assert!(second.peek(0));
        second.wait(0); // returns immediately
        assert!(storage.ready(0));
    }
}
