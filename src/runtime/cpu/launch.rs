//! CPU executor for syncfree kernels
//!
//! Maps the device execution model onto OS threads: one thread per execution
//! group, each servicing `BLOCK_SIZE / SUBGROUP_SIZE` work items in ascending
//! local order. The distributor still assigns block offsets by order of
//! arrival at the shared counter, so logical work order is decoupled from
//! thread scheduling exactly as on the GPU.
//!
//! # Liveness
//!
//! Unlike a GPU, the host OS preempts spinning threads, so the occupancy
//! bound of the device backends does not apply here: block offsets are
//! grabbed monotonically, groups run their subgroups in ascending order, and
//! therefore the smallest unfinished work item always belongs to a group that
//! can make progress. Any DAG whose dependencies are strictly smaller than
//! the waiter's work id completes, even when the group count far exceeds the
//! core count. Groups are still spawned in bounded waves to keep thread
//! counts reasonable; a group in wave `w` can only depend on items grabbed in
//! waves `<= w`, so waves never introduce a new deadlock.

use crate::components::syncfree::{
    SharedStorage, SyncfreeScheduler, SyncfreeStorage, local_dependency_count,
};

/// Number of execution groups the host runs comfortably at once.
///
/// Used to size spawn waves; it is a throughput knob, not a correctness
/// bound (see the module docs).
pub fn max_concurrent_groups() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Run a syncfree kernel over `num_work_items` dependency-ordered items.
///
/// The kernel closure is invoked once per work item with its scheduler; it is
/// expected to `wait` on its dependencies, do its work, and finish with
/// `mark_ready`. `storage` must cover at least `num_work_items` flags and be
/// freshly reset (see `SyncfreeStorage::new`).
///
/// `BLOCK_SIZE` and `SUBGROUP_SIZE` are the compile-time launch parameters;
/// the subgroup size must evenly divide the block size.
pub fn launch_syncfree<const BLOCK_SIZE: usize, const SUBGROUP_SIZE: usize, F>(
    storage: &SyncfreeStorage<'_>,
    num_work_items: usize,
    kernel: F,
) where
    F: Fn(&SyncfreeScheduler<'_, BLOCK_SIZE, SUBGROUP_SIZE>) + Sync,
{
    assert!(
        SUBGROUP_SIZE > 0 && BLOCK_SIZE % SUBGROUP_SIZE == 0,
        "subgroup size must evenly divide block size"
    );
    assert!(
        storage.num_work_items() >= num_work_items,
        "status array too small for launch"
    );
    if num_work_items == 0 {
        return;
    }

    let items_per_group = local_dependency_count(BLOCK_SIZE, SUBGROUP_SIZE);
    let num_groups = num_work_items.div_ceil(items_per_group);
    let wave = 4 * max_concurrent_groups();

    let mut remaining = num_groups;
    while remaining > 0 {
        let count = wave.min(remaining);
        std::thread::scope(|scope| {
            for _ in 0..count {
                scope.spawn(|| run_group::<BLOCK_SIZE, SUBGROUP_SIZE, F>(
                    *storage,
                    num_work_items,
                    &kernel,
                ));
            }
        });
        remaining -= count;
    }
}

/// One execution group: grab a block offset, then service the group's
/// subgroups in ascending local order.
fn run_group<const BLOCK_SIZE: usize, const SUBGROUP_SIZE: usize, F>(
    storage: SyncfreeStorage<'_>,
    num_work_items: usize,
    kernel: &F,
) where
    F: Fn(&SyncfreeScheduler<'_, BLOCK_SIZE, SUBGROUP_SIZE>) + Sync,
{
    let local = SharedStorage::<BLOCK_SIZE, SUBGROUP_SIZE>::new();
    let block_offset = storage.grab_block_offset(BLOCK_SIZE);

    for local_subgroup in 0..local_dependency_count(BLOCK_SIZE, SUBGROUP_SIZE) {
        let scheduler =
            SyncfreeScheduler::new(storage, &local, block_offset, local_subgroup);
        // Trailing subgroups of the last group fall outside the problem.
        if (scheduler.work_id() as usize) < num_work_items {
            kernel(&scheduler);
        }
    }
}
