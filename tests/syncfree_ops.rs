//! Integration tests for the syncfree scheduler
//!
//! Tests verify:
//! - Termination and flag state for strictly-descending dependency DAGs
//! - Memory-ordering correctness of wait/mark_ready (no early wake)
//! - Distributor bijection and counter diagnostics
//! - Liveness of the CPU executor far beyond the core count

mod common;

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use common::{create_cpu_client, run_with_deadline};
use sparlin::array::Array;
use sparlin::components::syncfree::SyncfreeStorage;
use sparlin::runtime::cpu::{CpuRuntime, launch_syncfree};

// ============================================================================
// Termination & flag state
// ============================================================================

#[test]
fn linear_chain_completes_with_all_flags_ready() {
    let (client, _device) = create_cpu_client();
    let n = 97usize;

    let source: Vec<i64> = (0..n as i64).collect();
    let running: Vec<AtomicI64> = (0..n).map(|_| AtomicI64::new(0)).collect();

    let mut status = Array::<CpuRuntime, i32>::new(&client);
    let storage = SyncfreeStorage::new(&mut status, n);

    launch_syncfree::<64, 8, _>(&storage, n, |sched| {
        let work_id = sched.work_id();
        let w = work_id as usize;
        let prefix = if work_id > 0 {
            sched.wait(work_id - 1);
            running[w - 1].load(Ordering::Relaxed)
        } else {
            0
        };
        running[w].store(prefix + source[w], Ordering::Relaxed);
        sched.mark_ready();
    });

    for item in 0..n as i64 {
        assert!(storage.ready(item), "item {} not ready after launch", item);
    }
    // 8 items per 64/8 group
    assert_eq!(storage.groups_issued() as usize, n.div_ceil(8));

    let expected: i64 = (0..n as i64).sum();
    assert_eq!(running[n - 1].load(Ordering::Relaxed), expected);
}

#[test]
fn random_dag_with_descending_dependencies_terminates() {
    use rand::prelude::*;

    let (client, _device) = create_cpu_client();
    let n = 128usize;
    let mut rng = StdRng::seed_from_u64(0x5eed);

    // Every item depends on up to three strictly smaller items.
    let deps: Vec<Vec<i64>> = (0..n)
        .map(|i| {
            (0..rng.gen_range(0..=3.min(i)))
                .map(|_| rng.gen_range(0..i) as i64)
                .collect()
        })
        .collect();

    // value[i] = 1 + sum of dependency values, computed sequentially.
    let mut expected = vec![0i64; n];
    for i in 0..n {
        expected[i] = 1 + deps[i].iter().map(|&d| expected[d as usize]).sum::<i64>();
    }

    let values: Vec<AtomicI64> = (0..n).map(|_| AtomicI64::new(0)).collect();
    let mut status = Array::<CpuRuntime, i32>::new(&client);
    let storage = SyncfreeStorage::new(&mut status, n);

    launch_syncfree::<32, 8, _>(&storage, n, |sched| {
        let w = sched.work_id() as usize;
        let mut acc = 1i64;
        for &dep in &deps[w] {
            sched.wait(dep);
            acc += values[dep as usize].load(Ordering::Relaxed);
        }
        values[w].store(acc, Ordering::Relaxed);
        sched.mark_ready();
    });

    let got: Vec<i64> = values.iter().map(|v| v.load(Ordering::Relaxed)).collect();
    assert_eq!(got, expected);
}

// ============================================================================
// Memory ordering (no early wake)
// ============================================================================

#[test]
fn wait_never_observes_unfinalized_results() {
    let (client, _device) = create_cpu_client();

    // Two-item DAG, repeated: item 0 scribbles a placeholder, overwrites it
    // with the finalized value, then marks ready; item 1 must always read
    // the finalized value. A stale read here means a missing fence. One item
    // per group, so the two items land on different threads.
    for round in 0..200 {
        let result = AtomicI64::new(0);
        let observed = AtomicI64::new(-1);

        let mut status = Array::<CpuRuntime, i32>::new(&client);
        let storage = SyncfreeStorage::new(&mut status, 2);

        launch_syncfree::<8, 8, _>(&storage, 2, |sched| {
            if sched.work_id() == 0 {
                result.store(41, Ordering::Relaxed);
                result.store(42, Ordering::Relaxed);
                sched.mark_ready();
            } else {
                sched.wait(0);
                observed.store(result.load(Ordering::Relaxed), Ordering::Relaxed);
                sched.mark_ready();
            }
        });

        assert_eq!(
            observed.load(Ordering::Relaxed),
            42,
            "round {}: dependent observed unfinalized value",
            round
        );
    }
}

#[test]
fn peek_is_true_after_wait_returns() {
    let (client, _device) = create_cpu_client();
    let n = 40usize;
    let violations = AtomicUsize::new(0);

    let mut status = Array::<CpuRuntime, i32>::new(&client);
    let storage = SyncfreeStorage::new(&mut status, n);

    launch_syncfree::<64, 16, _>(&storage, n, |sched| {
        let work_id = sched.work_id();
        if work_id > 0 {
            sched.wait(work_id - 1);
            // peek of a satisfied dependency never flips back
            if !sched.peek(work_id - 1) {
                violations.fetch_add(1, Ordering::Relaxed);
            }
        }
        sched.mark_ready();
    });

    assert_eq!(violations.load(Ordering::Relaxed), 0);
}

// ============================================================================
// Distributor
// ============================================================================

#[test]
fn distributor_issues_each_work_id_exactly_once() {
    let (client, _device) = create_cpu_client();
    let n = 256usize;
    let issued: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();

    let mut status = Array::<CpuRuntime, i32>::new(&client);
    let storage = SyncfreeStorage::new(&mut status, n);

    launch_syncfree::<128, 32, _>(&storage, n, |sched| {
        issued[sched.work_id() as usize].fetch_add(1, Ordering::Relaxed);
        sched.mark_ready();
    });

    assert!(issued.iter().all(|count| count.load(Ordering::Relaxed) == 1));
}

#[test]
fn counter_reports_number_of_groups_after_launch() {
    let (client, _device) = create_cpu_client();
    let n = 10usize;

    let mut status = Array::<CpuRuntime, i32>::new(&client);
    let storage = SyncfreeStorage::new(&mut status, n);
    launch_syncfree::<64, 8, _>(&storage, n, |sched| sched.mark_ready());

    // 8 items per group -> 2 groups; observable diagnostics, not required
    // for correctness.
    assert_eq!(storage.groups_issued(), 2);

    drop(storage);
    let words = status.to_vec();
    assert_eq!(words.len(), n + 1);
    assert!(words[..n].iter().all(|&flag| flag == 1));
    assert_eq!(words[n], 2);
}

// ============================================================================
// Liveness
// ============================================================================

/// On GPUs, a linear chain larger than the concurrent-residency bound is a
/// documented deadlock boundary (the CUDA launchers reject it up front). The
/// CPU executor has no such bound: the OS preempts spinning threads and block
/// offsets are grabbed monotonically, so even a worst-case chain with far
/// more groups than cores must finish. The deadline turns a regression into
/// a diagnosed deadlock instead of a hung suite.
#[test]
fn oversubscribed_chain_is_live_on_cpu() {
    run_with_deadline(Duration::from_secs(60), || {
        let (client, _device) = create_cpu_client();
        let n = 2048usize; // 1024 groups of 2 items, far beyond any core count

        let progress: Vec<AtomicI64> = (0..n).map(|_| AtomicI64::new(0)).collect();
        let mut status = Array::<CpuRuntime, i32>::new(&client);
        let storage = SyncfreeStorage::new(&mut status, n);

        launch_syncfree::<16, 8, _>(&storage, n, |sched| {
            let work_id = sched.work_id();
            let w = work_id as usize;
            let prefix = if work_id > 0 {
                sched.wait(work_id - 1);
                progress[w - 1].load(Ordering::Relaxed)
            } else {
                0
            };
            progress[w].store(prefix + 1, Ordering::Relaxed);
            sched.mark_ready();
        });

        assert_eq!(progress[n - 1].load(Ordering::Relaxed), n as i64);
    });
}

// ============================================================================
// Reuse
// ============================================================================

#[test]
fn storage_resets_between_launches() {
    let (client, _device) = create_cpu_client();
    let mut status = Array::<CpuRuntime, i32>::new(&client);

    for _ in 0..3 {
        let storage = SyncfreeStorage::new(&mut status, 12);
        assert_eq!(storage.groups_issued(), 0);
        launch_syncfree::<32, 8, _>(&storage, 12, |sched| {
            let work_id = sched.work_id();
            if work_id > 0 {
                sched.wait(work_id - 1);
            }
            sched.mark_ready();
        });
        assert!((0..12).all(|item| storage.ready(item)));
    }
}
