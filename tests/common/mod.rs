//! Common test utilities
#![allow(dead_code)]

use std::time::Duration;

use sparlin::runtime::Runtime;
use sparlin::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};

/// Create a CPU client and device for testing
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device);
    (client, device)
}

/// Run `work` on a fresh thread and panic if it overruns `deadline`.
///
/// Syncfree misuse manifests as a hang, never as a wrong answer, so
/// liveness-sensitive tests bound their wall-clock time: a timeout is
/// reported as the deadlock it is instead of stalling the whole suite.
pub fn run_with_deadline<F>(deadline: Duration, work: F)
where
    F: FnOnce() + Send + 'static,
{
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let handle = std::thread::spawn(move || {
        work();
        let _ = done_tx.send(());
    });

    match done_rx.recv_timeout(deadline) {
        Ok(()) => handle.join().expect("worker panicked"),
        Err(_) => panic!(
            "launch exceeded {:?} deadline - treating as syncfree deadlock",
            deadline
        ),
    }
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}
