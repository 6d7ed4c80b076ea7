//! Integration tests for the reduction primitives

mod common;

use common::assert_allclose_f64;
use sparlin::components::reduction::{
    DEFAULT_REDUCE_BLOCK_SIZE, DEFAULT_REDUCE_SUBGROUP_SIZE, choose_pivot, group_reduce,
    multireduce, reduce_add_array, reduce_array, subgroup_reduce,
};

#[test]
fn subgroup_add_broadcasts_when_commutative() {
    let mut lanes: Vec<i64> = (0..32).collect();
    subgroup_reduce(&mut lanes, |a, b| a + b);
    let expected: i64 = (0..32).sum();
    assert!(lanes.iter().all(|&v| v == expected));
}

#[test]
fn pivot_selection_matches_sequential_argmax() {
    use rand::prelude::*;
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..50 {
        let lanes: Vec<f64> = (0..32).map(|_| rng.gen_range(-10.0..10.0)).collect();
        let pivoted: Vec<bool> = (0..32).map(|_| rng.gen_bool(0.25)).collect();
        if pivoted.iter().all(|&p| p) {
            continue;
        }

        let expected = lanes
            .iter()
            .zip(&pivoted)
            .enumerate()
            .filter(|(_, (_, &p))| !p)
            .max_by(|(_, (a, _)), (_, (b, _))| a.abs().partial_cmp(&b.abs()).unwrap())
            .map(|(i, _)| i)
            .unwrap();

        assert_eq!(choose_pivot(&lanes, &pivoted), expected);
    }
}

#[test]
fn group_reduce_over_full_block() {
    let mut data: Vec<i64> = (1..=512).collect();
    group_reduce(&mut data, DEFAULT_REDUCE_SUBGROUP_SIZE, |a, b| a + b);
    assert_eq!(data[0], 512 * 513 / 2);
}

#[test]
fn multireduce_handles_disjoint_and_overlapping_strides() {
    // Three reductions over 32-lane blocks packed back to back.
    let mut data = vec![0i64; 96];
    for (j, chunk) in data.chunks_mut(32).enumerate() {
        chunk.fill(j as i64 + 1);
    }
    multireduce(&mut data, 32, 32, 3, 8, |a, b| a + b);
    assert_eq!(data[0], 32);
    assert_eq!(data[32], 64);
    assert_eq!(data[64], 96);
}

#[test]
fn reduce_array_partials_combine_to_total() {
    // 6355 elements of 3 across 4 groups, then a second pass over the
    // partials, mirroring the device two-level scheme.
    let source = vec![3i64; 6355];
    let mut partials = vec![0i64; 4];
    reduce_array(&source, &mut partials, 64, 8, |a, b| a + b);
    assert_eq!(partials.iter().sum::<i64>(), 19065);

    let mut total = [0i64];
    reduce_array(&partials, &mut total, 64, 8, |a, b| a + b);
    assert_eq!(total[0], 19065);
}

#[test]
fn reduce_add_matches_sequential_sum_f64() {
    use rand::prelude::*;
    let mut rng = StdRng::seed_from_u64(42);

    for len in [1usize, 100, DEFAULT_REDUCE_BLOCK_SIZE, 100_000] {
        let source: Vec<f64> = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let sequential: f64 = source.iter().sum();
        let reduced = reduce_add_array(&source);
        assert_allclose_f64(&[reduced], &[sequential], 1e-12, 1e-12, "reduce_add f64");
    }
}

#[test]
fn reduce_add_exact_for_integers() {
    let source: Vec<i64> = (0..300_000).collect();
    assert_eq!(reduce_add_array(&source), 300_000 * 299_999 / 2);
}

#[test]
fn reduce_add_empty_is_zero() {
    let source: Vec<i64> = Vec::new();
    assert_eq!(reduce_add_array(&source), 0);
}
