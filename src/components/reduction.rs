//! Group-level reduction primitives
//!
//! Cooperative reductions at three widths, mirroring the execution hierarchy:
//!
//! - [`subgroup_reduce`] - butterfly exchange across the lanes of one
//!   subgroup, `O(log S)` steps
//! - [`group_reduce`] / [`multireduce`] - block-wide in-place reduction that
//!   halves the active range per step, then hands off to the subgroup
//!   butterfly
//! - [`reduce_array`] / [`reduce_add_array`] - grid-strided accumulation into
//!   per-group partials, plus the host-side two-pass driver
//!
//! These are used both standalone (summation) and inside syncfree-scheduled
//! kernels, e.g. to combine partial sums before a work item marks itself
//! ready.

use num_traits::{Float, Zero};
use smallvec::SmallVec;

/// Block size used by the stock add-reduction driver.
pub const DEFAULT_REDUCE_BLOCK_SIZE: usize = 512;

/// Subgroup width used by the stock add-reduction driver.
pub const DEFAULT_REDUCE_SUBGROUP_SIZE: usize = 32;

/// Reduce the lanes of one subgroup with `op`, butterfly-style.
///
/// Each step pairs lane `i` with lane `i ^ bitmask`, always passing the local
/// value as the first operand. Every lane ends with the fully reduced value
/// only if `op` is commutative (in addition to associative); otherwise only
/// lane 0 is guaranteed the correct result and callers must re-broadcast it
/// themselves (see [`choose_pivot`]).
///
/// `lanes.len()` is the subgroup width and must be a power of two.
pub fn subgroup_reduce<T, F>(lanes: &mut [T], op: F)
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let size = lanes.len();
    assert!(size.is_power_of_two(), "subgroup width must be a power of two");

    let mut scratch: SmallVec<[T; 64]> = SmallVec::with_capacity(size);
    let mut bitmask = 1;
    while bitmask < size {
        scratch.clear();
        scratch.extend_from_slice(lanes);
        for lane in 0..size {
            lanes[lane] = op(lanes[lane], scratch[lane ^ bitmask]);
        }
        bitmask <<= 1;
    }
}

/// Index of the lane holding the element with the largest magnitude.
///
/// Lanes flagged in `is_pivoted` are excluded (their magnitude is treated as
/// negative). Ties break to the lowest lane index. The underlying fold is not
/// commutative, so the result is taken from lane 0 and re-broadcast - every
/// caller sees the same pivot.
pub fn choose_pivot<T: Float>(lanes: &[T], is_pivoted: &[bool]) -> usize {
    let size = lanes.len();
    assert_eq!(size, is_pivoted.len(), "lane/flag length mismatch");
    assert!(size.is_power_of_two(), "subgroup width must be a power of two");

    let mut mag: SmallVec<[T; 64]> = lanes
        .iter()
        .zip(is_pivoted)
        .map(|(&value, &pivoted)| if pivoted { -T::one() } else { value.abs() })
        .collect();
    let mut idx: SmallVec<[usize; 64]> = (0..size).collect();

    let mut bitmask = 1;
    while bitmask < size {
        let mag_snapshot = mag.clone();
        let idx_snapshot = idx.clone();
        for lane in 0..size {
            let remote = lane ^ bitmask;
            // Strict comparison keeps the local candidate on ties, which in
            // lane 0's fold order means the lowest index wins.
            if mag_snapshot[remote] > mag[lane] {
                mag[lane] = mag_snapshot[remote];
                idx[lane] = idx_snapshot[remote];
            }
        }
        bitmask <<= 1;
    }

    // broadcast from lane 0: the fold is not commutative
    idx[0]
}

/// Block-wide in-place reduction over `data` (length = block size).
///
/// Halves the active range with a group barrier per step until it matches one
/// subgroup's width, then delegates to [`subgroup_reduce`]. The final result
/// lands in `data[0]`; the rest of the buffer is used as workspace and is
/// destroyed in the process.
///
/// All lanes of the group must participate; diverging out before a barrier is
/// undefined on the GPU backends.
pub fn group_reduce<T, F>(data: &mut [T], subgroup_size: usize, op: F)
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let size = data.len();
    assert!(size.is_power_of_two(), "block size must be a power of two");
    assert!(
        subgroup_size.is_power_of_two() && subgroup_size <= size,
        "subgroup width must be a power of two no larger than the block"
    );

    let mut k = size / 2;
    while k >= subgroup_size {
        for id in 0..k {
            data[id] = op(data[id], data[id + k]);
        }
        k /= 2;
    }

    subgroup_reduce(&mut data[..subgroup_size], &op);
}

/// `num` independent block-wide reductions in one barrier sequence.
///
/// The `j`-th reduction works on `data[j * stride .. j * stride + block_size]`.
/// Results land in `data[j * stride]`, everything else is workspace. Sharing
/// one barrier sequence amortizes the synchronization cost across all `num`
/// reductions.
pub fn multireduce<T, F>(
    data: &mut [T],
    block_size: usize,
    stride: usize,
    num: usize,
    subgroup_size: usize,
    op: F,
) where
    T: Copy,
    F: Fn(T, T) -> T,
{
    assert!(block_size.is_power_of_two(), "block size must be a power of two");
    assert!(
        subgroup_size.is_power_of_two() && subgroup_size <= block_size,
        "subgroup width must be a power of two no larger than the block"
    );
    assert!(
        data.len() >= (num.saturating_sub(1)) * stride + block_size,
        "data shorter than the last reduction slice"
    );

    let mut k = block_size / 2;
    while k >= subgroup_size {
        for id in 0..k {
            for j in 0..num {
                let base = j * stride;
                data[base + id] = op(data[base + id], data[base + id + k]);
            }
        }
        k /= 2;
    }

    for j in 0..num {
        let base = j * stride;
        subgroup_reduce(&mut data[base..base + subgroup_size], &op);
    }
}

/// Grid-strided reduction of `source` into per-group partials.
///
/// Each of the `partials.len()` groups accumulates a strided slice of
/// `source` (`i += block_size * num_groups`) into a block-local buffer and
/// block-reduces it; `partials[g]` receives group `g`'s result. When more
/// than one group is used the caller must run a second combination pass over
/// `partials` - the classic two-level log-step reduction.
pub fn reduce_array<T, F>(source: &[T], partials: &mut [T], block_size: usize, subgroup_size: usize, op: F)
where
    T: Zero + Copy + Send + Sync,
    F: Fn(T, T) -> T + Sync,
{
    let num_groups = partials.len();
    if num_groups == 0 {
        return;
    }
    let stride = block_size * num_groups;

    let reduce_group = |g: usize, partial: &mut T| {
        let mut buffer = vec![T::zero(); block_size];
        for (lane, slot) in buffer.iter_mut().enumerate() {
            let mut acc = T::zero();
            let mut i = g * block_size + lane;
            while i < source.len() {
                acc = op(acc, source[i]);
                i += stride;
            }
            *slot = acc;
        }
        group_reduce(&mut buffer, subgroup_size, &op);
        *partial = buffer[0];
    };

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        partials
            .par_iter_mut()
            .enumerate()
            .for_each(|(g, partial)| reduce_group(g, partial));
    }

    #[cfg(not(feature = "rayon"))]
    for (g, partial) in partials.iter_mut().enumerate() {
        reduce_group(g, partial);
    }
}

/// Sum an arbitrary-length array with the two-pass grid reduction.
///
/// Sizes the first pass like the device driver does: up to
/// [`DEFAULT_REDUCE_BLOCK_SIZE`] groups of [`DEFAULT_REDUCE_BLOCK_SIZE`]
/// lanes, then one final single-group pass over the partials.
pub fn reduce_add_array<T>(source: &[T]) -> T
where
    T: Zero + Copy + Send + Sync,
{
    let block = DEFAULT_REDUCE_BLOCK_SIZE;
    let subgroup = DEFAULT_REDUCE_SUBGROUP_SIZE;
    let add = |x: T, y: T| x + y;

    if source.len() > block {
        let n = source.len().div_ceil(block);
        let grid = n.min(block);
        let mut block_results = vec![T::zero(); grid];
        reduce_array(source, &mut block_results, block, subgroup, add);

        let mut result = [T::zero()];
        reduce_array(&block_results, &mut result, block, subgroup, add);
        result[0]
    } else {
        let mut result = [T::zero()];
        reduce_array(source, &mut result, block, subgroup, add);
        result[0]
    }
}

/// Sum `source` on top of `initial_value`.
///
/// The accumulating variant of [`reduce_add_array`], for callers folding
/// several arrays (or launch batches) into one running total.
pub fn reduce_add_array_with_initial_value<T>(source: &[T], initial_value: T) -> T
where
    T: Zero + Copy + Send + Sync,
{
    initial_value + reduce_add_array(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subgroup_sum_broadcasts_to_every_lane() {
        let mut lanes = [1i64; 32];
        subgroup_reduce(&mut lanes, |a, b| a + b);
        assert!(lanes.iter().all(|&v| v == 32));
    }

    #[test]
    fn subgroup_max_reaches_lane_zero() {
        let mut lanes = [3.0f64, 1.0, 4.0, 1.5];
        subgroup_reduce(&mut lanes, f64::max);
        assert_eq!(lanes[0], 4.0);
    }

    #[test]
    fn pivot_prefers_lowest_lane_on_ties() {
        let lanes = [1.0f64, -5.0, 5.0, 2.0];
        let not_pivoted = [false; 4];
        assert_eq!(choose_pivot(&lanes, &not_pivoted), 1);
    }

    #[test]
    fn pivot_skips_already_pivoted_lanes() {
        let lanes = [1.0f64, -5.0, 5.0, 2.0];
        let pivoted = [false, true, false, false];
        assert_eq!(choose_pivot(&lanes, &pivoted), 2);
    }

    #[test]
    fn group_reduce_leaves_result_in_slot_zero() {
        let mut data: Vec<i64> = (1..=512).collect();
        group_reduce(&mut data, 32, |a, b| a + b);
        assert_eq!(data[0], 512 * 513 / 2);
    }

    #[test]
    fn multireduce_is_independent_per_slice() {
        // Two interleaved reductions over 64-lane blocks, stride 64.
        let mut data: Vec<i64> = Vec::new();
        data.extend(std::iter::repeat(1).take(64));
        data.extend(std::iter::repeat(2).take(64));
        multireduce(&mut data, 64, 64, 2, 8, |a, b| a + b);
        assert_eq!(data[0], 64);
        assert_eq!(data[64], 128);
    }

    #[test]
    fn reduce_add_handles_boundary_lengths() {
        for len in [1usize, 511, 512, 513, 6000] {
            let source = vec![1i64; len];
            assert_eq!(reduce_add_array(&source), len as i64);
        }
    }

    #[test]
    fn reduce_add_accumulates_onto_initial_value() {
        let source = vec![2i64; 1000];
        assert_eq!(reduce_add_array_with_initial_value(&source, 5), 2005);
    }
}
