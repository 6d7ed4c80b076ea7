//! Flat fill pass
//!
//! The syncfree storage constructor resets every status word to `PENDING`
//! through this component before each launch. It is a collaborator of the
//! scheduler, not part of the protocol itself.

/// Below this length the rayon fork/join overhead outweighs the fill itself.
#[cfg(feature = "rayon")]
const PARALLEL_FILL_THRESHOLD: usize = 1 << 14;

/// Fill `data` with `value`.
pub fn fill_array<T: Copy + Send + Sync>(data: &mut [T], value: T) {
    #[cfg(feature = "rayon")]
    if data.len() >= PARALLEL_FILL_THRESHOLD {
        use rayon::prelude::*;
        data.par_iter_mut().for_each(|slot| *slot = value);
        return;
    }

    data.fill(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_small_and_large() {
        let mut small = vec![0i32; 7];
        fill_array(&mut small, 3);
        assert!(small.iter().all(|&x| x == 3));

        let mut large = vec![0i32; 1 << 15];
        fill_array(&mut large, -1);
        assert!(large.iter().all(|&x| x == -1));
    }
}
