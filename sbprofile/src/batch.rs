//! Deterministic batch rendering.
//!
//! Each stamp `i` gets its own deviate seeded with `base_seed + i`, so the
//! parallel and sequential drivers produce identical output whatever the
//! thread count or scheduling order.

use log::debug;
use rayon::prelude::*;

use crate::error::Result;
use crate::random::BaseDeviate;

fn stamp_rng(base_seed: u64, index: usize) -> BaseDeviate {
    BaseDeviate::new(base_seed.wrapping_add(index as u64))
}

/// Run `job(i, rng)` for `i in 0..count` on the rayon pool.
///
/// Results come back in index order. Every stamp runs to completion; if any
/// fail, the error of the lowest failing index is returned, matching
/// [`render_stamps_sequential`].
pub fn render_stamps<T, F>(count: usize, base_seed: u64, job: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize, &mut BaseDeviate) -> Result<T> + Send + Sync,
{
    debug!("rendering {count} stamps in parallel from seed {base_seed}");
    let results: Vec<Result<T>> = (0..count)
        .into_par_iter()
        .map(|i| {
            let mut rng = stamp_rng(base_seed, i);
            job(i, &mut rng)
        })
        .collect();
    results.into_iter().collect()
}

/// Single-threaded twin of [`render_stamps`].
pub fn render_stamps_sequential<T, F>(count: usize, base_seed: u64, job: F) -> Result<Vec<T>>
where
    F: Fn(usize, &mut BaseDeviate) -> Result<T>,
{
    (0..count)
        .map(|i| {
            let mut rng = stamp_rng(base_seed, i);
            job(i, &mut rng)
        })
        .collect()
}
