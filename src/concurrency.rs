//! Concurrency helper for the stages that may process chunk directories in parallel.

use anyhow::Result;
use rayon::prelude::*;

/// Run `f` over `items` with at most `limit` in flight; `limit <= 1` runs sequentially
/// in order. The first error stops the remaining batches.
pub fn for_each_limited<T, F>(items: &[T], limit: usize, f: F) -> Result<()>
where
    T: Sync,
    F: Sync + Fn(&T) -> Result<()>,
{
    if limit <= 1 {
        for item in items {
            f(item)?;
        }
        return Ok(());
    }
    for batch in items.chunks(limit) {
        batch.par_iter().try_for_each(|item| f(item))?;
    }
    Ok(())
}
