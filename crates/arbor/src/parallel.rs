//! # Parallel Predict Loop
//!
//! Fork-join execution of a compiled routine over every row of a batch.
//!
//! Rows are split statically into contiguous runs, one per worker. Each run is
//! handed its own slice of an [`EntryArena`] and the slice of the output buffer
//! that covers its rows, so workers never share writable memory. The number of
//! values each run wrote is summed at the join point.
//!
//! Worker threads come from [`ThreadPools`], which keeps one pool per thread
//! count alive across calls.

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;
use crate::batch::Batch;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::routine::CompiledModel;

/// Scratch rows for the workers of one prediction call.
///
/// Holds `nthread` buffers of `num_col` entries, all missing between rows.
pub(crate) struct EntryArena {
    entries: Vec<Entry>,
    nthread: usize,
    num_col: usize,
}

impl EntryArena {
    pub(crate) fn new(nthread: usize, num_col: usize) -> Self {
        Self {
            entries: vec![Entry::missing(); nthread * num_col],
            nthread,
            num_col,
        }
    }

    /// One disjoint buffer per worker, in worker order.
    pub(crate) fn slices_mut(&mut self) -> Vec<&mut [Entry]> {
        if self.num_col == 0 {
            return (0..self.nthread).map(|_| <&mut [Entry]>::default()).collect();
        }
        self.entries.chunks_mut(self.num_col).collect()
    }
}

/// Rayon pools keyed by thread count, built on first use.
#[derive(Default)]
pub(crate) struct ThreadPools {
    pools: Mutex<HashMap<usize, Arc<ThreadPool>>>,
}

impl ThreadPools {
    /// The pool with exactly `nthread` workers.
    pub(crate) fn get(&self, nthread: usize) -> Result<Arc<ThreadPool>> {
        let mut pools = self.pools.lock();
        if let Some(pool) = pools.get(&nthread) {
            return Ok(pool.clone());
        }

        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(nthread)
                .thread_name(|index| format!("arbor-predict-{index}"))
                .build()?,
        );
        debug!(nthread, "started prediction thread pool");
        pools.insert(nthread, pool.clone());
        Ok(pool)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pools.lock().len()
    }
}

/// Reject row counts that do not fit a signed 64-bit row index.
pub(crate) fn check_row_count(num_row: usize) -> Result<()> {
    if i64::try_from(num_row).is_err() {
        return Err(Error::RowCountOverflow { num_row });
    }
    Ok(())
}

/// Predict every row of `batch` on a pool of `nthread` workers.
///
/// The rows are split into at most `nthread` runs, never more than one per
/// row. Row `r` writes its results starting at `out[r * stride]`, where the stride
/// is one for single output routines and `num_output_group` otherwise.
/// Returns the total number of values the routine reported writing, which can
/// be smaller than `num_row * stride`.
pub(crate) fn predict_loop<B>(
    batch: &B,
    nthread: usize,
    pools: &ThreadPools,
    model: &CompiledModel,
    pred_margin: bool,
    out: &mut [f32],
) -> Result<usize>
where
    B: Batch + ?Sized,
{
    let num_row = batch.num_row();
    check_row_count(num_row)?;
    if num_row == 0 {
        return Ok(0);
    }

    let stride = model.output_stride();
    let pool = pools.get(nthread.max(1))?;
    let nrun = nthread.clamp(1, num_row);
    let rows_per_thread = num_row.div_ceil(nrun);
    let out = &mut out[..num_row * stride];

    let mut arena = EntryArena::new(nrun, batch.num_col());

    let partial_sizes = pool.install(|| {
        arena
            .slices_mut()
            .into_par_iter()
            .zip(out.par_chunks_mut(rows_per_thread * stride))
            .enumerate()
            .map(|(worker, (slot, out_rows))| {
                predict_rows(batch, model, pred_margin, worker * rows_per_thread, slot, out_rows)
            })
            .collect::<Result<Vec<usize>>>()
    })?;

    Ok(partial_sizes.into_iter().sum())
}

/// Predict a contiguous run of rows starting at `first_row` with one buffer.
fn predict_rows<B>(
    batch: &B,
    model: &CompiledModel,
    pred_margin: bool,
    first_row: usize,
    slot: &mut [Entry],
    out_rows: &mut [f32],
) -> Result<usize>
where
    B: Batch + ?Sized,
{
    let mut written = 0;
    for (offset, out_row) in out_rows.chunks_mut(model.output_stride()).enumerate() {
        let row = first_row + offset;
        if let Err(err) = batch.fill_row(row, slot) {
            batch.clear_row(row, slot);
            return Err(err);
        }
        let result = model.predict_row(row, slot, pred_margin, out_row);
        batch.clear_row(row, slot);
        written += result?;
    }
    Ok(written)
}
