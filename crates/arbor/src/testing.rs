//! Mock compiled routines.
//!
//! Stand-ins for the entry points a generated artifact exports. `N` is the
//! column count a routine was compiled for and `G` its output group count.

use std::ffi::c_int;
use crate::entry::Entry;

pub(crate) extern "C" fn query_zero() -> usize {
    0
}

pub(crate) extern "C" fn query_one() -> usize {
    1
}

pub(crate) extern "C" fn query_two() -> usize {
    2
}

pub(crate) extern "C" fn query_three() -> usize {
    3
}

fn row_sum<const N: usize>(row: *mut Entry) -> f32 {
    let row = unsafe { std::slice::from_raw_parts(row, N) };
    row.iter().filter_map(Entry::value).sum()
}

/// Sum of the present feature values.
pub(crate) extern "C" fn predict_sum<const N: usize>(row: *mut Entry, _pred_margin: c_int) -> f32 {
    row_sum::<N>(row)
}

/// Echoes the margin flag.
pub(crate) extern "C" fn predict_margin_echo(_row: *mut Entry, pred_margin: c_int) -> f32 {
    pred_margin as f32
}

/// Writes `sum + g` for every group `g`.
pub(crate) extern "C" fn predict_scores<const N: usize, const G: usize>(
    row: *mut Entry,
    _pred_margin: c_int,
    out: *mut f32,
) -> usize {
    let sum = row_sum::<N>(row);
    let out = unsafe { std::slice::from_raw_parts_mut(out, G) };
    for (group, slot) in out.iter_mut().enumerate() {
        *slot = sum + group as f32;
    }
    G
}

/// Writes only the index of the best scoring group, as a `max_index` model does.
pub(crate) extern "C" fn predict_best_class<const N: usize, const G: usize>(
    row: *mut Entry,
    _pred_margin: c_int,
    out: *mut f32,
) -> usize {
    let sum = row_sum::<N>(row);
    let out = unsafe { std::slice::from_raw_parts_mut(out, G) };
    out[0] = (sum.abs() as usize % G) as f32;
    1
}

/// Claims to have written one more value than it has room for.
pub(crate) extern "C" fn predict_overreport<const N: usize, const G: usize>(
    row: *mut Entry,
    pred_margin: c_int,
    out: *mut f32,
) -> usize {
    predict_scores::<N, G>(row, pred_margin, out) + 1
}
