//! # Batch Adapter
//!
//! Input layouts accepted by the engine and the logic that spreads one row of
//! either layout across a buffer of [`Entry`] slots.
//!
//! ## Buffer protocol
//!
//! A worker owns a buffer of `num_col` entries that starts out all missing.
//! For every row it processes it:
//!
//! 1. calls [`Batch::fill_row`], which sets the row's present values and
//!    leaves every other slot missing
//! 2. runs the prediction routine on the buffer
//! 3. calls [`Batch::clear_row`], which resets the slots the fill touched
//!
//! so the buffer is all missing again before the next row.

use crate::entry::Entry;
use crate::error::{ConfigurationError, Error, Result};

/// A batch of rows that can be laid out into [`Entry`] buffers.
pub trait Batch: Sync {
    fn num_row(&self) -> usize;

    fn num_col(&self) -> usize;

    /// Populate `slot` with the values of `row`.
    ///
    /// `slot` holds `num_col` entries, all missing on entry.
    fn fill_row(&self, row: usize, slot: &mut [Entry]) -> Result<()>;

    /// Reset every slot [`fill_row`](Batch::fill_row) may have set for `row`.
    fn clear_row(&self, row: usize, slot: &mut [Entry]);
}

/// Compressed sparse row batch.
///
/// Row `r` owns the entries `row_offset[r]..row_offset[r + 1]` of `data` and
/// `col_index`. Columns a row does not list are missing.
#[derive(Clone, Copy, Debug)]
pub struct SparseBatch<'a> {
    data: &'a [f32],
    col_index: &'a [u32],
    row_offset: &'a [usize],
    num_row: usize,
    num_col: usize,
}

impl<'a> SparseBatch<'a> {
    /// Wrap CSR arrays, checking that they describe a well formed batch.
    pub fn new(
        data: &'a [f32],
        col_index: &'a [u32],
        row_offset: &'a [usize],
        num_col: usize,
    ) -> Result<Self> {
        let Some(num_row) = row_offset.len().checked_sub(1) else {
            return Err(Error::InvalidBatch(
                "row_offset must hold num_row + 1 offsets".to_string(),
            ));
        };
        if data.len() != col_index.len() {
            return Err(Error::InvalidBatch(format!(
                "data has {} values but col_index has {}",
                data.len(),
                col_index.len()
            )));
        }
        if let Some(pos) = row_offset.windows(2).position(|pair| pair[0] > pair[1]) {
            return Err(Error::InvalidBatch(format!(
                "row_offset decreases at row {pos}"
            )));
        }
        let end = row_offset[num_row];
        if end > data.len() {
            return Err(Error::InvalidBatch(format!(
                "row_offset ends at {end} but only {} values are stored",
                data.len()
            )));
        }
        if let Some(&col) = col_index.iter().find(|&&col| col as usize >= num_col) {
            return Err(Error::InvalidBatch(format!(
                "column index {col} out of range for {num_col} columns"
            )));
        }

        Ok(Self {
            data,
            col_index,
            row_offset,
            num_row,
            num_col,
        })
    }

    #[inline]
    fn row_range(&self, row: usize) -> std::ops::Range<usize> {
        self.row_offset[row]..self.row_offset[row + 1]
    }
}

impl Batch for SparseBatch<'_> {
    fn num_row(&self) -> usize {
        self.num_row
    }

    fn num_col(&self) -> usize {
        self.num_col
    }

    fn fill_row(&self, row: usize, slot: &mut [Entry]) -> Result<()> {
        let range = self.row_range(row);
        for (&col, &value) in self.col_index[range.clone()].iter().zip(&self.data[range]) {
            slot[col as usize].set(value);
        }
        Ok(())
    }

    fn clear_row(&self, row: usize, slot: &mut [Entry]) {
        for &col in &self.col_index[self.row_range(row)] {
            slot[col as usize].clear();
        }
    }
}

/// Row-major dense batch.
///
/// A value equal to `missing_value` is treated as missing. When
/// `missing_value` is NaN every NaN in `data` is missing; when it is not, a
/// NaN in `data` is rejected while the row is filled.
#[derive(Clone, Copy, Debug)]
pub struct DenseBatch<'a> {
    data: &'a [f32],
    num_row: usize,
    num_col: usize,
    missing_value: f32,
}

impl<'a> DenseBatch<'a> {
    pub fn new(data: &'a [f32], num_row: usize, num_col: usize, missing_value: f32) -> Result<Self> {
        let expected = num_row.checked_mul(num_col).ok_or_else(|| {
            Error::InvalidBatch(format!("{num_row} x {num_col} overflows the address space"))
        })?;
        if data.len() != expected {
            return Err(Error::InvalidBatch(format!(
                "{num_row} x {num_col} batch needs {expected} values but {} were given",
                data.len()
            )));
        }

        Ok(Self {
            data,
            num_row,
            num_col,
            missing_value,
        })
    }

    pub fn missing_value(&self) -> f32 {
        self.missing_value
    }
}

impl Batch for DenseBatch<'_> {
    fn num_row(&self) -> usize {
        self.num_row
    }

    fn num_col(&self) -> usize {
        self.num_col
    }

    fn fill_row(&self, row: usize, slot: &mut [Entry]) -> Result<()> {
        let nan_missing = self.missing_value.is_nan();
        let values = &self.data[row * self.num_col..(row + 1) * self.num_col];

        for (col, (&value, entry)) in values.iter().zip(slot.iter_mut()).enumerate() {
            if value.is_nan() {
                if !nan_missing {
                    return Err(ConfigurationError::NanWithoutNanSentinel { row, col }.into());
                }
            } else if nan_missing || value != self.missing_value {
                entry.set(value);
            }
        }
        Ok(())
    }

    fn clear_row(&self, _row: usize, slot: &mut [Entry]) {
        slot.iter_mut().for_each(Entry::clear);
    }
}
