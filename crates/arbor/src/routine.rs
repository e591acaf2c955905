//! # Compiled Routine
//!
//! The native ABI a compiled tree-ensemble artifact exports, and the typed
//! view of it the rest of the engine calls through.
//!
//! An artifact exports:
//!
//! - [`QUERY_SYMBOL`]: `size_t get_num_output_group(void)`
//! - [`PREDICT_SINGLE_SYMBOL`]: `float predict(Entry* row, int pred_margin)`,
//!   used when the model has exactly one output group
//! - [`PREDICT_MULTI_SYMBOL`]: `size_t predict_multiclass(Entry* row, int pred_margin, float* out)`,
//!   used when the model has more than one output group; returns how many
//!   values it wrote to `out`

use std::ffi::{c_int, c_void};
use std::ptr::NonNull;
use tracing::debug;
use crate::entry::Entry;
use crate::error::{ConfigurationError, Result};
use crate::library::SymbolSource;

/// Name of the output group query.
pub const QUERY_SYMBOL: &str = "get_num_output_group";

/// Name of the single output prediction routine.
pub const PREDICT_SINGLE_SYMBOL: &str = "predict";

/// Name of the multi output prediction routine.
pub const PREDICT_MULTI_SYMBOL: &str = "predict_multiclass";

/// Returns the number of output groups of the model.
pub type QueryFn = unsafe extern "C" fn() -> usize;

/// Predicts a single value for one row.
pub type PredictSingleFn = unsafe extern "C" fn(*mut Entry, c_int) -> f32;

/// Writes up to `num_output_group` values for one row and returns the count written.
pub type PredictMultiFn = unsafe extern "C" fn(*mut Entry, c_int, *mut f32) -> usize;

/// The prediction entry point selected for a model at load time.
#[derive(Clone, Copy, Debug)]
pub enum PredictionCallable {
    SingleOutput(PredictSingleFn),
    MultiOutput(PredictMultiFn),
}

/// Resolved entry points of a loaded artifact.
///
/// The function pointers borrow code from the [`SymbolSource`] they were
/// resolved from; the owner keeps that source alive for as long as this value
/// exists.
#[derive(Debug)]
pub(crate) struct CompiledModel {
    query: QueryFn,
    callable: PredictionCallable,
    num_output_group: usize,
}

impl CompiledModel {
    /// Resolve the query routine, ask it for the output group count, and pick
    /// the prediction routine that matches.
    pub(crate) fn resolve(source: &dyn SymbolSource) -> Result<Self> {
        // SAFETY: `SymbolSource` implementors vouch for the signature behind each name.
        let query: QueryFn = unsafe { cast(source.symbol(QUERY_SYMBOL)?) };
        debug!(library = source.name(), symbol = QUERY_SYMBOL, "resolved symbol");

        let num_output_group = unsafe { query() };
        if num_output_group == 0 {
            return Err(ConfigurationError::NoOutputGroups.into());
        }

        let callable = if num_output_group > 1 {
            let func: PredictMultiFn = unsafe { cast(source.symbol(PREDICT_MULTI_SYMBOL)?) };
            debug!(library = source.name(), symbol = PREDICT_MULTI_SYMBOL, "resolved symbol");
            PredictionCallable::MultiOutput(func)
        } else {
            let func: PredictSingleFn = unsafe { cast(source.symbol(PREDICT_SINGLE_SYMBOL)?) };
            debug!(library = source.name(), symbol = PREDICT_SINGLE_SYMBOL, "resolved symbol");
            PredictionCallable::SingleOutput(func)
        };

        Ok(Self {
            query,
            callable,
            num_output_group,
        })
    }

    /// Ask the routine for its output group count again.
    pub(crate) fn query_output_groups(&self) -> usize {
        unsafe { (self.query)() }
    }

    pub(crate) fn num_output_group(&self) -> usize {
        self.num_output_group
    }

    pub(crate) fn callable(&self) -> PredictionCallable {
        self.callable
    }

    /// Number of output slots reserved per row.
    pub(crate) fn output_stride(&self) -> usize {
        match self.callable {
            PredictionCallable::SingleOutput(_) => 1,
            PredictionCallable::MultiOutput(_) => self.num_output_group,
        }
    }

    /// Run the routine on one populated row.
    ///
    /// `row` holds exactly `num_col` entries and `out` exactly
    /// [`output_stride`](Self::output_stride) slots. Returns the number of
    /// values written.
    ///
    /// A multi output routine reporting more than `num_output_group` values
    /// yields [`ConfigurationError::TooManyOutputs`]. The count is only known
    /// once the routine has returned, so by then it may already have written
    /// past `out`; the error flags a broken artifact and does not prevent the
    /// overrun.
    pub(crate) fn predict_row(
        &self,
        row_id: usize,
        row: &mut [Entry],
        pred_margin: bool,
        out: &mut [f32],
    ) -> Result<usize> {
        debug_assert_eq!(out.len(), self.output_stride());
        let margin = c_int::from(pred_margin);

        match self.callable {
            PredictionCallable::SingleOutput(func) => {
                out[0] = unsafe { func(row.as_mut_ptr(), margin) };
                Ok(1)
            }
            PredictionCallable::MultiOutput(func) => {
                let written = unsafe { func(row.as_mut_ptr(), margin, out.as_mut_ptr()) };
                if written > self.num_output_group {
                    return Err(ConfigurationError::TooManyOutputs {
                        row: row_id,
                        written,
                        num_output_group: self.num_output_group,
                    }
                    .into());
                }
                Ok(written)
            }
        }
    }
}

/// Reinterpret a resolved address as a function pointer.
///
/// # Safety
///
/// `address` must point to a function with the signature of `F`.
unsafe fn cast<F: Copy>(address: NonNull<c_void>) -> F {
    debug_assert_eq!(size_of::<F>(), size_of::<*mut c_void>());
    unsafe { std::mem::transmute_copy::<*mut c_void, F>(&address.as_ptr()) }
}
