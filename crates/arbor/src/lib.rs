//! # Arbor
//!
//! A parallel **batch prediction engine** for tree-ensemble models that have
//! been compiled ahead of time into native prediction routines.
//!
//! ## Overview
//!
//! A model compiler turns a trained tree ensemble into a shared library that
//! exports a handful of C functions. This crate loads such a library, adapts
//! batched input into the per-row calling convention those functions expect,
//! runs the rows across a pool of worker threads, and hands back a tightly
//! packed output buffer.
//!
//! Key components include:
//!
//! - A library loader that resolves the routine's entry points by name
//! - Batch adapters for compressed sparse row and dense row-major input
//! - A fork-join prediction loop over a per-worker scratch arena
//! - An output reconciler for routines that emit fewer values than reserved
//! - A [`Predictor`] facade tying the lifecycle together
//!
//! ## Architecture
//!
//! ### Calling Convention
//!
//! Every row is presented to the routine as `num_col` contiguous [`Entry`]
//! slots, each either holding a feature value or marked missing. The routine
//! is told whether to return raw margin scores and, for multi output models,
//! where to write its per-group values. See [`routine`] for the exact ABI.
//!
//! ### Symbol Sources
//!
//! The [`SymbolSource`] trait abstracts where the routine's code lives. A
//! [`DynamicLibrary`] opens an artifact from disk using the platform loader;
//! a [`SymbolMap`] serves routines that were linked into the host binary.
//!
//! ### Threading
//!
//! A prediction call blocks until every row is done. Rows are partitioned
//! statically into one contiguous run per worker, and every worker owns its
//! scratch row and its slice of the output, so results do not depend on the
//! thread count.
//!
//! ## Features
//!
//! - **service** *(default)* - Enables the asynchronous [`service`] front end
//!
//! ## Example
//!
//! ```ignore
//! use arbor::{PredictOptions, Predictor, SparseBatch};
//!
//! let mut predictor = Predictor::new();
//! unsafe { predictor.load("./model.so")? };
//!
//! // two rows, three columns; the second row has no values at all
//! let data = [5.0];
//! let col_index = [1];
//! let row_offset = [0, 1, 1];
//! let batch = SparseBatch::new(&data, &col_index, &row_offset, 3)?;
//!
//! let mut out = vec![0.0; predictor.query_result_size(&batch)?];
//! let size = predictor.predict_batch(&batch, &PredictOptions::new(), &mut out)?;
//! out.truncate(size);
//! ```

mod parallel;
mod predictor;

pub mod batch;
pub mod entry;
pub mod error;
pub mod library;
pub mod options;
pub mod reconcile;
pub mod routine;

#[cfg_attr(docsrs, doc(cfg(feature = "service")))]
#[cfg(feature = "service")]
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{Batch, DenseBatch, SparseBatch};
pub use entry::Entry;
pub use error::{ConfigurationError, Error, LoadError, Result};
pub use library::{DynamicLibrary, SymbolMap, SymbolSource};
pub use options::PredictOptions;
pub use predictor::Predictor;
pub use routine::PredictionCallable;
