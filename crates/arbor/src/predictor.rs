//! # Predictor
//!
//! Lifecycle of a compiled model: load it, predict batches with it, release it.

use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use crate::batch::Batch;
use crate::error::{Error, Result};
use crate::library::{DynamicLibrary, SymbolSource};
use crate::options::PredictOptions;
use crate::parallel::{check_row_count, predict_loop, ThreadPools};
use crate::reconcile::reconcile;
use crate::routine::{CompiledModel, PredictionCallable};

/// A compiled model and the library that provides its code.
struct Loaded {
    /// Declared before `library` so it is dropped first.
    model: CompiledModel,
    library: Box<dyn SymbolSource>,
}

/// Runs batch predictions through a compiled tree-ensemble routine.
///
/// A predictor starts out empty. [`load`](Predictor::load) opens an artifact,
/// asks it for its output group count and resolves the matching prediction
/// routine; from then on the predictor is immutable and can be shared across
/// threads. The library is released by [`free`](Predictor::free) or on drop.
///
/// # Example
///
/// ```ignore
/// use arbor::{DenseBatch, PredictOptions, Predictor};
///
/// let mut predictor = Predictor::new();
/// unsafe { predictor.load("./model.so")? };
///
/// let data = [0.5, f32::NAN, 1.5, 2.0];
/// let batch = DenseBatch::new(&data, 2, 2, f32::NAN)?;
/// let scores = predictor.predict(&batch, &PredictOptions::new().with_nthread(2))?;
/// ```
#[derive(Default)]
pub struct Predictor {
    loaded: Option<Loaded>,
    pools: ThreadPools,
}

impl Predictor {
    /// Create a predictor with nothing loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the shared library at `path` and load its routines.
    ///
    /// Any previously loaded library is released first on success.
    ///
    /// ```compile_fail
    /// let mut predictor = arbor::Predictor::new();
    /// predictor.load("./model.so").ok();
    /// ```
    ///
    /// # Safety
    ///
    /// Same contract as [`DynamicLibrary::open`]: the artifact's
    /// initialization code runs, and its exported routines are called with
    /// the signatures in [`routine`](crate::routine) without any check.
    pub unsafe fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let library = unsafe { DynamicLibrary::open(path)? };
        self.load_from(library)
    }

    /// Load routines from an already opened symbol source.
    pub fn load_from<S>(&mut self, source: S) -> Result<()>
    where
        S: SymbolSource + 'static,
    {
        let model = CompiledModel::resolve(&source)?;
        info!(
            library = source.name(),
            num_output_group = model.num_output_group(),
            "loaded compiled model"
        );

        self.free();
        self.loaded = Some(Loaded {
            model,
            library: Box::new(source),
        });
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Output values the model produces per row.
    pub fn num_output_group(&self) -> Result<usize> {
        Ok(self.loaded()?.model.num_output_group())
    }

    /// The prediction routine selected at load time.
    pub fn callable(&self) -> Result<PredictionCallable> {
        Ok(self.loaded()?.model.callable())
    }

    /// Ask the loaded routine for its output group count.
    pub fn query_output_groups(&self) -> Result<usize> {
        Ok(self.loaded()?.model.query_output_groups())
    }

    /// Size of the output buffer `batch` needs: `num_row * num_output_group`.
    pub fn query_result_size<B>(&self, batch: &B) -> Result<usize>
    where
        B: Batch + ?Sized,
    {
        let num_output_group = self.num_output_group()?;
        let num_row = batch.num_row();
        check_row_count(num_row)?;
        num_row
            .checked_mul(num_output_group)
            .ok_or(Error::RowCountOverflow { num_row })
    }

    /// Predict every row of `batch` into `out`.
    ///
    /// `out` must hold at least [`query_result_size`](Self::query_result_size)
    /// values. Returns the number of values produced; when a multi output
    /// routine writes fewer values per row than the model has groups, the
    /// results are packed at the front of `out` and the returned size is
    /// smaller than the query result size.
    pub fn predict_batch<B>(&self, batch: &B, options: &PredictOptions, out: &mut [f32]) -> Result<usize>
    where
        B: Batch + ?Sized,
    {
        let loaded = self.loaded()?;
        let expected = self.query_result_size(batch)?;
        if out.len() < expected {
            return Err(Error::OutputTooSmall {
                required: expected,
                actual: out.len(),
            });
        }

        let nthread = options.effective_threads();
        if options.verbose > 0 {
            info!(num_row = batch.num_row(), nthread, "Begin prediction");
        } else {
            debug!(num_row = batch.num_row(), nthread, "Begin prediction");
        }
        let start = Instant::now();

        let observed = predict_loop(batch, nthread, &self.pools, &loaded.model, options.pred_margin, out)?;

        let elapsed = start.elapsed().as_secs_f64();
        if options.verbose > 0 {
            info!(elapsed_sec = elapsed, "Finished prediction in {elapsed} sec");
        } else {
            debug!(elapsed_sec = elapsed, "Finished prediction in {elapsed} sec");
        }

        if observed < expected {
            reconcile(out, batch.num_row(), loaded.model.num_output_group(), observed)?;
        }
        Ok(observed)
    }

    /// Predict every row of `batch` into a freshly allocated buffer holding
    /// exactly the produced values.
    pub fn predict<B>(&self, batch: &B, options: &PredictOptions) -> Result<Vec<f32>>
    where
        B: Batch + ?Sized,
    {
        let mut out = vec![0.0; self.query_result_size(batch)?];
        let size = self.predict_batch(batch, options, &mut out)?;
        out.truncate(size);
        Ok(out)
    }

    /// Release the loaded library. Calling this more than once is a no-op.
    pub fn free(&mut self) {
        if let Some(Loaded { model, library }) = self.loaded.take() {
            drop(model);
            debug!(library = library.name(), "released compiled model");
            drop(library);
        }
    }

    fn loaded(&self) -> Result<&Loaded> {
        self.loaded.as_ref().ok_or(Error::NotLoaded)
    }
}

impl Drop for Predictor {
    fn drop(&mut self) {
        self.free();
    }
}

impl fmt::Debug for Predictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Predictor");
        match &self.loaded {
            Some(loaded) => debug
                .field("library", &loaded.library.name())
                .field("num_output_group", &loaded.model.num_output_group()),
            None => debug.field("library", &None::<&str>),
        };
        debug.finish()
    }
}
