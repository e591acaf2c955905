//! Per-call prediction settings.

/// Settings for a single [`Predictor::predict_batch`](crate::Predictor::predict_batch) call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PredictOptions {
    /// Worker threads to use; `0` means one per hardware thread.
    pub nthread: usize,

    /// Log progress at info level when positive.
    pub verbose: i32,

    /// Request raw margin scores instead of transformed outputs.
    pub pred_margin: bool,
}

impl PredictOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nthread(mut self, nthread: usize) -> Self {
        self.nthread = nthread;
        self
    }

    pub fn with_verbose(mut self, verbose: i32) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_pred_margin(mut self, pred_margin: bool) -> Self {
        self.pred_margin = pred_margin;
        self
    }

    /// The thread count a call will actually run with, capped at the
    /// hardware thread count.
    pub fn effective_threads(&self) -> usize {
        let max_thread = num_cpus::get().max(1);
        if self.nthread == 0 {
            max_thread
        } else {
            self.nthread.min(max_thread)
        }
    }
}
