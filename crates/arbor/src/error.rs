//! # Errors
//!
//! Every failure surfaced by the engine is fatal for the call that hit it:
//! nothing is retried, and no partial prediction output is reported.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Canonical error type for the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The compiled artifact could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A prediction was requested before a successful load.
    #[error("a shared library needs to be loaded first using load()")]
    NotLoaded,

    /// The artifact and the data do not fit together.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The batch has more rows than a signed 64-bit index can address.
    #[error("row count {num_row} exceeds the representable index range")]
    RowCountOverflow { num_row: usize },

    /// A batch violated its layout invariants at construction.
    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    /// The caller supplied an output buffer shorter than the expected result.
    #[error("output buffer holds {actual} values but the batch needs {required}")]
    OutputTooSmall { required: usize, actual: usize },

    /// The worker pool for a batch could not be started.
    #[error("failed to build prediction thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The asynchronous prediction service could not complete a request.
    #[error("prediction service: {0}")]
    Service(String),
}

/// Failures while opening an artifact or resolving its symbols.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open artifact `{path}`: {reason}")]
    Open { path: String, reason: String },

    #[error("artifact `{library}` does not contain a valid {symbol}() function")]
    MissingSymbol { symbol: String, library: String },
}

/// Incompatible artifact/data pairings detected while predicting.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("output group count must be positive")]
    NoOutputGroups,

    #[error(
        "the missing value sentinel must be NaN if there is any NaN in the matrix \
         (found NaN at row {row}, column {col})"
    )]
    NanWithoutNanSentinel { row: usize, col: usize },

    /// Detected after the routine returns, when any overrun of the row's
    /// output slots has already happened.
    #[error("routine wrote {written} values for row {row} but the model has {num_output_group} output groups")]
    TooManyOutputs {
        row: usize,
        written: usize,
        num_output_group: usize,
    },

    #[error(
        "cannot reshape {observed} results over {num_row} rows with {num_output_group} output groups: {reason}"
    )]
    Reshape {
        observed: usize,
        num_row: usize,
        num_output_group: usize,
        reason: &'static str,
    },
}
