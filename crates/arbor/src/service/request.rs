use tokio::sync::oneshot::Sender;
use tracing::debug;
use uuid::Uuid;
use crate::batch::{DenseBatch, SparseBatch};
use crate::error::{Error, Result};
use crate::options::PredictOptions;
use crate::predictor::Predictor;

/// An owned batch, for handing input to the prediction service.
#[derive(Clone, Debug)]
pub enum BatchData {
    /// Compressed sparse rows, see [`SparseBatch`].
    Sparse {
        data: Vec<f32>,
        col_index: Vec<u32>,
        row_offset: Vec<usize>,
        num_col: usize,
    },
    /// Row-major values, see [`DenseBatch`].
    Dense {
        data: Vec<f32>,
        num_row: usize,
        num_col: usize,
        missing_value: f32,
    },
}

impl BatchData {
    pub fn sparse(data: Vec<f32>, col_index: Vec<u32>, row_offset: Vec<usize>, num_col: usize) -> Self {
        Self::Sparse {
            data,
            col_index,
            row_offset,
            num_col,
        }
    }

    pub fn dense(data: Vec<f32>, num_row: usize, num_col: usize, missing_value: f32) -> Self {
        Self::Dense {
            data,
            num_row,
            num_col,
            missing_value,
        }
    }

    pub fn num_row(&self) -> usize {
        match self {
            Self::Sparse { row_offset, .. } => row_offset.len().saturating_sub(1),
            Self::Dense { num_row, .. } => *num_row,
        }
    }

    /// Borrow the owned arrays as a batch view and predict it.
    pub(crate) fn predict_with(&self, predictor: &Predictor, options: &PredictOptions) -> Result<Vec<f32>> {
        match self {
            Self::Sparse { data, col_index, row_offset, num_col } => {
                let batch = SparseBatch::new(data, col_index, row_offset, *num_col)?;
                predictor.predict(&batch, options)
            }
            Self::Dense { data, num_row, num_col, missing_value } => {
                let batch = DenseBatch::new(data, *num_row, *num_col, *missing_value)?;
                predictor.predict(&batch, options)
            }
        }
    }
}

/// A queued prediction request and the channel its result goes back on.
pub(crate) struct QueueItem {
    id: Uuid,
    batch: BatchData,
    options: PredictOptions,
    sender: Sender<Result<Vec<f32>>>,
}

impl QueueItem {
    pub(crate) fn new(id: Uuid, batch: BatchData, options: PredictOptions, sender: Sender<Result<Vec<f32>>>) -> Self {
        Self {
            id,
            batch,
            options,
            sender,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn into_parts(self) -> (Uuid, BatchData, PredictOptions, Sender<Result<Vec<f32>>>) {
        (self.id, self.batch, self.options, self.sender)
    }

    /// Resolve the request with [`Error::Service`] without predicting it.
    pub(crate) fn reject(self, reason: &str) {
        let message = format!("request {} was not served: {reason}", self.id);
        if self.sender.send(Err(Error::Service(message))).is_err() {
            debug!(request = %self.id, "requester went away before being rejected");
        }
    }
}
