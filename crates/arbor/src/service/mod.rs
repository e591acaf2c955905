//! # Prediction Service
//!
//! An asynchronous front end over a [`Predictor`] for applications that
//! receive prediction requests from many tasks at once.
//!
//! Requests are queued and drained by a single background worker, which runs
//! each batch to completion on tokio's blocking pool. Callers get a
//! [`PendingPrediction`] future back immediately and await it for the output.
//!
//! Stopping the service, explicitly with [`PredictionService::shutdown`] or by
//! dropping it, resolves every request that has not started yet with
//! [`Error::Service`](crate::Error::Service).
//!
//! This module is only available when the `service` feature flag is enabled.
//!
//! ```ignore
//! use arbor::{Predictor, PredictOptions};
//! use arbor::service::{AsyncPredict, BatchData, PredictionService};
//!
//! let mut predictor = Predictor::new();
//! unsafe { predictor.load("./model.so")? };
//!
//! let service = PredictionService::new(predictor);
//! let batch = BatchData::dense(vec![0.5, 1.5], 1, 2, f32::NAN);
//! let scores = service.predict(batch, PredictOptions::new()).await?;
//! ```

mod pending;
mod request;
mod serve_loop;
mod worker;

use std::sync::Arc;
use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;
use crate::error::Result;
use crate::options::PredictOptions;
use crate::predictor::Predictor;
use request::QueueItem;
use worker::ServeWorker;

pub use pending::PendingPrediction;
pub use request::BatchData;

/// Asynchronous batch prediction.
#[async_trait]
pub trait AsyncPredict {
    /// Predict every row of `batch`, resolving once the whole batch is done.
    async fn predict(&self, batch: BatchData, options: PredictOptions) -> Result<Vec<f32>>;
}

/// Queues batches from any number of tasks onto one loaded [`Predictor`].
///
/// Must be created inside a tokio runtime. Dropping the service stops its
/// worker; requests still queued at that point resolve to an error.
pub struct PredictionService {
    predictor: Arc<Predictor>,
    worker: ServeWorker,
}

impl PredictionService {
    pub fn new(predictor: Predictor) -> Self {
        let predictor = Arc::new(predictor);
        let worker = ServeWorker::spawn(predictor.clone());

        Self { predictor, worker }
    }

    /// The predictor requests are served with.
    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    /// Whether the background worker is still accepting work.
    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Queue `batch` for prediction.
    ///
    /// After [`shutdown`](Self::shutdown) the returned future resolves to an
    /// error right away.
    pub async fn submit(&self, batch: BatchData, options: PredictOptions) -> PendingPrediction {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let item = QueueItem::new(id, batch, options, tx);
        debug!(request = %item.id(), "queued prediction request");
        self.worker.queue().push(item).await;
        PendingPrediction::new(id, rx)
    }

    /// Stop accepting requests.
    ///
    /// Requests that have not started are rejected with
    /// [`Error::Service`](crate::Error::Service); a batch already being
    /// predicted is finished before this returns.
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
    }

    /// Queue several batches and wait for all of them.
    ///
    /// Fails with the first error any batch produced.
    pub async fn predict_many(&self, batches: Vec<BatchData>, options: PredictOptions) -> Result<Vec<Vec<f32>>> {
        let mut pending = Vec::with_capacity(batches.len());
        for batch in batches {
            pending.push(self.submit(batch, options).await);
        }
        try_join_all(pending).await
    }
}

#[async_trait]
impl AsyncPredict for PredictionService {
    async fn predict(&self, batch: BatchData, options: PredictOptions) -> Result<Vec<f32>> {
        self.submit(batch, options).await.await
    }
}
