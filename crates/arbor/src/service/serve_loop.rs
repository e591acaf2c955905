use std::sync::Arc;
use tracing::debug;
use crate::error::Error;
use crate::predictor::Predictor;
use super::request::QueueItem;
use super::worker::{RequestQueue, SHUT_DOWN};

/// Serve requests from `queue` until it stops accepting.
///
/// Each batch is predicted on tokio's blocking pool, since a prediction is
/// synchronous CPU work that fans out over its own worker threads. Batches
/// are taken in submission order. Requests still queued or in hand when the
/// queue stops are rejected.
pub(crate) async fn serve_loop(predictor: Arc<Predictor>, queue: Arc<RequestQueue>) {
    while queue.is_accepting() {
        let items = queue.drain().await;
        if items.is_empty() {
            queue.wait().await;
            continue;
        }

        for item in items {
            if queue.is_accepting() {
                serve(&predictor, item).await;
            } else {
                item.reject(SHUT_DOWN);
            }
        }
    }

    for item in queue.drain().await {
        item.reject(SHUT_DOWN);
    }
    debug!("prediction service stopped");
}

async fn serve(predictor: &Arc<Predictor>, item: QueueItem) {
    let (id, batch, options, sender) = item.into_parts();
    let predictor = predictor.clone();
    debug!(request = %id, num_row = batch.num_row(), "predicting queued batch");

    let result = tokio::task::spawn_blocking(move || batch.predict_with(&predictor, &options))
        .await
        .unwrap_or_else(|err| Err(Error::Service(format!("prediction task failed: {err}"))));

    if sender.send(result).is_err() {
        debug!(request = %id, "requester went away before its prediction finished");
    }
}
