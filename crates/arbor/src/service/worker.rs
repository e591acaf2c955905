//! The request queue of a prediction service and the task that drains it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::debug;
use crate::predictor::Predictor;
use super::request::QueueItem;
use super::serve_loop::serve_loop;

/// Reason given to requests that were still queued when the service stopped.
pub(crate) const SHUT_DOWN: &str = "prediction service is shut down";

/// Requests waiting to be predicted, in submission order.
///
/// Once closed the queue stays closed: pushes are rejected on the spot and
/// nothing queued is ever predicted.
pub(crate) struct RequestQueue {
    /// Cleared exactly once, when the service stops
    accepting: AtomicBool,

    /// Wakes the serving task after a push or on close
    wake: Notify,

    items: Mutex<Vec<QueueItem>>,
}

impl RequestQueue {
    pub(crate) fn new() -> Self {
        Self {
            accepting: AtomicBool::new(true),
            wake: Notify::new(),
            items: Mutex::new(vec![]),
        }
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Queue `item` and wake the serving task.
    ///
    /// A closed queue rejects `item` immediately.
    pub(crate) async fn push(&self, item: QueueItem) {
        let mut items = self.items.lock().await;
        // checked under the lock, so `close` either sees the item or we see the flag
        if !self.is_accepting() {
            drop(items);
            item.reject(SHUT_DOWN);
            return;
        }
        items.push(item);
        drop(items);
        self.wake.notify_one();
    }

    /// Take everything queued so far.
    pub(crate) async fn drain(&self) -> Vec<QueueItem> {
        let mut items = self.items.lock().await;
        items.drain(..).collect()
    }

    /// Wait for the next push or for the queue to close.
    pub(crate) async fn wait(&self) {
        self.wake.notified().await;
    }

    /// Stop accepting requests and wake the serving task so it exits.
    pub(crate) fn stop(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Stop accepting requests and reject everything still queued.
    ///
    /// Returns how many requests were rejected.
    pub(crate) async fn close(&self) -> usize {
        self.stop();
        let pending = self.drain().await;
        let rejected = pending.len();
        for item in pending {
            item.reject(SHUT_DOWN);
        }
        rejected
    }
}

/// The serving task of a prediction service.
///
/// Dropping the worker stops the queue; the task rejects whatever is left
/// before it exits.
pub(crate) struct ServeWorker {
    queue: Arc<RequestQueue>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ServeWorker {
    /// Spawn the serving task on the current tokio runtime.
    pub(crate) fn spawn(predictor: Arc<Predictor>) -> Self {
        let queue = Arc::new(RequestQueue::new());
        let task = tokio::spawn(serve_loop(predictor, queue.clone()));

        Self {
            queue,
            task: parking_lot::Mutex::new(Some(task)),
        }
    }

    pub(crate) fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub(crate) fn is_running(&self) -> bool {
        self.queue.is_accepting()
    }

    /// Close the queue, reject pending requests and wait for the serving task.
    ///
    /// A request the task already took is finished first. Later calls return
    /// immediately.
    pub(crate) async fn shutdown(&self) {
        let rejected = self.queue.close().await;
        let task = self.task.lock().take();
        if let Some(task) = task {
            debug!(rejected, "stopping prediction service");
            let _ = task.await;
        }
    }
}

impl Drop for ServeWorker {
    fn drop(&mut self) {
        self.queue.stop();
    }
}
