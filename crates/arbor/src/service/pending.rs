use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use uuid::Uuid;
use crate::error::{Error, Result};

/// # PendingPrediction
///
/// A future resolving to the output of a submitted batch.
///
/// Resolves to [`Error::Service`] if the service shut down before the batch
/// was predicted.
pub struct PendingPrediction {
    id: Uuid,

    /// The underlying channel receiver
    receiver: oneshot::Receiver<Result<Vec<f32>>>,
}

impl PendingPrediction {
    pub(crate) fn new(id: Uuid, receiver: oneshot::Receiver<Result<Vec<f32>>>) -> Self {
        Self { id, receiver }
    }

    /// Identifier of the request, as it appears in the service's log events.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Future for PendingPrediction {
    type Output = Result<Vec<f32>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let id = this.id;
        Pin::new(&mut this.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(Error::Service(format!(
                    "request {id} dropped before a prediction was made"
                )))
            })
        })
    }
}
