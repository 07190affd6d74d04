use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::Shared;

use crate::protocol::{RequestError, Response};
use crate::utils::lock;

pub type Outcome = Result<Response, RequestError>;

/// A settle-once slot for the outcome of a request, awaitable any number of times.
pub(crate) struct Deferred {
    sender: Mutex<Option<oneshot::Sender<Outcome>>>,
    receiver: Shared<oneshot::Receiver<Outcome>>,
}

impl Deferred {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        Self { sender: Mutex::new(Some(sender)), receiver: receiver.shared() }
    }

    /// Settles with `outcome` unless already settled, and reports whether it did.
    pub(crate) fn settle(&self, outcome: Outcome) -> bool {
        let Some(sender) = lock(&self.sender).take() else {
            return false;
        };
        // the receiver lives as long as `self`, sending cannot fail
        sender.send(outcome).is_ok()
    }

    pub(crate) fn is_settled(&self) -> bool {
        lock(&self.sender).is_none()
    }

    pub(crate) fn future(&self) -> ResponseFuture {
        ResponseFuture { inner: self.receiver.clone() }
    }
}

/// Resolves to the [`Response`] of a request, or the reason it was rejected.
///
/// Any number of futures can wait for the same request, they all observe the same outcome.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct ResponseFuture {
    inner: Shared<oneshot::Receiver<Outcome>>,
}

impl Future for ResponseFuture {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.inner.poll_unpin(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => {
                Poll::Ready(Err(RequestError::failed("request was dropped before it settled")))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl fmt::Debug for ResponseFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFuture").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_awaiter_sees_the_outcome() {
        let deferred = Deferred::new();
        let first = deferred.future();
        let second = deferred.future();

        assert!(!deferred.is_settled());
        assert!(deferred.settle(Err(RequestError::aborted("gone"))));
        assert!(deferred.is_settled());

        assert!(first.await.unwrap_err().is_abort());
        assert!(second.await.unwrap_err().is_abort());
        assert!(deferred.future().await.unwrap_err().is_abort());
    }

    #[tokio::test]
    async fn pending_until_settled() {
        let deferred = Deferred::new();
        assert!(deferred.future().now_or_never().is_none());

        deferred.settle(Err(RequestError::failed("boom")));
        assert!(deferred.future().now_or_never().is_some());
    }

    #[tokio::test]
    async fn dropped_deferred_fails_awaiters() {
        let deferred = Deferred::new();
        let future = deferred.future();
        drop(deferred);

        assert!(future.await.unwrap_err().is_fatal());
    }
}
