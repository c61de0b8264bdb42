//! Timeout scoping decorator.

use std::time::Duration;

use bytes::Bytes;
use tower::Layer;
use tracing::debug;

use crate::{CallContext, DispatchFuture, Dispatcher, Request};

/// Layer bounding every dispatch by a fixed duration.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutLayer {
    timeout: Duration,
}

impl TimeoutLayer {
    /// Create a timeout layer.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl<D> Layer<D> for TimeoutLayer {
    type Service = Timeout<D>;

    fn layer(&self, inner: D) -> Self::Service {
        Timeout {
            inner,
            timeout: self.timeout,
        }
    }
}

/// Dispatcher that runs the inner dispatcher within a child context bounded
/// by `timeout`.
///
/// The child context is released on every exit path, so work still waiting
/// on it further in is woken up. Fails with
/// [`Error::DeadlineExceeded`](crate::Error::DeadlineExceeded) when the inner
/// dispatcher does not finish in time; never retries.
#[derive(Debug, Clone)]
pub struct Timeout<D> {
    inner: D,
    timeout: Duration,
}

impl<D: Dispatcher> Dispatcher for Timeout<D> {
    fn dispatch<'a>(&'a self, cx: &'a CallContext, request: Request<Bytes>) -> DispatchFuture<'a> {
        Box::pin(async move {
            let child = cx.with_timeout(self.timeout);
            let _release = child.release_on_drop();

            tokio::select! {
                biased;
                result = self.inner.dispatch(&child, request) => result,
                err = child.done() => {
                    debug!(timeout = ?self.timeout, error = %err, "dispatch abandoned");
                    Err(err)
                }
            }
        })
    }
}
