//! Execution policy decorator.
//!
//! Runs the inner dispatcher as the action of an external [`Policy`]. The
//! policy sees only success or failure of the action; the response travels
//! back through a call-local slot and the delivery context.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tower::Layer;

use crate::{
    Action, ActionFuture, CallContext, DispatchFuture, Dispatcher, Error, Policy, Request, Response,
};

/// Layer that runs dispatches under a [`Policy`].
#[derive(Clone)]
pub struct PolicyLayer {
    policy: Arc<dyn Policy>,
}

impl std::fmt::Debug for PolicyLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyLayer").finish_non_exhaustive()
    }
}

impl PolicyLayer {
    /// Create a policy layer.
    pub fn new(policy: impl Policy + 'static) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    /// Create a policy layer from a shared policy.
    #[must_use]
    pub fn from_arc(policy: Arc<dyn Policy>) -> Self {
        Self { policy }
    }
}

impl<D> Layer<D> for PolicyLayer {
    type Service = PolicyDispatcher<D>;

    fn layer(&self, inner: D) -> Self::Service {
        PolicyDispatcher {
            inner,
            policy: Arc::clone(&self.policy),
        }
    }
}

/// Dispatcher that runs the inner dispatcher under a policy.
#[derive(Clone)]
pub struct PolicyDispatcher<D> {
    inner: D,
    policy: Arc<dyn Policy>,
}

impl<D: std::fmt::Debug> std::fmt::Debug for PolicyDispatcher<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyDispatcher")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<D> PolicyDispatcher<D> {
    /// Wrap `inner` with `policy`.
    pub fn new(inner: D, policy: Arc<dyn Policy>) -> Self {
        Self { inner, policy }
    }
}

impl<D: Dispatcher> Dispatcher for PolicyDispatcher<D> {
    fn dispatch<'a>(&'a self, cx: &'a CallContext, request: Request<Bytes>) -> DispatchFuture<'a> {
        Box::pin(async move {
            let slot: Arc<Mutex<Option<Response<Bytes>>>> = Arc::default();

            let action: Action<'a> = {
                let slot = Arc::clone(&slot);
                Box::new(move || -> ActionFuture<'a> {
                    let slot = Arc::clone(&slot);
                    let request = request.clone();
                    Box::pin(async move {
                        let response = self.inner.dispatch(cx, request).await?;
                        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(response);
                        Ok(())
                    })
                })
            };

            self.policy.execute(cx, action).await?;

            let response = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            response
                .or_else(|| cx.delivery().and_then(|delivery| delivery.response()))
                .ok_or_else(|| Error::invalid_request("policy completed without a response"))
        })
    }
}
